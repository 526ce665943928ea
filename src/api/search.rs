//! Web search API handler.
//!
//! Returns simulated results shaped like a real search integration would
//! produce, so clients can build against the contract before a provider is
//! wired in.

use axum::{extract::Query, response::Json};
use serde::{Deserialize, Serialize};

/// Query parameters for the search endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Search query.
    pub q: String,
}

/// A single search hit.
#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Response for the search endpoint.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// GET /api/search - Simulated web search.
///
/// A missing `q` parameter is rejected by extraction before this runs.
pub async fn web_search(Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    tracing::debug!(query = %params.q, "Serving simulated search results");

    let results = (1..=3)
        .map(|n| SearchResult {
            title: format!("Result {n}"),
            url: format!("https://example.com/{n}"),
            snippet: format!("Snippet about {} #{n}", params.q),
        })
        .collect();

    Json(SearchResponse { results })
}
