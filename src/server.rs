use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::api;
use crate::chat::{ChatStore, ReplySource, ScriptedSource, StreamCoordinator};
use crate::config::AppConfig;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let store = ChatStore::new();
    let source: Arc<dyn ReplySource> = Arc::new(ScriptedSource::new(config.reply.token_delay()));
    let coordinator = Arc::new(StreamCoordinator::new(
        store.clone(),
        source,
        config.reply.channel_capacity,
    ));

    let state = AppState {
        store,
        coordinator,
        config: Arc::clone(&config),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router around the given state.
pub fn build_router(state: AppState) -> Router {
    // A conditionally applied layer changes the router's type, so the
    // timeout middleware is always present and a huge duration stands in
    // for "disabled". Streaming responses are unaffected either way: the
    // timeout covers producing the response head, not the body.
    let timeout_duration = if state.config.resilience.timeout_disabled {
        Duration::from_secs(365 * 24 * 60 * 60) // 1 year
    } else {
        Duration::from_secs(30)
    };

    Router::new()
        .route("/api/health", get(health))
        .nest("/api", api::router())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB limit
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        // Mirrors the request origin and allows credentials, the closest
        // well-formed equivalent of a wildcard-with-credentials policy.
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// GET /api/health - Liveness check.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
