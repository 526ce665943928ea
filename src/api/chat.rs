//! Chat API handlers.
//!
//! Send a message, stream the reply, read the transcript, list the chats.
//! Streaming replies go out as Server-Sent Events with one frame per reply
//! record; the stream ends right after the `end` record, or without one when
//! the reply was aborted.

use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use crate::AppState;
use crate::chat::{Message, sse_event};
use crate::error::ChatError;

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Target conversation; created on first mention.
    pub chat_id: String,
    /// Message text.
    pub message: String,
    /// Client-selected reply mode. Accepted for wire compatibility and
    /// logged; reply generation does not consult it yet.
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "default".to_string()
}

/// Response confirming a stored message.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub ok: bool,
}

/// Response carrying a conversation transcript.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Transcript in append order, oldest first.
    pub messages: Vec<Message>,
}

/// Response listing known conversations.
#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chat_ids: Vec<String>,
}

/// POST /api/chat/send - Append a user message to a conversation.
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ChatError> {
    tracing::info!(
        chat_id = %req.chat_id,
        mode = %req.mode,
        message_length = req.message.len(),
        "Received chat message"
    );

    let conversation = state.store.get_or_create(&req.chat_id);
    conversation.append_user(req.message)?;

    tracing::debug!(
        chat_id = %req.chat_id,
        message_count = conversation.message_count(),
        "Added user message to conversation"
    );

    Ok(Json(SendResponse { ok: true }))
}

/// GET /api/chat/stream/{chat_id} - SSE stream of the next reply.
///
/// While the conversation already has a live stream this responds 409; the
/// client retries once the active stream has ended.
pub async fn stream_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Response, ChatError> {
    let handle = state.coordinator.open(&chat_id).await?;

    tracing::info!(
        chat_id = %chat_id,
        request_id = %handle.request_id,
        "Starting SSE stream"
    );

    let frames = ReceiverStream::new(handle.events)
        .map(|event| Ok::<String, std::convert::Infallible>(sse_event(&event)));

    let body = axum::body::Body::from_stream(frames);
    Ok(build_sse_response(body))
}

/// GET /api/chat/history/{chat_id} - Full transcript of a conversation.
///
/// Unknown IDs answer with an empty transcript rather than an error, and
/// asking does not create the conversation.
pub async fn chat_history(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        messages: state.store.history(&chat_id),
    })
}

/// GET /api/chat/list - IDs of every conversation seen so far.
pub async fn list_chats(State(state): State<AppState>) -> Json<ChatListResponse> {
    Json(ChatListResponse {
        chat_ids: state.store.list_ids(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn build_sse_response(body: axum::body::Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert("Content-Type", "text/event-stream".parse().unwrap());
    h.insert("Cache-Control", "no-cache".parse().unwrap());
    h.insert("Connection", "keep-alive".parse().unwrap());
    h.insert("X-Accel-Buffering", "no".parse().unwrap());
    resp
}
