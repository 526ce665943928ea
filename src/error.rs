//! Error taxonomy for the chat core.
//!
//! Every error here is scoped to a single request or stream; none of them is
//! fatal to the process, and none of them may touch another session's state.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors surfaced by the chat store and stream coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The message cannot be appended (empty content, malformed payload).
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// What made the message unacceptable.
        reason: String,
    },

    /// Another stream is already active for this chat. The caller is
    /// rejected rather than queued and may retry once the stream ends.
    #[error("a stream is already active for chat '{chat_id}'")]
    StreamBusy {
        /// The contended chat id.
        chat_id: String,
    },

    /// The stream could not be started or was torn down mid-flight.
    /// Partial replies are discarded, never persisted.
    #[error("stream aborted: {reason}")]
    StreamAborted {
        /// Why the stream ended early.
        reason: String,
    },
}

impl ChatError {
    /// Stable machine-readable code for API clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMessage { .. } => "invalid_message",
            Self::StreamBusy { .. } => "stream_busy",
            Self::StreamAborted { .. } => "stream_aborted",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidMessage { .. } => StatusCode::BAD_REQUEST,
            Self::StreamBusy { .. } => StatusCode::CONFLICT,
            Self::StreamAborted { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

/// JSON body returned for failed API calls.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
