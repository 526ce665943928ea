pub mod chat;
pub mod files;
pub mod search;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/send", post(chat::send_message))
        .route("/chat/stream/{chat_id}", get(chat::stream_chat))
        .route("/chat/history/{chat_id}", get(chat::chat_history))
        .route("/chat/list", get(chat::list_chats))
        .route("/files/upload", post(files::upload_files))
        .route("/search", get(search::web_search))
}
