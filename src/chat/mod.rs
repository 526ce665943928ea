//! Chat domain: transcripts, reply streaming, and their coordination.
//!
//! This module provides in-memory conversation storage and the streaming
//! pipeline that turns reply-source events into transport frames and, on
//! completion, into a committed assistant message.
//!
//! # Architecture
//!
//! - [`ChatStore`] / [`Conversation`]: transcripts keyed by caller-supplied id
//! - [`ReplySource`]: pluggable producer of token/block/end events
//! - [`StreamCoordinator`]: one stream per conversation, commit after end
//!
//! # Example
//!
//! ```rust
//! use chat_relay::chat::ChatStore;
//!
//! let store = ChatStore::new();
//! let conversation = store.get_or_create("greeting");
//! conversation.append_user("Hello!").unwrap();
//!
//! assert_eq!(store.history("greeting").len(), 1);
//! ```

mod coordinator;
mod events;
mod message;
mod source;
mod store;

pub use coordinator::{DEFAULT_CHANNEL_CAPACITY, StreamCoordinator, StreamHandle};
pub use events::{ReplyEvent, TableBlock, sse_event};
pub use message::{ContentKind, Message, MessageRole, ReplyBlock};
pub use source::{
    DEFAULT_TOKEN_DELAY, ReplyEventStream, ReplyRequest, ReplySource, ScriptedSource,
};
pub use store::{ChatStore, Conversation, StreamLease};
