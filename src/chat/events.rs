//! Reply stream events and their SSE framing.
//!
//! A reply source emits a finite sequence of these records; the final record
//! of every successful stream is exactly one [`ReplyEvent::End`]. Transports
//! frame them with [`sse_event`], storage consumes them via the coordinator.

use serde::{Deserialize, Serialize};

/// One record in a streamed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyEvent {
    /// An incremental text fragment. Fragment boundaries carry no meaning;
    /// consumers concatenate contents in order.
    Token {
        /// The text fragment, possibly a single character.
        content: String,
    },
    /// A complete structured unit delivered mid-stream.
    Block {
        /// Block discriminator, e.g. `"table"`.
        kind: String,
        /// Opaque block body, forwarded verbatim.
        payload: serde_json::Value,
    },
    /// Terminal marker: the reply is complete. Nothing follows it.
    End,
}

impl ReplyEvent {
    /// SSE event name for this record.
    ///
    /// Blocks are namespaced by their kind (`block.table`) so clients can
    /// subscribe per block type without parsing payloads.
    #[must_use]
    pub fn event_name(&self) -> String {
        match self {
            Self::Token { .. } => "token".to_string(),
            Self::Block { kind, .. } => format!("block.{kind}"),
            Self::End => "end".to_string(),
        }
    }

    /// Whether this is the terminal [`ReplyEvent::End`] record.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Demo table payload emitted by the scripted reply source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlock {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl From<TableBlock> for ReplyEvent {
    fn from(table: TableBlock) -> Self {
        Self::Block {
            kind: "table".to_string(),
            payload: serde_json::to_value(table).unwrap_or_default(),
        }
    }
}

/// Convert a reply event to a Server-Sent Events frame.
pub fn sse_event(event: &ReplyEvent) -> String {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!("event: {}\ndata: {data}\n\n", event.event_name())
}
