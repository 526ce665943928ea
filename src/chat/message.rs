//! Chat message model.
//!
//! A message is an immutable record once appended: role, textual content, a
//! content kind tag, and any structured blocks that arrived alongside the
//! text during streaming.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Sent by the end user.
    User,
    /// Produced by the reply source and committed after a completed stream.
    Assistant,
}

/// Content kind tag carried on the wire as `"type"`.
///
/// The enum domain is the validation: a wire value outside it fails
/// deserialization, which the API surfaces as an invalid message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Plain text, the kind every user message and assembled reply carries.
    #[default]
    Text,
    /// Tabular content.
    Table,
    /// A file reference.
    File,
}

/// A structured, non-textual unit of a reply (a table, a chart, ...).
///
/// The payload is kept verbatim as it arrived from the stream; the store
/// never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyBlock {
    /// Block discriminator, e.g. `"table"`.
    pub kind: String,
    /// Opaque block body, forwarded and persisted as-is.
    pub payload: serde_json::Value,
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message author.
    pub role: MessageRole,
    /// Concatenated textual content.
    pub content: String,
    /// Content kind tag (serialized as `type` for wire compatibility).
    #[serde(rename = "type", default)]
    pub kind: ContentKind,
    /// Structured blocks attached to the message, in arrival order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<ReplyBlock>,
}

impl Message {
    /// Build a user message carrying plain text.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            kind: ContentKind::Text,
            blocks: Vec::new(),
        }
    }

    /// Build an assistant message from an assembled reply.
    #[must_use]
    pub fn assistant(content: impl Into<String>, blocks: Vec<ReplyBlock>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            kind: ContentKind::Text,
            blocks,
        }
    }

    /// A message with no text and no blocks carries nothing worth keeping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_shape() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.kind, ContentKind::Text);
        assert!(msg.blocks.is_empty());
    }

    #[test]
    fn test_wire_format_uses_type_tag() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["type"], "text");
        // Empty block lists stay off the wire.
        assert!(json.get("blocks").is_none());
    }

    #[test]
    fn test_deserialize_defaults_kind_to_text() {
        let msg: Message =
            serde_json::from_value(serde_json::json!({"role": "assistant", "content": "ok"}))
                .unwrap();
        assert_eq!(msg.kind, ContentKind::Text);
        assert!(msg.blocks.is_empty());
    }

    #[test]
    fn test_known_kinds_accepted() {
        for (wire, kind) in [
            ("text", ContentKind::Text),
            ("table", ContentKind::Table),
            ("file", ContentKind::File),
        ] {
            let msg: Message = serde_json::from_value(serde_json::json!({
                "role": "user",
                "content": "hi",
                "type": wire
            }))
            .unwrap();
            assert_eq!(msg.kind, kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<Message, _> = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": "hi",
            "type": "hologram"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_emptiness() {
        assert!(Message::assistant("", Vec::new()).is_empty());
        assert!(!Message::assistant("x", Vec::new()).is_empty());

        let block = ReplyBlock {
            kind: "table".to_string(),
            payload: serde_json::json!({}),
        };
        assert!(!Message::assistant("", vec![block]).is_empty());
    }
}
