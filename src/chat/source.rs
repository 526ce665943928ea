//! Reply sources.
//!
//! A [`ReplySource`] produces the event stream for one reply. The contract
//! every implementation must honor:
//!
//! - the stream is finite;
//! - a successful stream ends with exactly one [`ReplyEvent::End`] and
//!   nothing after it;
//! - a stream that stops without an end marker (exhausted or errored) is an
//!   abort, and the caller discards everything received so far.
//!
//! [`ScriptedSource`] is the built-in implementation: a canned reply paced
//! token by token, used until a model backend is wired in.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;

use crate::chat::events::{ReplyEvent, TableBlock};
use crate::chat::message::Message;

/// Pause between scripted tokens (matches a comfortable typing cadence).
pub const DEFAULT_TOKEN_DELAY: Duration = Duration::from_millis(20);

const REPLY_SCRIPT: &str =
    "This is a streamed reply from the assistant. Tokens arrive one by one, \
     followed by a structured table block.";

/// Everything a source gets to work with when producing a reply.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    /// Conversation the reply belongs to.
    pub chat_id: String,
    /// Transcript snapshot at the time the stream was opened, oldest first.
    pub history: Vec<Message>,
}

/// Boxed stream of reply events.
pub type ReplyEventStream = Pin<Box<dyn Stream<Item = anyhow::Result<ReplyEvent>> + Send>>;

/// Trait for streaming reply producers.
///
/// Implementations emit [`ReplyEvent`]s as the reply is generated. See the
/// module docs for the termination contract.
#[async_trait::async_trait]
pub trait ReplySource: Send + Sync {
    /// Start streaming a reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be started at all; failures
    /// after the first event are reported through the stream itself.
    async fn stream(&self, req: ReplyRequest) -> anyhow::Result<ReplyEventStream>;
}

/// Canned reply source: a fixed sentence streamed character by character,
/// then a demo table, then the end marker.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    token_delay: Duration,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_DELAY)
    }
}

impl ScriptedSource {
    /// Create a scripted source with the given pause between tokens.
    #[must_use]
    pub fn new(token_delay: Duration) -> Self {
        Self { token_delay }
    }

    fn demo_table() -> TableBlock {
        TableBlock {
            headers: vec!["Column".to_string(), "Value".to_string()],
            rows: vec![
                vec!["A".to_string(), "1".to_string()],
                vec!["B".to_string(), "2".to_string()],
                vec!["C".to_string(), "3".to_string()],
            ],
        }
    }
}

#[async_trait::async_trait]
impl ReplySource for ScriptedSource {
    async fn stream(&self, req: ReplyRequest) -> anyhow::Result<ReplyEventStream> {
        tracing::debug!(
            chat_id = %req.chat_id,
            history_len = req.history.len(),
            "starting scripted reply"
        );

        let delay = self.token_delay;
        let stream = async_stream::stream! {
            for ch in REPLY_SCRIPT.chars() {
                yield Ok::<ReplyEvent, anyhow::Error>(ReplyEvent::Token {
                    content: ch.to_string(),
                });
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            yield Ok(Self::demo_table().into());
            yield Ok(ReplyEvent::End);
        };

        Ok(Box::pin(stream))
    }
}
