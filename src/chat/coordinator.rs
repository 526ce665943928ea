//! Stream coordination.
//!
//! The [`StreamCoordinator`] owns the lifecycle of a reply stream: claim the
//! conversation's stream slot, start the source, forward events to the
//! consumer, and commit the assembled reply once the end record has been
//! forwarded. A stream that dies early (source failure, cancellation, or the
//! consumer going away) leaves the transcript untouched.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::chat::events::ReplyEvent;
use crate::chat::message::{Message, ReplyBlock};
use crate::chat::source::{ReplyEventStream, ReplyRequest, ReplySource};
use crate::chat::store::{ChatStore, Conversation, StreamLease};
use crate::error::ChatError;

/// Default bound for the per-stream event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A live reply stream, as seen by its single consumer.
///
/// Dropping the receiver counts as a disconnect: the drive task stops
/// pulling from the source and discards the partial reply, freeing the
/// conversation's slot.
#[derive(Debug)]
pub struct StreamHandle {
    /// Identifier correlating this stream's log records.
    pub request_id: String,
    /// Reply events in emission order. The channel closes right after the
    /// end record on success, or without one when the stream aborted.
    pub events: mpsc::Receiver<ReplyEvent>,
    /// Cancels the stream cooperatively; the partial reply is discarded.
    pub cancel: CancellationToken,
}

/// Hands out reply streams, one per conversation at a time.
#[derive(Clone)]
pub struct StreamCoordinator {
    store: ChatStore,
    source: Arc<dyn ReplySource>,
    channel_capacity: usize,
}

impl std::fmt::Debug for StreamCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCoordinator")
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

impl StreamCoordinator {
    /// Create a coordinator over the given store and reply source.
    #[must_use]
    pub fn new(store: ChatStore, source: Arc<dyn ReplySource>, channel_capacity: usize) -> Self {
        Self {
            store,
            source,
            channel_capacity,
        }
    }

    /// Open a reply stream for `chat_id`.
    ///
    /// The conversation comes into existence if this is its first mention.
    /// While another stream holds the conversation's slot the call fails
    /// with [`ChatError::StreamBusy`]; callers retry after the active stream
    /// ends, nothing is queued. A source that refuses to start fails with
    /// [`ChatError::StreamAborted`] and releases the slot immediately.
    #[instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn open(&self, chat_id: &str) -> Result<StreamHandle, ChatError> {
        let conversation = self.store.get_or_create(chat_id);
        let Some(lease) = conversation.try_lease() else {
            tracing::info!("rejecting stream, chat already has one active");
            return Err(ChatError::StreamBusy {
                chat_id: chat_id.to_string(),
            });
        };

        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let request = ReplyRequest {
            chat_id: chat_id.to_string(),
            history: conversation.messages(),
        };

        let events = match self.source.stream(request).await {
            Ok(events) => events,
            Err(e) => {
                // `lease` drops on this return path, so a retry is allowed
                // right away.
                tracing::error!(error = %e, "reply source refused to start");
                return Err(ChatError::StreamAborted {
                    reason: e.to_string(),
                });
            }
        };

        tracing::info!("reply stream opened");

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        tokio::spawn(drive_stream(
            conversation,
            lease,
            events,
            tx,
            cancel.clone(),
            request_id.clone(),
        ));

        Ok(StreamHandle {
            request_id,
            events: rx,
            cancel,
        })
    }
}

/// Pump events from the source to the consumer, then settle the transcript.
///
/// The reply is committed only after the end record has been handed to the
/// consumer's channel; every other exit discards the partial reply and
/// commits nothing.
async fn drive_stream(
    conversation: Conversation,
    lease: StreamLease,
    mut events: ReplyEventStream,
    tx: mpsc::Sender<ReplyEvent>,
    cancel: CancellationToken,
    request_id: String,
) {
    let mut text = String::new();
    let mut blocks: Vec<ReplyBlock> = Vec::new();
    let mut completed = false;

    loop {
        // A dropped receiver has to tear the stream down even while the
        // source is between events, so the pull waits on the channel too.
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(request_id = %request_id, "stream cancelled, discarding partial reply");
                break;
            }
            () = tx.closed() => {
                tracing::info!(
                    request_id = %request_id,
                    "consumer went away mid-stream, discarding partial reply"
                );
                break;
            }
            item = events.next() => item,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "reply source failed mid-stream, discarding partial reply"
                );
                break;
            }
            None => {
                tracing::warn!(
                    request_id = %request_id,
                    "reply source stopped without an end record, discarding partial reply"
                );
                break;
            }
        };

        match &event {
            ReplyEvent::Token { content } => text.push_str(content),
            ReplyEvent::Block { kind, payload } => blocks.push(ReplyBlock {
                kind: kind.clone(),
                payload: payload.clone(),
            }),
            ReplyEvent::End => {}
        }

        let is_end = event.is_end();
        conversation.touch();

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(request_id = %request_id, "stream cancelled, discarding partial reply");
                break;
            }
            sent = tx.send(event) => {
                if sent.is_err() {
                    tracing::info!(
                        request_id = %request_id,
                        "consumer went away mid-stream, discarding partial reply"
                    );
                    break;
                }
            }
        }

        if is_end {
            completed = true;
            break;
        }
    }

    if completed {
        commit_reply(&conversation, text, blocks, &request_id);
    }

    // Free the slot before the channel closes so a consumer that drained
    // the stream can open the next one without a gap.
    drop(lease);
}

fn commit_reply(
    conversation: &Conversation,
    text: String,
    blocks: Vec<ReplyBlock>,
    request_id: &str,
) {
    let message = Message::assistant(text, blocks);
    if message.is_empty() {
        tracing::debug!(request_id = %request_id, "reply carried no content, nothing to commit");
        return;
    }

    match conversation.append(message) {
        Ok(()) => tracing::info!(
            request_id = %request_id,
            chat_id = %conversation.id(),
            message_count = conversation.message_count(),
            "assistant reply committed"
        ),
        Err(e) => tracing::error!(
            request_id = %request_id,
            error = %e,
            "failed to commit assistant reply"
        ),
    }
}
