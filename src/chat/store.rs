//! Conversation transcripts and their in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::chat::message::Message;
use crate::error::ChatError;

/// Default idle timeout for eviction (30 minutes).
#[allow(dead_code)]
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Exclusive permission to run one reply stream for a conversation.
///
/// At most one lease per conversation exists at a time; holding it is the
/// precondition for forwarding reply events. Dropping the lease releases the
/// slot, on success and failure alike.
#[derive(Debug)]
pub struct StreamLease {
    _slot: OwnedMutexGuard<()>,
}

/// A single conversation transcript.
///
/// Conversations hold the ordered message history and the stream slot that
/// serializes reply generation. Cloning is cheap and shares state.
#[derive(Debug, Clone)]
pub struct Conversation {
    inner: Arc<ConversationInner>,
}

#[derive(Debug)]
struct ConversationInner {
    /// Caller-supplied conversation identifier.
    id: String,
    /// Transcript in append order.
    messages: RwLock<Vec<Message>>,
    /// Conversation creation time.
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    /// Last activity time.
    last_activity: RwLock<DateTime<Utc>>,
    /// Slot serializing reply streams; locked while a stream is in flight.
    stream_slot: Arc<Mutex<()>>,
}

impl Conversation {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(ConversationInner {
                id,
                messages: RwLock::new(Vec::new()),
                created_at: now,
                last_activity: RwLock::new(now),
                stream_slot: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// Get the conversation ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Append a message to the transcript.
    ///
    /// The transcript only grows and only at the tail; earlier entries are
    /// never reordered or rewritten.
    pub fn append(&self, message: Message) -> Result<(), ChatError> {
        if message.is_empty() {
            return Err(ChatError::InvalidMessage {
                reason: "message carries no content and no blocks".to_string(),
            });
        }
        let mut guard = self.inner.messages.write().unwrap();
        guard.push(message);
        drop(guard);
        self.touch();
        Ok(())
    }

    /// Append a plain-text user message.
    pub fn append_user(&self, content: impl Into<String>) -> Result<(), ChatError> {
        self.append(Message::user(content))
    }

    /// Snapshot of the transcript, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.messages.read().unwrap().clone()
    }

    /// Number of messages in the transcript.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner.messages.read().unwrap().len()
    }

    /// Try to claim the stream slot.
    ///
    /// Returns `None` while another stream holds it; callers reject rather
    /// than queue.
    #[must_use]
    pub fn try_lease(&self) -> Option<StreamLease> {
        Arc::clone(&self.inner.stream_slot)
            .try_lock_owned()
            .ok()
            .map(|slot| StreamLease { _slot: slot })
    }

    /// Update the last activity timestamp.
    ///
    /// Stream drivers call this while forwarding events so an in-flight
    /// conversation never looks idle.
    pub fn touch(&self) {
        let mut guard = self.inner.last_activity.write().unwrap();
        *guard = Utc::now();
    }

    /// Check whether the conversation has been inactive longer than `timeout`.
    #[must_use]
    pub fn is_idle(&self, timeout: Duration) -> bool {
        let last = *self.inner.last_activity.read().unwrap();
        let now = Utc::now();
        if let Ok(elapsed) = (now - last).to_std() {
            elapsed > timeout
        } else {
            // Negative duration means clock skew or "last" is in the future.
            false
        }
    }

    /// Get the conversation age.
    #[must_use]
    #[allow(dead_code)]
    pub fn age(&self) -> Duration {
        let now = Utc::now();
        (now - self.inner.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}

/// Thread-safe store for conversations.
///
/// Conversations come into existence on first reference; looking one up never
/// fails and racing callers always settle on the same transcript.
#[derive(Debug, Clone)]
pub struct ChatStore {
    inner: Arc<ChatStoreInner>,
}

#[derive(Debug)]
struct ChatStoreInner {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    /// Create a new chat store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChatStoreInner {
                conversations: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get a conversation by ID without creating it.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Conversation> {
        let guard = self.inner.conversations.read().unwrap();
        guard.get(id).cloned()
    }

    /// Get a conversation by ID, creating it if it doesn't exist.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Conversation {
        // Fast path: the conversation usually exists already.
        {
            let guard = self.inner.conversations.read().unwrap();
            if let Some(conversation) = guard.get(id) {
                return conversation.clone();
            }
        }

        // Re-check under the write lock so two racing callers end up
        // sharing a single transcript.
        let mut guard = self.inner.conversations.write().unwrap();
        guard
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id.to_string()))
            .clone()
    }

    /// Snapshot of a conversation's transcript, oldest first.
    ///
    /// Unknown IDs yield an empty transcript; asking is never an error and
    /// does not create the conversation.
    #[must_use]
    pub fn history(&self, id: &str) -> Vec<Message> {
        self.get(id).map(|c| c.messages()).unwrap_or_default()
    }

    /// Get the number of conversations.
    #[must_use]
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.inner.conversations.read().unwrap().len()
    }

    /// Check if there are no conversations.
    #[must_use]
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove conversations that have been inactive longer than the timeout.
    ///
    /// Returns the number of conversations removed. Nothing schedules this
    /// internally; operators wire it to a maintenance task when retention
    /// matters.
    #[allow(dead_code)]
    pub fn evict_idle(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.conversations.write().unwrap();
        let before = guard.len();
        guard.retain(|_, conversation| !conversation.is_idle(timeout));
        before - guard.len()
    }

    /// List all conversation IDs, in no particular order.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.inner
            .conversations
            .read()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }
}
