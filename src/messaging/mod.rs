//! # Messaging Module
//!
//! Direct messaging between two platform users, with receiver-driven
//! read-state and live delivery to open conversations.
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          MESSAGE DATA FLOW                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  UI / directory (external)                                             │
//! │        │ counterpart id + authenticated local user                     │
//! │        ▼                                                                │
//! │  ┌──────────────────┐   send / fetch / summary                         │
//! │  │ MessagingService │──────────────────────────────┐                    │
//! │  └────────┬─────────┘                              │                    │
//! │           │ append                                 │ summary            │
//! │           ▼                                        ▼                    │
//! │  ┌──────────────────┐  invalidate        ┌──────────────────┐           │
//! │  │   MessageStore   │───────────────────►│   UnreadIndex    │           │
//! │  └────────┬─────────┘                    └──────────────────┘           │
//! │           │ publish                                                     │
//! │           ▼                                                             │
//! │  ┌──────────────────┐  pair match        ┌──────────────────┐           │
//! │  │ LiveUpdateChannel│───────────────────►│ConversationReader│──► UI     │
//! │  └──────────────────┘  refresh()         └──────────────────┘           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The read model is single-bit and receiver-driven: a message becomes
//! read when its receiver opens or refreshes the thread, and the sender
//! learns about it only by re-fetching. There is no separate "delivered"
//! state and no receipt messages.

pub mod channel;
pub mod reader;
pub mod unread;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::directory::{UserDirectory, UserProfile};
use crate::error::{Error, Result};
use crate::storage::MessageStore;
use crate::EngineConfig;

use channel::{LiveUpdateChannel, StoreEvent};
use reader::ConversationReader;
use unread::{UnreadIndex, UnreadSummary};

/// A direct message between two users
///
/// Immutable once appended, except for the `read` bit which transitions
/// `false → true` exactly once. Serializes with camelCase field names,
/// matching the shape the platform's clients consume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID (UUID), assigned at append
    pub id: String,
    /// Who sent the message
    pub sender_id: String,
    /// Who it is addressed to
    pub receiver_id: String,
    /// Text body; may be empty only when an attachment is present
    pub content: String,
    /// Opaque URL to external content; never fetched or validated
    pub attachment_ref: Option<String>,
    /// Store-assigned Unix timestamp (ms); the ordering key with `id`
    pub created_at: i64,
    /// Whether the receiver has read it
    pub read: bool,
}

impl Message {
    /// Check if this message was sent by the given user
    pub fn is_outgoing(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }

    /// Check if this message belongs to the unordered pair `{a, b}`
    pub fn matches_pair(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// One conversation snapshot, as returned by `fetch_conversation`
#[derive(Debug, Clone)]
pub struct ConversationView {
    /// The full ordered history for the pair
    pub messages: Vec<Message>,
    /// The local user's unread summary after the refresh consumed this
    /// conversation's unread state
    pub unread: UnreadSummary,
}

/// Messaging service: the public contract of the engine
///
/// Composes the message store, the unread index, the live update channel
/// and the open conversation readers. External collaborators (UI, auth,
/// directory) call this and nothing below it.
///
/// Reader fan-out tasks are spawned on the ambient Tokio runtime, so
/// `open_conversation` and `fetch_conversation` must be called from within
/// one.
pub struct MessagingService {
    /// Single source of truth for messages
    store: Arc<MessageStore>,
    /// Derived unread counts
    unread: Arc<UnreadIndex>,
    /// Best-effort notification bus
    channel: LiveUpdateChannel,
    /// Currently open conversation readers
    readers: RwLock<Vec<Arc<ConversationReader>>>,
}

impl MessagingService {
    /// Open the engine with the given configuration
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let store = Arc::new(MessageStore::open(config.storage_path.as_deref())?);
        Ok(Self::new(store))
    }

    /// Create a messaging service over an existing store
    pub fn new(store: Arc<MessageStore>) -> Self {
        let unread = Arc::new(UnreadIndex::new(store.clone()));
        Self {
            store,
            unread,
            channel: LiveUpdateChannel::new(),
            readers: RwLock::new(Vec::new()),
        }
    }

    /// Resolve the authenticated local user for a call
    ///
    /// The identity collaborator supplies it; the engine only checks
    /// presence, never credentials.
    fn require_user(local_user_id: Option<&str>) -> Result<&str> {
        match local_user_id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(Error::NotAuthenticated),
        }
    }

    /// Send a message from the local user to a counterpart
    ///
    /// Validates, appends to the store, invalidates the receiver's unread
    /// summary and publishes to the live channel. Channel delivery is
    /// best-effort and never surfaces as an error; the append either fully
    /// succeeded (the returned message is durable and visible) or fully
    /// failed.
    pub fn send(
        &self,
        local_user_id: Option<&str>,
        counterpart_id: &str,
        content: &str,
        attachment_ref: Option<&str>,
    ) -> Result<Message> {
        let sender = Self::require_user(local_user_id)?;

        let message = self
            .store
            .append(sender, counterpart_id, content, attachment_ref)?;

        // Unread state changed for the receiver the moment the append
        // became durable.
        self.unread.invalidate(&message.receiver_id);
        self.channel.publish(&message);

        Ok(message)
    }

    /// Open a fresh conversation reader for the pair
    ///
    /// Always creates a new reader, so one user can hold several readers
    /// for the same pair (two sessions). The reader is registered with the
    /// live channel and refreshed automatically on matching appends until
    /// closed.
    pub fn open_conversation(
        &self,
        local_user_id: Option<&str>,
        counterpart_id: &str,
    ) -> Result<Arc<ConversationReader>> {
        let local = Self::require_user(local_user_id)?;

        let reader = Arc::new(ConversationReader::new(
            local,
            counterpart_id,
            self.store.clone(),
            self.unread.clone(),
        ));
        self.channel.attach_reader(&reader);
        self.readers.write().push(reader.clone());

        Ok(reader)
    }

    /// Fetch a conversation, reusing an open reader when one exists
    ///
    /// Returns the refreshed history plus the local user's post-refresh
    /// unread summary, which the refresh has just consumed for this
    /// counterpart.
    pub fn fetch_conversation(
        &self,
        local_user_id: Option<&str>,
        counterpart_id: &str,
    ) -> Result<ConversationView> {
        let local = Self::require_user(local_user_id)?;

        let reader = match self.find_reader(local, counterpart_id) {
            Some(reader) => reader,
            None => self.open_conversation(Some(local), counterpart_id)?,
        };

        let messages = reader.refresh()?;
        let unread = self.unread.summary(local)?;

        Ok(ConversationView { messages, unread })
    }

    /// Close a conversation reader and unregister it
    ///
    /// Effective immediately; at most one already-in-flight notification
    /// may still reach the reader, and it resolves as a no-op.
    pub fn close_conversation(&self, reader: &Arc<ConversationReader>) {
        reader.close();
        self.readers.write().retain(|open| !Arc::ptr_eq(open, reader));
    }

    /// The local user's unread counts, keyed by sender
    pub fn fetch_unread_summary(&self, local_user_id: Option<&str>) -> Result<UnreadSummary> {
        let local = Self::require_user(local_user_id)?;
        self.unread.summary(local)
    }

    /// The local user's total unread count, across all senders
    pub fn fetch_unread_total(&self, local_user_id: Option<&str>) -> Result<u64> {
        let local = Self::require_user(local_user_id)?;
        self.unread.total(local)
    }

    /// List possible counterparts from the user directory
    ///
    /// Delegates to the external directory collaborator, excludes the
    /// local user and sorts by username. Display-side filtering (search
    /// box) stays with the UI.
    pub fn list_counterparts(
        &self,
        local_user_id: Option<&str>,
        directory: &dyn UserDirectory,
    ) -> Result<Vec<UserProfile>> {
        let local = Self::require_user(local_user_id)?;

        let mut users: Vec<UserProfile> = directory
            .list_users()?
            .into_iter()
            .filter(|user| user.id != local)
            .collect();
        users.sort_by(|a, b| a.username.to_lowercase().cmp(&b.username.to_lowercase()));

        Ok(users)
    }

    /// Subscribe to store events
    ///
    /// For external collaborators that react to appends without holding a
    /// reader, like the sidebar unread badge: on `UnreadChanged`, re-fetch
    /// the summary.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.channel.subscribe()
    }

    fn find_reader(&self, local: &str, counterpart: &str) -> Option<Arc<ConversationReader>> {
        self.readers
            .read()
            .iter()
            .find(|reader| {
                !reader.is_closed()
                    && reader.local_user_id() == local
                    && reader.counterpart_id() == counterpart
            })
            .cloned()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, Role};
    use std::time::Duration;
    use tokio::time::timeout;

    fn open_service() -> MessagingService {
        MessagingService::open(&EngineConfig::default()).unwrap()
    }

    fn profile(id: &str, username: &str, role: Role) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            username: username.to_string(),
            role,
            avatar_url: None,
        }
    }

    #[test]
    fn test_send_requires_authentication() {
        let service = open_service();

        assert!(matches!(
            service.send(None, "bob", "hi", None),
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            service.send(Some("   "), "bob", "hi", None),
            Err(Error::NotAuthenticated)
        ));
    }

    #[test]
    fn test_send_validates_input() {
        let service = open_service();

        let err = service.send(Some("alice"), "bob", "", None).unwrap_err();
        assert!(err.is_validation());

        let err = service.send(Some("alice"), "alice", "hi", None).unwrap_err();
        assert!(matches!(err, Error::SelfMessage));

        // Attachment-only messages are valid
        let message = service
            .send(Some("alice"), "bob", "", Some("https://x/file.pdf"))
            .unwrap();
        assert_eq!(message.attachment_ref.as_deref(), Some("https://x/file.pdf"));
    }

    #[test]
    fn test_same_sender_messages_keep_send_order() {
        let service = open_service();

        service.send(Some("alice"), "bob", "1", None).unwrap();
        service.send(Some("alice"), "bob", "2", None).unwrap();

        let history = service.store.history("alice", "bob").unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "2"]);
    }

    #[test]
    fn test_unread_summary_tracks_sends() {
        let service = open_service();

        service.send(Some("alice"), "bob", "1", None).unwrap();
        service.send(Some("alice"), "bob", "2", None).unwrap();
        service.send(Some("carol"), "bob", "3", None).unwrap();

        let summary = service.fetch_unread_summary(Some("bob")).unwrap();
        assert_eq!(summary.get("alice"), Some(&2));
        assert_eq!(summary.get("carol"), Some(&1));
        assert_eq!(service.fetch_unread_total(Some("bob")).unwrap(), 3);

        // Sender's own summary is untouched
        assert!(service.fetch_unread_summary(Some("alice")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_conversation_consumes_unread() {
        let service = open_service();

        service.send(Some("alice"), "bob", "hello", None).unwrap();
        service.send(Some("alice"), "bob", "again", None).unwrap();

        let view = service.fetch_conversation(Some("bob"), "alice").unwrap();
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].content, "hello");
        // Viewing the thread consumed alice's unread count
        assert!(view.unread.is_empty());
        assert_eq!(service.fetch_unread_total(Some("bob")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_conversation_reuses_open_reader() {
        let service = open_service();

        let reader = service.open_conversation(Some("bob"), "alice").unwrap();
        let rx = reader.subscribe_refreshes();

        service.send(Some("bob"), "alice", "hi", None).unwrap();
        let view = service.fetch_conversation(Some("bob"), "alice").unwrap();
        assert_eq!(view.messages.len(), 1);

        // The fetch refreshed the already-open reader rather than a new one
        assert!(*rx.borrow() >= 1);
        assert_eq!(reader.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_reaches_matching_reader_only() {
        let service = open_service();

        let reader_a = service.open_conversation(Some("userX"), "userY").unwrap();
        let reader_b = service.open_conversation(Some("userX"), "userZ").unwrap();
        let mut rx_a = reader_a.subscribe_refreshes();
        let rx_b = reader_b.subscribe_refreshes();

        service.send(Some("userY"), "userX", "hello", None).unwrap();

        timeout(Duration::from_secs(1), rx_a.changed())
            .await
            .expect("matching reader was not refreshed")
            .unwrap();

        let messages = reader_a.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");

        // The non-matching reader saw nothing
        assert!(!rx_b.has_changed().unwrap());
        assert!(reader_b.messages().is_empty());

        // The live refresh consumed userX's unread state for userY
        let summary = service.fetch_unread_summary(Some("userX")).unwrap();
        assert_eq!(summary.get("userY"), None);
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_reader_for_the_pair() {
        let service = open_service();

        // Two sessions of the same user, same pair
        let first = service.open_conversation(Some("userX"), "userY").unwrap();
        let second = service.open_conversation(Some("userX"), "userY").unwrap();
        let mut rx_first = first.subscribe_refreshes();
        let mut rx_second = second.subscribe_refreshes();

        service.send(Some("userY"), "userX", "to both", None).unwrap();

        timeout(Duration::from_secs(1), rx_first.changed())
            .await
            .expect("first reader was not refreshed")
            .unwrap();
        timeout(Duration::from_secs(1), rx_second.changed())
            .await
            .expect("second reader was not refreshed")
            .unwrap();

        assert_eq!(first.messages().len(), 1);
        assert_eq!(second.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_reader_receives_no_notifications() {
        let service = open_service();

        let reader = service.open_conversation(Some("userX"), "userY").unwrap();
        let rx = reader.subscribe_refreshes();

        service.close_conversation(&reader);
        service.send(Some("userY"), "userX", "too late", None).unwrap();

        // Give the fan-out task time to observe and discard the event
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!rx.has_changed().unwrap());
        assert!(matches!(reader.refresh(), Err(Error::ReaderClosed)));

        // Nothing consumed the unread state
        let summary = service.fetch_unread_summary(Some("userX")).unwrap();
        assert_eq!(summary.get("userY"), Some(&1));
    }

    #[tokio::test]
    async fn test_subscribe_surfaces_store_events() {
        let service = open_service();
        let mut rx = service.subscribe();

        service.send(Some("alice"), "bob", "hi", None).unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, StoreEvent::MessageStored { .. }));

        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        match second {
            StoreEvent::UnreadChanged { receiver_id } => assert_eq!(receiver_id, "bob"),
            other => panic!("Expected UnreadChanged, got {:?}", other),
        }
    }

    #[test]
    fn test_list_counterparts_excludes_self_and_sorts() {
        let service = open_service();
        let directory = InMemoryDirectory::new(vec![
            profile("u3", "Charlie", Role::Student),
            profile("u1", "alice", Role::Instructor),
            profile("u2", "Bob", Role::Student),
        ]);

        let counterparts = service
            .list_counterparts(Some("u2"), &directory)
            .unwrap();

        let usernames: Vec<&str> = counterparts.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(usernames, vec!["alice", "Charlie"]);
    }

    #[test]
    fn test_message_direction_helpers() {
        let message = Message {
            id: "m1".to_string(),
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            content: "hi".to_string(),
            attachment_ref: None,
            created_at: 1_700_000_000_000,
            read: false,
        };

        assert!(message.is_outgoing("alice"));
        assert!(!message.is_outgoing("bob"));

        assert!(message.matches_pair("alice", "bob"));
        assert!(message.matches_pair("bob", "alice"));
        assert!(!message.matches_pair("alice", "carol"));
    }

    #[test]
    fn test_message_serializes_with_camel_case_fields() {
        let message = Message {
            id: "m1".to_string(),
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            content: "hi".to_string(),
            attachment_ref: Some("https://x/file.pdf".to_string()),
            created_at: 1_700_000_000_000,
            read: false,
        };

        let value = serde_json::to_value(&message).unwrap();
        let object = value.as_object().unwrap();
        for field in ["id", "senderId", "receiverId", "content", "attachmentRef", "createdAt", "read"] {
            assert!(object.contains_key(field), "Missing field: {}", field);
        }

        let restored: Message = serde_json::from_value(value).unwrap();
        assert_eq!(restored, message);
    }
}
