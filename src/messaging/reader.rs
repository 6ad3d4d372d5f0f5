//! # Conversation Reader
//!
//! The read-side contract for one open conversation between a local user
//! and a counterpart. A reader holds affinity to its pair: `refresh()`
//! re-reads the durable history and consumes the local user's unread state
//! for that counterpart, exactly like opening or re-opening the thread in
//! the UI.
//!
//! Readers are refreshed from two directions: explicitly by the caller,
//! and by the live update channel's fan-out task when a matching message
//! is appended. Both paths go through the same `refresh()`, so the store
//! stays the only source of truth regardless of which notifications were
//! delivered or dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::messaging::unread::UnreadIndex;
use crate::messaging::Message;
use crate::storage::MessageStore;

/// An open view onto one two-party conversation
pub struct ConversationReader {
    /// The authenticated user this reader belongs to
    local_user_id: String,
    /// The other party in the conversation
    counterpart_id: String,
    /// Source of truth for history and read transitions
    store: Arc<MessageStore>,
    /// Invalidated whenever a refresh consumes unread state
    unread: Arc<UnreadIndex>,
    /// Set by close(); checked before every refresh
    closed: AtomicBool,
    /// Last refresh result, for callers that render the snapshot
    snapshot: RwLock<Vec<Message>>,
    /// Bumped on every successful refresh
    generation_tx: watch::Sender<u64>,
}

impl ConversationReader {
    /// Open a reader with affinity to the given pair
    ///
    /// Opening moves no data; the first `refresh()` does.
    pub(crate) fn new(
        local_user_id: &str,
        counterpart_id: &str,
        store: Arc<MessageStore>,
        unread: Arc<UnreadIndex>,
    ) -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            local_user_id: local_user_id.to_string(),
            counterpart_id: counterpart_id.to_string(),
            store,
            unread,
            closed: AtomicBool::new(false),
            snapshot: RwLock::new(Vec::new()),
            generation_tx,
        }
    }

    /// The local user this reader belongs to
    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    /// The counterpart in the conversation
    pub fn counterpart_id(&self) -> &str {
        &self.counterpart_id
    }

    /// Re-read the conversation from the store
    ///
    /// Returns the full ordered history for the pair, then marks the
    /// counterpart's messages read as a side effect: viewing a conversation
    /// consumes its unread state. The snapshot is retained (see
    /// [`messages`](Self::messages)) and the refresh generation is bumped
    /// so subscribers can re-render.
    ///
    /// Fails with [`Error::ReaderClosed`] after [`close`](Self::close); a
    /// late live notification racing a close resolves to this same no-op.
    pub fn refresh(&self) -> Result<Vec<Message>> {
        if self.is_closed() {
            return Err(Error::ReaderClosed);
        }

        let messages = self.store.history(&self.local_user_id, &self.counterpart_id)?;

        let transitioned = self
            .store
            .mark_read(&self.local_user_id, &self.counterpart_id)?;
        if transitioned > 0 {
            self.unread.invalidate(&self.local_user_id);
        }

        *self.snapshot.write() = messages.clone();
        self.generation_tx.send_modify(|generation| *generation += 1);

        Ok(messages)
    }

    /// The last refresh result
    pub fn messages(&self) -> Vec<Message> {
        self.snapshot.read().clone()
    }

    /// Subscribe to refresh notifications
    ///
    /// The watched value is a generation counter that increments on every
    /// successful refresh, whether caller-driven or live-channel-driven.
    pub fn subscribe_refreshes(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Check whether this reader has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release the reader's affinity
    ///
    /// Effective immediately: every later `refresh()`, including one
    /// triggered by an in-flight live notification, is a no-op.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::debug!(
            local = %self.local_user_id,
            counterpart = %self.counterpart_id,
            "Conversation reader closed"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
