//! # Unread Index
//!
//! Fast answer to "how many unread messages does receiver R have from each
//! sender". The index is derived, never authoritative: every summary it
//! hands out equals a `GROUP BY sender` over the unread rows in the
//! [`MessageStore`] at that moment, and any cached copy is dropped on the
//! append or mark-read that made it stale.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::MessageStore;

/// Per-receiver unread counts, keyed by sender
///
/// No iteration-order guarantee; consumers must not depend on it.
pub type UnreadSummary = HashMap<String, u64>;

/// Derived per-receiver aggregate of unread counts
///
/// Caches one summary per receiver to avoid recomputing on every UI
/// paint. The cache is safe to lose at any time; a miss recomputes from
/// the store.
pub struct UnreadIndex {
    /// Source of truth for recomputation
    store: Arc<MessageStore>,
    /// Cached summaries, keyed by receiver id
    cache: RwLock<HashMap<String, UnreadSummary>>,
}

impl UnreadIndex {
    /// Create an unread index over the given store
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Unread counts for a receiver, keyed by sender
    ///
    /// Served from cache when present. A miss recomputes while holding the
    /// cache write lock, so a concurrent [`invalidate`](Self::invalidate)
    /// cannot be overwritten by a stale fill.
    pub fn summary(&self, receiver_id: &str) -> Result<UnreadSummary> {
        let mut cache = self.cache.write();
        if let Some(summary) = cache.get(receiver_id) {
            return Ok(summary.clone());
        }

        let summary = self.store.unread_counts(receiver_id)?;
        cache.insert(receiver_id.to_string(), summary.clone());
        Ok(summary)
    }

    /// Total unread count for a receiver, across all senders
    ///
    /// Backs the sidebar badge that shows one aggregate number.
    pub fn total(&self, receiver_id: &str) -> Result<u64> {
        Ok(self.summary(receiver_id)?.values().sum())
    }

    /// Drop the cached summary for a receiver
    ///
    /// Called on every append (for the message's receiver) and every
    /// mark-read (for the reading user). The next `summary` call
    /// recomputes from the store.
    pub fn invalidate(&self, receiver_id: &str) {
        self.cache.write().remove(receiver_id);
    }
}

// ============================================================================
// TESTS
// ============================================================================
