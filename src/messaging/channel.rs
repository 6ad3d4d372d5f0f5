//! # Live Update Channel
//!
//! Notifies interested conversation readers that a new message affecting
//! their pair was appended, without requiring polling.
//!
//! ## Delivery Contract
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    AT-LEAST-ONCE, BEST-EFFORT DELIVERY                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  send() ──► store.append ──► publish(message)                          │
//! │                                   │                                     │
//! │                                   ▼  broadcast (never blocks sender)    │
//! │                        ┌──────────┴──────────┐                          │
//! │                        ▼                     ▼                          │
//! │              reader listener task    external subscriber                │
//! │              (pair match → refresh)  (sidebar badge → summary)          │
//! │                                                                         │
//! │  Dropped or duplicated events are fine: every refresh()/summary()      │
//! │  re-reads the durable store. The channel buys latency, never           │
//! │  correctness.                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::messaging::reader::ConversationReader;
use crate::messaging::Message;

/// Capacity of the broadcast bus; laggards fall back to a full refresh
const CHANNEL_CAPACITY: usize = 256;

/// Events published by the messaging service after a successful append
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A new message was appended to the store
    MessageStored {
        /// The stored message, as returned by the append
        message: Message,
    },

    /// The unread summary for a receiver changed
    ///
    /// Published for every append regardless of whether a reader is open
    /// for the pair, so a sidebar badge can update with no thread open.
    UnreadChanged {
        /// The receiver whose summary should be re-fetched
        receiver_id: String,
    },
}

/// Broadcast bus for store events
///
/// Subscribers are conversation reader listener tasks and any external
/// collaborator interested in unread badges. Publishing never blocks and
/// never fails the caller.
pub struct LiveUpdateChannel {
    /// Event broadcaster for subscribers
    event_tx: broadcast::Sender<StoreEvent>,
}

impl LiveUpdateChannel {
    /// Create a channel with no subscribers
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { event_tx }
    }

    /// Publish events for a freshly appended message
    ///
    /// Fire-and-forget: a bus with no subscribers is not an error, and a
    /// slow subscriber lags instead of back-pressuring the sender.
    pub fn publish(&self, message: &Message) {
        if self
            .event_tx
            .send(StoreEvent::MessageStored {
                message: message.clone(),
            })
            .is_err()
        {
            tracing::debug!(id = %message.id, "No live subscribers for stored message");
        }

        let _ = self.event_tx.send(StoreEvent::UnreadChanged {
            receiver_id: message.receiver_id.clone(),
        });
    }

    /// Subscribe to store events
    ///
    /// Multiple subscribers are supported; each gets every event published
    /// after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Attach a reader to the channel
    ///
    /// Spawns the fan-out task for one open reader: stored messages
    /// matching the reader's pair (in either direction) trigger a
    /// `refresh()`. The task holds only a weak reference and exits when
    /// the reader is closed or dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach_reader(&self, reader: &Arc<ConversationReader>) {
        let mut rx = self.subscribe();
        let weak = Arc::downgrade(reader);

        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed events are not replayed; one authoritative
                        // re-read covers whatever was dropped.
                        tracing::debug!(skipped, "Live channel lagged, refreshing from store");
                        match weak.upgrade() {
                            Some(reader) if !reader.is_closed() => {
                                let _ = reader.refresh();
                                continue;
                            }
                            _ => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let Some(reader) = weak.upgrade() else { break };
                if reader.is_closed() {
                    break;
                }

                if let StoreEvent::MessageStored { message } = event {
                    if message.matches_pair(reader.local_user_id(), reader.counterpart_id()) {
                        if let Err(e) = reader.refresh() {
                            // ReaderClosed here is the tolerated race of one
                            // in-flight notification against close().
                            tracing::debug!(error = %e, "Live refresh skipped");
                        }
                    }
                }
            }
        });
    }
}

impl Default for LiveUpdateChannel {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
