//! # Lyceum Core
//!
//! Messaging and read-state engine for the Lyceum academy platform:
//! ordered direct messages between two users, consistent unread counts
//! under concurrent sends and reads, and live delivery to open
//! conversations without manual refresh.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LYCEUM CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                       MessagingService                           │  │
//! │  │        send · fetch conversation · unread summary · close        │  │
//! │  └───────┬──────────────────┬──────────────────┬────────────────────┘  │
//! │          │                  │                  │                       │
//! │          ▼                  ▼                  ▼                       │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐            │
//! │  │ UnreadIndex  │   │LiveUpdate-   │   │ConversationReader│            │
//! │  │              │   │Channel       │   │                  │            │
//! │  │ - summary    │   │ - publish    │   │ - refresh        │            │
//! │  │ - invalidate │   │ - fan-out    │   │ - mark read      │            │
//! │  └──────┬───────┘   └──────────────┘   └────────┬─────────┘            │
//! │         │                                       │                      │
//! │         └───────────────┬───────────────────────┘                      │
//! │                         ▼                                              │
//! │                ┌──────────────────┐                                    │
//! │                │   MessageStore   │   SQLite, single source of truth   │
//! │                └──────────────────┘                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`storage`] - Durable message store (SQLite)
//! - [`messaging`] - Message type, service, unread index, live channel, readers
//! - [`directory`] - User directory integration seam
//!
//! ## Design Invariant
//!
//! The live update channel is an optimization for latency, never a
//! correctness dependency: a dropped or duplicated notification changes
//! nothing, because every explicit refresh and summary call re-derives
//! from the durable store. Push says "look again"; the store says what is.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod directory;
pub mod error;
pub mod messaging;
pub mod storage;
/// Timestamp helpers backing store-assigned ordering keys.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use directory::{InMemoryDirectory, Role, UserDirectory, UserProfile};
pub use error::{Error, Result};
pub use messaging::channel::{LiveUpdateChannel, StoreEvent};
pub use messaging::reader::ConversationReader;
pub use messaging::unread::{UnreadIndex, UnreadSummary};
pub use messaging::{ConversationView, Message, MessagingService};
pub use storage::MessageStore;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for opening the messaging engine
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Database file path; None opens an in-memory store (tests)
    pub storage_path: Option<String>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_opens_in_memory_engine() {
        let config = EngineConfig::default();
        assert!(config.storage_path.is_none());
        assert!(MessagingService::open(&config).is_ok());
    }
}
