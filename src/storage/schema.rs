//! # Database Schema
//!
//! SQL schema definitions for the message store.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │    messages     │                                                    │
//! │  ├─────────────────┤                                                    │
//! │  │ id              │  UUID, assigned at append                          │
//! │  │ sender_id       │  opaque user id                                    │
//! │  │ receiver_id     │  opaque user id                                    │
//! │  │ content         │  text body                                         │
//! │  │ attachment_ref  │  opaque URL, nullable                              │
//! │  │ created_at      │  store-assigned ms, strictly increasing            │
//! │  │ read            │  0 → 1 exactly once, never reversed                │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conversation for a pair is the set of rows matching the pair in
//! either direction, ordered by `(created_at, id)`. Unread summaries are
//! always re-derivable from the unread partial index.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Messages table
-- One row per direct message; rows are append-only and immutable apart
-- from the read bit.
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    -- Who sent the message
    sender_id TEXT NOT NULL,
    -- Who it is addressed to (never equal to sender_id)
    receiver_id TEXT NOT NULL,
    -- Text body ('' is allowed when attachment_ref is set)
    content TEXT NOT NULL,
    -- Opaque URL to external content; never fetched or validated
    attachment_ref TEXT,
    -- Store-assigned Unix timestamp (ms); strictly increasing so the
    -- (created_at, id) ordering key always matches append order
    created_at INTEGER NOT NULL,
    -- Receiver-driven read bit
    read INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_messages_pair_forward ON messages(sender_id, receiver_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_pair_reverse ON messages(receiver_id, sender_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(receiver_id, sender_id) WHERE read = 0;
"#;
