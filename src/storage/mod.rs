//! # Message Store
//!
//! Durable, append-only record of direct messages, queryable by user pair.
//! This is the single source of truth; unread summaries and reader
//! snapshots are derived from it and can be recomputed at any time.
//!
//! ## Store Operations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       MESSAGE STORE OPERATIONS                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │ MessagingService│                                                   │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐   append        assign (created_at, id), INSERT   │
//! │  │  MessageStore   │   history       both directions, ordered ASC      │
//! │  │   (this file)   │   mark_read     read = 0 → 1, one direction       │
//! │  │                 │   unread_counts GROUP BY sender over unread rows  │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   SQLite DB     │   In-memory for tests, file for production        │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All mutation goes through a single connection behind a mutex, so key
//! assignment and the mark-read transition are serialized: two appends can
//! never receive the same `(created_at, id)` key, and `mark_read` only
//! affects rows committed before it acquired the lock.

pub mod schema;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::messaging::unread::UnreadSummary;
use crate::messaging::Message;

/// The durable message store
///
/// Wraps a SQLite connection and provides the four primitive operations
/// every other component is built on.
pub struct MessageStore {
    /// The underlying SQLite connection
    conn: Mutex<Connection>,
}

impl MessageStore {
    /// Open or create a message store
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::StoreUnavailable(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::StoreUnavailable(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema()?;

        Ok(store)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        // Check current schema version
        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                // Fresh database, create all tables
                conn.execute_batch(schema::CREATE_TABLES).map_err(|e| {
                    Error::StoreUnavailable(format!("Failed to create tables: {}", e))
                })?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| {
                    Error::StoreUnavailable(format!("Failed to set schema version: {}", e))
                })?;

                tracing::info!("Message store schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v == schema::SCHEMA_VERSION => {
                tracing::debug!("Message store schema is current (version {})", v);
            }
            Some(v) => {
                return Err(Error::StoreUnavailable(format!(
                    "Unsupported schema version {} (expected {})",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
        }

        Ok(())
    }

    // ========================================================================
    // MESSAGE OPERATIONS
    // ========================================================================

    /// Append a message to the store
    ///
    /// Validates the input, assigns the `(created_at, id)` ordering key and
    /// inserts the row in a single statement: the append is either fully
    /// durable and visible, or fully failed with no partial record.
    ///
    /// `created_at` is assigned under the connection lock as
    /// `max(now, last + 1)`, so keys are unique and strictly increasing and
    /// one sender's successive appends can never reorder.
    pub fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        attachment_ref: Option<&str>,
    ) -> Result<Message> {
        if sender_id == receiver_id {
            return Err(Error::SelfMessage);
        }

        // Whitespace-only content counts as empty; an attachment alone is
        // enough to carry a message.
        let attachment_ref = attachment_ref.map(str::trim).filter(|a| !a.is_empty());
        if content.trim().is_empty() && attachment_ref.is_none() {
            return Err(Error::EmptyMessage);
        }

        let conn = self.conn.lock();

        let last_created_at: i64 = conn
            .query_row("SELECT COALESCE(MAX(created_at), 0) FROM messages", [], |row| {
                row.get(0)
            })?;
        let created_at = crate::time::now_timestamp_millis().max(last_created_at + 1);

        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            attachment_ref: attachment_ref.map(str::to_string),
            created_at,
            read: false,
        };

        conn.execute(
            "INSERT INTO messages (id, sender_id, receiver_id, content, attachment_ref, created_at, read)
             VALUES (?, ?, ?, ?, ?, ?, 0)",
            params![
                message.id,
                message.sender_id,
                message.receiver_id,
                message.content,
                message.attachment_ref,
                message.created_at,
            ],
        )
        .map_err(|e| Error::StoreUnavailable(format!("Failed to store message: {}", e)))?;

        tracing::debug!(
            id = %message.id,
            sender = %message.sender_id,
            receiver = %message.receiver_id,
            "Message appended"
        );

        Ok(message)
    }

    /// Get the full conversation history for a user pair
    ///
    /// Returns every message between the two users in either direction,
    /// ordered by `(created_at, id)` ascending. The result is a finite
    /// snapshot; callers re-invoke to observe later appends.
    pub fn history(&self, user_a: &str, user_b: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, receiver_id, content, attachment_ref, created_at, read
             FROM messages
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![user_a, user_b], |row| {
            Ok(Message {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                content: row.get(3)?,
                attachment_ref: row.get(4)?,
                created_at: row.get(5)?,
                read: row.get(6)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }

        Ok(messages)
    }

    /// Mark every unread message from `sender_id` to `receiver_id` as read
    ///
    /// Returns the number of messages transitioned. Idempotent: a second
    /// call with no intervening append returns 0. The single UPDATE runs
    /// under the connection lock, so it only affects rows visible at its
    /// start; a message appended afterwards stays unread.
    pub fn mark_read(&self, receiver_id: &str, sender_id: &str) -> Result<usize> {
        let conn = self.conn.lock();

        let transitioned = conn.execute(
            "UPDATE messages SET read = 1
             WHERE receiver_id = ?1 AND sender_id = ?2 AND read = 0",
            params![receiver_id, sender_id],
        )?;

        if transitioned > 0 {
            tracing::debug!(
                receiver = %receiver_id,
                sender = %sender_id,
                count = transitioned,
                "Messages marked read"
            );
        }

        Ok(transitioned)
    }

    /// Count unread messages for a receiver, grouped by sender
    pub fn unread_counts(&self, receiver_id: &str) -> Result<UnreadSummary> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT sender_id, COUNT(*) FROM messages
             WHERE receiver_id = ?1 AND read = 0
             GROUP BY sender_id",
        )?;

        let rows = stmt.query_map(params![receiver_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = UnreadSummary::new();
        for row in rows {
            let (sender_id, count) = row?;
            counts.insert(sender_id, count as u64);
        }

        Ok(counts)
    }
}

// ============================================================================
// TESTS
// ============================================================================
