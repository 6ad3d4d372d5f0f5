//! # Error Handling
//!
//! Error types for the messaging engine.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Validation Errors                                                 │
//! │  │   ├── EmptyMessage      - No text content and no attachment         │
//! │  │   └── SelfMessage       - Sender and receiver are the same user     │
//! │  │                                                                      │
//! │  ├── Auth Errors                                                       │
//! │  │   └── NotAuthenticated  - No local identity supplied                │
//! │  │                                                                      │
//! │  ├── Messaging Errors                                                  │
//! │  │   └── ReaderClosed      - Refresh on a closed conversation reader   │
//! │  │                                                                      │
//! │  └── Storage Errors                                                    │
//! │      └── StoreUnavailable  - The durable store cannot be reached       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers distinguish the classes through [`Error::is_validation`] and
//! [`Error::is_retryable`]: validation failures are corrected and resent,
//! auth failures are surfaced unchanged, and store unavailability is the
//! only class worth presenting as retryable.

use thiserror::Error;

/// Result type alias for messaging engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the messaging engine
///
/// All errors are categorized by domain to make error handling clearer
/// and to provide meaningful error messages to users.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors (100-199)
    // ========================================================================

    /// Message has neither text content nor an attachment
    #[error("Message must have text content or an attachment.")]
    EmptyMessage,

    /// Sender and receiver are the same user
    #[error("Cannot send a message to yourself.")]
    SelfMessage,

    // ========================================================================
    // Auth Errors (200-299)
    // ========================================================================

    /// No authenticated local user was supplied for the call
    #[error("No authenticated user. Sign in before using the messaging service.")]
    NotAuthenticated,

    // ========================================================================
    // Messaging Errors (300-399)
    // ========================================================================

    /// The conversation reader has been closed
    #[error("Conversation reader is closed.")]
    ReaderClosed,

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// The durable message store cannot be reached
    #[error("Message store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Validation
    /// - 200-299: Auth
    /// - 300-399: Messaging
    /// - 400-499: Storage
    pub fn code(&self) -> i32 {
        match self {
            // Validation (100-199)
            Error::EmptyMessage => 100,
            Error::SelfMessage => 101,

            // Auth (200-299)
            Error::NotAuthenticated => 200,

            // Messaging (300-399)
            Error::ReaderClosed => 300,

            // Storage (400-499)
            Error::StoreUnavailable(_) => 400,
        }
    }

    /// Check if this error is a validation failure
    ///
    /// Validation failures are recovered locally: the caller corrects the
    /// input and resends. They are never fatal.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::EmptyMessage | Error::SelfMessage)
    }

    /// Check if this error is worth retrying
    ///
    /// Only transient store unavailability qualifies. The engine itself
    /// never retries; retry policy belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
