//! # Error Handling
//!
//! This module provides the error types for the versemark annotation core.
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
//! │  │   ├── EmptyNoteContent      - Note content empty/whitespace-only    │
//! │  │   ├── EmptySelection        - Operation needs selected verses       │
//! │  │   ├── InvalidVerseRange     - verse_start > verse_end or zero       │
//! │  │   └── InvalidIdentifier     - Id cannot address the target backend  │
//! │  │                                                                      │
//! │  ├── Session Errors                                                    │
//! │  │   └── NotAuthenticated      - Remote op without a resolved user     │
//! │  │                                                                      │
//! │  ├── Local Storage Errors                                              │
//! │  │   ├── DatabaseError         - SQLite failure                        │
//! │  │   └── StorageReadError      - On-device file read failure           │
//! │  │                                                                      │
//! │  ├── Remote Errors                                                     │
//! │  │   ├── RemoteRequest         - Transport-level failure               │
//! │  │   ├── RemoteRejected        - Backend rejected the operation        │
//! │  │   └── Conflict              - Duplicate-key rejection               │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── SerializationError    - serde failure                         │
//! │      └── Internal              - Should not happen                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation errors are raised synchronously, before any I/O is attempted.
//! `Conflict` is the one error class a caller downgrades: the migration
//! routine treats a conflicted batch as already-migrated and continues.

use thiserror::Error;

/// Result type alias for versemark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the annotation core
///
/// All errors are categorized by concern to make error handling clearer
/// and to provide meaningful messages to callers.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Note content was empty or whitespace-only
    #[error("Note content must not be empty.")]
    EmptyNoteContent,

    /// An operation that needs selected verses was given none
    #[error("No verses selected.")]
    EmptySelection,

    /// A verse range was inverted or out of bounds
    #[error("Invalid verse range: {start}-{end}")]
    InvalidVerseRange {
        /// First verse of the rejected range
        start: u32,
        /// Last verse of the rejected range
        end: u32,
    },

    /// An identifier could not address the target backend
    #[error("Invalid annotation identifier: {0}")]
    InvalidIdentifier(String),

    // ========================================================================
    // Session Errors
    // ========================================================================

    /// A remote operation ran without a resolvable authenticated user
    #[error("Not authenticated. Remote operations require a valid session.")]
    NotAuthenticated,

    // ========================================================================
    // Local Storage Errors
    // ========================================================================

    /// SQLite failure in the local store
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Failed to read from on-device storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    // ========================================================================
    // Remote Errors
    // ========================================================================

    /// Transport-level failure talking to the hosted backend
    #[error("Remote request failed: {0}")]
    RemoteRequest(String),

    /// The hosted backend rejected the operation
    #[error("Remote backend rejected the operation (status {status}): {message}")]
    RemoteRejected {
        /// HTTP status code returned by the backend
        status: u16,
        /// Response body, as returned
        message: String,
    },

    /// Duplicate-key rejection from either backend
    #[error("Duplicate row rejected: {0}")]
    Conflict(String),

    // ========================================================================
    // Internal Errors
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check whether this error is a duplicate-key conflict.
    ///
    /// The migration batch loop is the only caller that downgrades this
    /// class into a non-fatal "already done" signal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check whether this error is a synchronous validation failure
    /// (raised before any I/O was attempted).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyNoteContent
                | Error::EmptySelection
                | Error::InvalidVerseRange { .. }
                | Error::InvalidIdentifier(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        // Unique-constraint violations carry the same meaning as the remote
        // backend's duplicate-key rejection and must classify identically.
        if let rusqlite::Error::SqliteFailure(ref e, ref msg) = err {
            if e.code == rusqlite::ErrorCode::ConstraintViolation {
                return Error::Conflict(
                    msg.clone().unwrap_or_else(|| "unique constraint".to_string()),
                );
            }
        }
        Error::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RemoteRequest(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageReadError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
