//! # Versemark
//!
//! Local-first annotation core for a devotional scripture reader:
//! highlights, notes, and bookmarks, persisted on-device and optionally
//! synced to a hosted backend once the user signs in.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        VERSEMARK MODULES                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │  Selection  │  │    Store    │  │  Migration  │  │     Live     │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Toggle    │  │ - Facade    │  │ - One-time  │  │ - Poll       │   │
//! │  │ - Ranges    │  │ - Local     │  │   transfer  │  │ - Watch      │   │
//! │  │ - Copy text │  │ - Remote    │  │ - Batched   │  │ - Cancel     │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         │                │                │                │           │
//! │         └────────────────┴────────────────┴────────────────┘           │
//! │                                   │                                     │
//! │  ┌─────────────┐  ┌─────────────┐ │ ┌─────────────────────────────────┐│
//! │  │    Auth     │  │    Text     │ │ │            Error                ││
//! │  │             │  │             │ │ │                                 ││
//! │  │ - Session   │  │ - Books     │◄┘ │ - One enum, categorized         ││
//! │  │   provider  │  │ - Cache     │   │ - Conflict classification       ││
//! │  └─────────────┘  └─────────────┘   └─────────────────────────────────┘│
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`auth`] - Session type and the authentication collaborator contract
//! - [`store`] - The annotation store: facade, local SQLite, remote REST
//! - [`migration`] - One-time local → remote transfer on first login
//! - [`selection`] - Transient per-chapter verse selection state
//! - [`text`] - Scripture text types, loading, and the explicit book cache
//! - [`live`] - Polling live queries with view-lifetime cancellation
//! - [`time`] - Timestamp helpers
//!
//! ## Data Flow
//!
//! ```text
//! UI selection events → VerseSelection → AnnotationStore (facade)
//!     → LocalStore | RemoteStore → UI re-render via LiveQuery
//! ```
//!
//! On first login the [`migration::Migrator`] drains the local store into
//! the remote one, after which the facade routes every call for that
//! session to the remote backend.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod auth;
pub mod error;
pub mod live;
pub mod migration;
pub mod selection;
pub mod store;
pub mod text;
/// Timestamp helpers shared across the storage layers.
pub mod time;

#[cfg(test)]
pub(crate) mod testutil;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use auth::{Session, SessionProvider, StaticSessionProvider};
pub use error::{Error, Result};
pub use live::LiveQuery;
pub use migration::{MigrationOutcome, MigrationState, Migrator};
pub use selection::{VerseRange, VerseSelection};
pub use store::{
    AnnotationBackend, AnnotationId, AnnotationStore, Bookmark, Highlight, HighlightColor,
    HighlightToggle, LocalStore, Note, RemoteConfig, RemoteStore,
};
pub use text::{Book, BookCache, BookSource, FsBookSource};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of the annotation core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
