//! # Annotation Store
//!
//! Dual-backend persistence for the three annotation kinds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ANNOTATION STORE                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │       UI        │  selection events, chapter views                  │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │ AnnotationStore │  facade: one entry point for all CRUD             │
//! │  │    (facade)     │  routes per-call on session state                 │
//! │  └───┬─────────┬───┘                                                   │
//! │      │         │                                                       │
//! │ no session   session                                                   │
//! │      │         │                                                       │
//! │      ▼         ▼                                                       │
//! │  ┌────────┐ ┌─────────┐                                                │
//! │  │ Local  │ │ Remote  │   both implement AnnotationBackend             │
//! │  │ Store  │ │ Store   │                                                │
//! │  ├────────┤ ├─────────┤                                                │
//! │  │ SQLite │ │ hosted  │                                                │
//! │  │ on-    │ │ REST,   │                                                │
//! │  │ device │ │ per-user│                                                │
//! │  └────────┘ └─────────┘                                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All three record kinds share one addressing scheme — (book id, chapter,
//! verse-or-range) — and are independent: a single verse can carry a
//! highlight, belong to a note's range, and belong to a bookmark's range at
//! the same time.

mod facade;
mod local;
mod remote;
mod schema;

pub use facade::AnnotationStore;
pub use facade::HighlightToggle;
pub use local::LocalStore;
pub use remote::{RemoteConfig, RemoteStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Opaque annotation identifier.
///
/// The local backend uses auto-incrementing integer rowids; the remote
/// backend uses server-assigned tokens. Both are carried as strings above
/// the backend boundary, and each backend converts to its native key type
/// internally. Callers never see the difference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for AnnotationId {
    fn from(rowid: i64) -> Self {
        Self(rowid.to_string())
    }
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// RECORD TYPES
// ============================================================================

/// Highlight color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    /// Yellow marker
    Yellow,
    /// Green marker
    Green,
    /// Blue marker
    Blue,
    /// Pink marker
    Pink,
    /// Orange marker
    Orange,
}

impl HighlightColor {
    /// Stable lowercase name, as stored in both backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
            HighlightColor::Orange => "orange",
        }
    }

    /// All palette colors, in display order.
    pub const ALL: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Orange,
    ];
}

impl std::str::FromStr for HighlightColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yellow" => Ok(HighlightColor::Yellow),
            "green" => Ok(HighlightColor::Green),
            "blue" => Ok(HighlightColor::Blue),
            "pink" => Ok(HighlightColor::Pink),
            "orange" => Ok(HighlightColor::Orange),
            other => Err(Error::Internal(format!("unknown highlight color: {}", other))),
        }
    }
}

/// A color tag attached to exactly one verse.
///
/// Invariant: at most one highlight per (book, chapter, verse) at any time.
/// Writing a new color for an already-highlighted verse replaces the old
/// record rather than stacking a second one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    /// Backend-assigned identifier
    pub id: AnnotationId,
    /// Book identifier (e.g. "ruth", "matthew")
    pub book_id: String,
    /// Chapter number, 1-based
    pub chapter: u32,
    /// Verse number, 1-based
    pub verse: u32,
    /// Marker color
    pub color: HighlightColor,
    /// Creation time, unix millis
    pub created_at: i64,
}

/// A free-text annotation attached to a contiguous verse range.
///
/// Content is never empty; edits touch only `content` and `updated_at`,
/// never the range or `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Backend-assigned identifier
    pub id: AnnotationId,
    /// Book identifier
    pub book_id: String,
    /// Chapter number, 1-based
    pub chapter: u32,
    /// First verse of the range (inclusive)
    pub verse_start: u32,
    /// Last verse of the range (inclusive), >= verse_start
    pub verse_end: u32,
    /// Note body
    pub content: String,
    /// Creation time, unix millis
    pub created_at: i64,
    /// Last modification time, unix millis
    pub updated_at: i64,
}

/// A saved contiguous verse range with no content payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    /// Backend-assigned identifier
    pub id: AnnotationId,
    /// Book identifier
    pub book_id: String,
    /// Chapter number, 1-based
    pub chapter: u32,
    /// First verse of the range (inclusive)
    pub verse_start: u32,
    /// Last verse of the range (inclusive), >= verse_start
    pub verse_end: u32,
    /// Creation time, unix millis; drives most-recent-first listing
    pub created_at: i64,
}

impl Bookmark {
    /// True if `verse` falls inside this bookmark's range.
    pub fn covers(&self, verse: u32) -> bool {
        self.verse_start <= verse && verse <= self.verse_end
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Stable composite key for a single verse, used for UI lookup maps.
pub fn verse_key(book_id: &str, chapter: u32, verse: u32) -> String {
    format!("{}-{}-{}", book_id, chapter, verse)
}

/// True if any of `verses` falls inside any stored bookmark range.
///
/// This is an overlap/containment test, not exact-range equality: a verse
/// counts as bookmarked even when it is not an endpoint of the stored range.
pub fn bookmarks_cover(bookmarks: &[Bookmark], verses: &[u32]) -> bool {
    verses
        .iter()
        .any(|v| bookmarks.iter().any(|b| b.covers(*v)))
}

// ============================================================================
// BACKEND TRAIT
// ============================================================================

/// The operations both storage backends implement.
///
/// The facade holds both backends behind this trait and picks one per call
/// based on session state. Implementations must uphold:
///
/// - **Highlight exclusivity**: adding a highlight for a verse that already
///   has one deletes the prior entry first, atomically enough that a reader
///   never observes two highlights for the same verse.
/// - **Not-found-on-delete**: deleting a missing record is a no-op success.
/// - **Bookmark ordering**: `all_bookmarks` returns most recently created
///   first. Other listings only promise stability for an unchanged dataset.
/// - **Conflict signaling**: the timestamp-preserving `import_*` operations
///   report duplicate rows as [`Error::Conflict`] so the migration routine
///   can skip already-transferred batches.
#[async_trait]
pub trait AnnotationBackend: Send + Sync {
    // ------------------------------------------------------------------------
    // Highlights
    // ------------------------------------------------------------------------

    /// Add (or replace) the highlight on one verse.
    async fn add_highlight(
        &self,
        book_id: &str,
        chapter: u32,
        verse: u32,
        color: HighlightColor,
    ) -> Result<()>;

    /// Add (or replace) highlights on a set of verses, all with one color.
    async fn add_highlights(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
        color: HighlightColor,
    ) -> Result<()>;

    /// Remove the highlight on one verse, if any.
    async fn remove_highlight(&self, book_id: &str, chapter: u32, verse: u32) -> Result<()>;

    /// Remove highlights on a set of verses.
    async fn remove_highlights(&self, book_id: &str, chapter: u32, verses: &[u32]) -> Result<()>;

    /// All highlights in one chapter.
    async fn highlights_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Highlight>>;

    // ------------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------------

    /// Create a note on a contiguous verse range.
    async fn add_note(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
        content: &str,
    ) -> Result<()>;

    /// Replace a note's content and bump its modification time.
    async fn update_note(&self, id: &AnnotationId, content: &str) -> Result<()>;

    /// Delete a note. Missing ids are a no-op success.
    async fn delete_note(&self, id: &AnnotationId) -> Result<()>;

    /// All notes in one chapter.
    async fn notes_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Note>>;

    /// Every note the user has.
    async fn all_notes(&self) -> Result<Vec<Note>>;

    // ------------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------------

    /// Save a bookmark on a contiguous verse range.
    async fn add_bookmark(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
    ) -> Result<()>;

    /// Delete a bookmark. Missing ids are a no-op success.
    async fn delete_bookmark(&self, id: &AnnotationId) -> Result<()>;

    /// Delete every bookmark whose range overlaps any of `verses`.
    async fn delete_bookmarks_for_verses(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
    ) -> Result<()>;

    /// All bookmarks in one chapter.
    async fn bookmarks_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Bookmark>>;

    /// Every bookmark the user has, most recently created first.
    async fn all_bookmarks(&self) -> Result<Vec<Bookmark>>;

    // ------------------------------------------------------------------------
    // Bulk import (migration)
    // ------------------------------------------------------------------------

    /// Insert highlights preserving their original timestamps.
    async fn import_highlights(&self, highlights: &[Highlight]) -> Result<()>;

    /// Insert notes preserving their original timestamps.
    async fn import_notes(&self, notes: &[Note]) -> Result<()>;

    /// Insert bookmarks preserving their original timestamps.
    async fn import_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<()>;
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(start: u32, end: u32) -> Bookmark {
        Bookmark {
            id: AnnotationId::new("b1"),
            book_id: "matthew".to_string(),
            chapter: 5,
            verse_start: start,
            verse_end: end,
            created_at: 0,
        }
    }

    #[test]
    fn test_annotation_id_from_rowid() {
        let id = AnnotationId::from(42);
        assert_eq!(id.as_str(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_color_round_trip() {
        for color in HighlightColor::ALL {
            let parsed: HighlightColor = color.as_str().parse().unwrap();
            assert_eq!(parsed, color);
        }
        assert!("purple".parse::<HighlightColor>().is_err());
    }

    #[test]
    fn test_color_serde_is_lowercase() {
        let json = serde_json::to_string(&HighlightColor::Yellow).unwrap();
        assert_eq!(json, "\"yellow\"");
        let back: HighlightColor = serde_json::from_str("\"pink\"").unwrap();
        assert_eq!(back, HighlightColor::Pink);
    }

    #[test]
    fn test_verse_key() {
        assert_eq!(verse_key("ruth", 1, 2), "ruth-1-2");
    }

    #[test]
    fn test_bookmark_covers_interior_verse() {
        // Range 3-5: verse 4 is covered even though it is not an endpoint
        let b = bookmark(3, 5);
        assert!(b.covers(3));
        assert!(b.covers(4));
        assert!(b.covers(5));
        assert!(!b.covers(2));
        assert!(!b.covers(6));
    }

    #[test]
    fn test_bookmarks_cover_is_overlap_not_equality() {
        let stored = vec![bookmark(3, 5)];
        assert!(bookmarks_cover(&stored, &[4]));
        assert!(bookmarks_cover(&stored, &[1, 5]));
        assert!(!bookmarks_cover(&stored, &[1, 2, 6]));
        assert!(!bookmarks_cover(&stored, &[]));
    }
}
