//! # Unified Store Facade
//!
//! Single entry point for all annotation CRUD. Every call checks the
//! session state and routes to the remote backend when a user is signed in,
//! or to the local store otherwise. Callers never learn which backend
//! served them.
//!
//! A failed session check is not an error here: local operations are always
//! available offline, so the facade fails safe by treating the user as
//! unauthenticated and routing locally.
//!
//! Validation guards (empty note content, empty verse selections, inverted
//! ranges) run synchronously before any I/O. Backend errors propagate
//! unchanged — the facade is a pure router, never a translator.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    bookmarks_cover, AnnotationBackend, AnnotationId, Bookmark, Highlight, HighlightColor,
    LocalStore, Note,
};
use crate::auth::SessionProvider;
use crate::error::{Error, Result};
use crate::migration::{MigrationOutcome, Migrator};
use crate::selection::VerseSelection;

/// Result of a color toggle on the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightToggle {
    /// The color was applied to every selected verse
    Applied(HighlightColor),
    /// Every selected verse already carried the color, so it was removed
    Removed,
}

/// The annotation store the UI talks to.
pub struct AnnotationStore {
    local: Arc<LocalStore>,
    remote: Arc<dyn AnnotationBackend>,
    session: Arc<dyn SessionProvider>,
}

impl AnnotationStore {
    /// Wire the facade to its two backends and the session source.
    pub fn new(
        local: Arc<LocalStore>,
        remote: Arc<dyn AnnotationBackend>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            local,
            remote,
            session,
        }
    }

    /// The local store, for migration and diagnostics.
    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    /// Pick the backend for this call. Session-check failures route local.
    async fn backend(&self) -> Arc<dyn AnnotationBackend> {
        match self.session.current_session().await {
            Ok(Some(_)) => self.remote.clone(),
            Ok(None) => self.local.clone() as Arc<dyn AnnotationBackend>,
            Err(e) => {
                tracing::warn!("Session check failed, routing to local store: {}", e);
                self.local.clone() as Arc<dyn AnnotationBackend>
            }
        }
    }

    fn validate_range(verse_start: u32, verse_end: u32) -> Result<()> {
        if verse_start == 0 || verse_start > verse_end {
            return Err(Error::InvalidVerseRange {
                start: verse_start,
                end: verse_end,
            });
        }
        Ok(())
    }

    fn validate_content(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::EmptyNoteContent);
        }
        Ok(())
    }

    // ========================================================================
    // HIGHLIGHTS
    // ========================================================================

    /// Add (or replace) the highlight on one verse.
    pub async fn add_highlight(
        &self,
        book_id: &str,
        chapter: u32,
        verse: u32,
        color: HighlightColor,
    ) -> Result<()> {
        self.backend().await.add_highlight(book_id, chapter, verse, color).await
    }

    /// Add (or replace) highlights on a verse set.
    pub async fn add_highlights(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
        color: HighlightColor,
    ) -> Result<()> {
        if verses.is_empty() {
            return Err(Error::EmptySelection);
        }
        self.backend().await.add_highlights(book_id, chapter, verses, color).await
    }

    /// Remove the highlight on one verse.
    pub async fn remove_highlight(&self, book_id: &str, chapter: u32, verse: u32) -> Result<()> {
        self.backend().await.remove_highlight(book_id, chapter, verse).await
    }

    /// Remove highlights on a verse set. An empty set is a no-op.
    pub async fn remove_highlights(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
    ) -> Result<()> {
        if verses.is_empty() {
            return Ok(());
        }
        self.backend().await.remove_highlights(book_id, chapter, verses).await
    }

    /// All highlights in one chapter.
    pub async fn highlights_for_chapter(
        &self,
        book_id: &str,
        chapter: u32,
    ) -> Result<Vec<Highlight>> {
        self.backend().await.highlights_for_chapter(book_id, chapter).await
    }

    // ========================================================================
    // NOTES
    // ========================================================================

    /// Create a note. Empty content and inverted ranges are rejected before
    /// any I/O.
    pub async fn add_note(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
        content: &str,
    ) -> Result<()> {
        Self::validate_content(content)?;
        Self::validate_range(verse_start, verse_end)?;
        self.backend()
            .await
            .add_note(book_id, chapter, verse_start, verse_end, content)
            .await
    }

    /// Replace a note's content.
    pub async fn update_note(&self, id: &AnnotationId, content: &str) -> Result<()> {
        Self::validate_content(content)?;
        self.backend().await.update_note(id, content).await
    }

    /// Delete a note. Missing ids are a no-op success.
    pub async fn delete_note(&self, id: &AnnotationId) -> Result<()> {
        self.backend().await.delete_note(id).await
    }

    /// All notes in one chapter.
    pub async fn notes_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Note>> {
        self.backend().await.notes_for_chapter(book_id, chapter).await
    }

    /// Every note the user has.
    pub async fn all_notes(&self) -> Result<Vec<Note>> {
        self.backend().await.all_notes().await
    }

    // ========================================================================
    // BOOKMARKS
    // ========================================================================

    /// Save a bookmark on a verse range.
    pub async fn add_bookmark(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
    ) -> Result<()> {
        Self::validate_range(verse_start, verse_end)?;
        self.backend()
            .await
            .add_bookmark(book_id, chapter, verse_start, verse_end)
            .await
    }

    /// Delete a bookmark. Missing ids are a no-op success.
    pub async fn delete_bookmark(&self, id: &AnnotationId) -> Result<()> {
        self.backend().await.delete_bookmark(id).await
    }

    /// Delete every bookmark overlapping the verse set. Empty sets no-op.
    pub async fn delete_bookmarks_for_verses(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
    ) -> Result<()> {
        if verses.is_empty() {
            return Ok(());
        }
        self.backend()
            .await
            .delete_bookmarks_for_verses(book_id, chapter, verses)
            .await
    }

    /// All bookmarks in one chapter.
    pub async fn bookmarks_for_chapter(
        &self,
        book_id: &str,
        chapter: u32,
    ) -> Result<Vec<Bookmark>> {
        self.backend().await.bookmarks_for_chapter(book_id, chapter).await
    }

    /// Every bookmark, most recently created first.
    pub async fn all_bookmarks(&self) -> Result<Vec<Bookmark>> {
        self.backend().await.all_bookmarks().await
    }

    // ========================================================================
    // SELECTION-DRIVEN OPERATIONS
    // ========================================================================

    /// Toggle a color on the current selection.
    ///
    /// If every selected verse already carries `color` the highlights are
    /// removed; otherwise the color is applied (replacing any other colors).
    pub async fn toggle_highlight_for_selection(
        &self,
        selection: &VerseSelection,
        color: HighlightColor,
    ) -> Result<HighlightToggle> {
        let verses = selection.verse_numbers();
        if verses.is_empty() {
            return Err(Error::EmptySelection);
        }
        let (book_id, chapter) = selection.context();

        let current: HashMap<u32, HighlightColor> = self
            .highlights_for_chapter(book_id, chapter)
            .await?
            .into_iter()
            .map(|h| (h.verse, h.color))
            .collect();

        let all_have_color = verses.iter().all(|v| current.get(v) == Some(&color));

        if all_have_color {
            self.remove_highlights(book_id, chapter, &verses).await?;
            Ok(HighlightToggle::Removed)
        } else {
            self.add_highlights(book_id, chapter, &verses, color).await?;
            Ok(HighlightToggle::Applied(color))
        }
    }

    /// Bookmark the bounding range of the current selection.
    pub async fn bookmark_selection(&self, selection: &VerseSelection) -> Result<()> {
        let range = selection.range().ok_or(Error::EmptySelection)?;
        let (book_id, chapter) = selection.context();
        self.add_bookmark(book_id, chapter, range.start, range.end).await
    }

    /// True if any selected verse falls inside any stored bookmark range
    /// for the selection's chapter.
    pub async fn is_selection_bookmarked(&self, selection: &VerseSelection) -> Result<bool> {
        if selection.is_empty() {
            return Ok(false);
        }
        let (book_id, chapter) = selection.context();
        let stored = self.bookmarks_for_chapter(book_id, chapter).await?;
        Ok(bookmarks_cover(&stored, &selection.verse_numbers()))
    }

    /// Delete every bookmark overlapping the current selection.
    pub async fn remove_bookmarks_for_selection(&self, selection: &VerseSelection) -> Result<()> {
        let (book_id, chapter) = selection.context();
        self.delete_bookmarks_for_verses(book_id, chapter, &selection.verse_numbers())
            .await
    }

    // ========================================================================
    // MIGRATION TRIGGER
    // ========================================================================

    /// Run the one-time local → remote migration for the signed-in user.
    ///
    /// Call after a fresh authenticated session is observed. Returns
    /// `Ok(None)` when no session exists; subsequent calls for an already
    /// migrated user perform zero remote writes.
    pub async fn sync_on_login(&self) -> Result<Option<MigrationOutcome>> {
        let session = match self.session.current_session().await {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("Session check failed, skipping migration: {}", e);
                return Ok(None);
            }
        };

        let migrator = Migrator::new(self.local.clone(), self.remote.clone());
        migrator.run(&session.user_id).await.map(Some)
    }
}

// ============================================================================
// TESTS
// ============================================================================
