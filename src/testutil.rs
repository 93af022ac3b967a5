//! Test doubles shared across the crate's test modules.
//!
//! `MemoryRemote` stands in for the hosted backend: same operations, same
//! replace semantics, and the same uniqueness constraints the migration
//! routine relies on, so duplicate imports surface as `Error::Conflict`
//! exactly like the real backend's duplicate-key rejection.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::store::{AnnotationBackend, AnnotationId, Bookmark, Highlight, HighlightColor, Note};
use crate::time::now_timestamp_millis;

/// Which entity kind the double should reject with a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailOn {
    /// Behave normally
    Nothing,
    /// Reject highlight writes
    Highlights,
    /// Reject note writes
    Notes,
    /// Reject bookmark writes
    Bookmarks,
}

/// In-memory stand-in for the remote store.
pub(crate) struct MemoryRemote {
    highlights: Mutex<Vec<Highlight>>,
    notes: Mutex<Vec<Note>>,
    bookmarks: Mutex<Vec<Bookmark>>,
    writes: AtomicUsize,
    failure: Mutex<FailOn>,
}

fn server_id() -> AnnotationId {
    AnnotationId::new(uuid::Uuid::new_v4().to_string())
}

impl MemoryRemote {
    pub(crate) fn new() -> Self {
        Self {
            highlights: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
            bookmarks: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
            failure: Mutex::new(FailOn::Nothing),
        }
    }

    /// Arm (or disarm) an injected write failure for one entity kind.
    pub(crate) fn fail_on(&self, kind: FailOn) {
        *self.failure.lock() = kind;
    }

    /// Number of mutating calls received.
    pub(crate) fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Rows across all three tables.
    pub(crate) fn total_rows(&self) -> usize {
        self.highlights.lock().len() + self.notes.lock().len() + self.bookmarks.lock().len()
    }

    /// Rows in the highlights table.
    pub(crate) fn highlight_rows(&self) -> usize {
        self.highlights.lock().len()
    }

    fn record_write(&self, kind: FailOn) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if *self.failure.lock() == kind {
            return Err(Error::RemoteRejected {
                status: 503,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AnnotationBackend for MemoryRemote {
    async fn add_highlight(
        &self,
        book_id: &str,
        chapter: u32,
        verse: u32,
        color: HighlightColor,
    ) -> Result<()> {
        self.record_write(FailOn::Highlights)?;
        let mut rows = self.highlights.lock();
        rows.retain(|h| !(h.book_id == book_id && h.chapter == chapter && h.verse == verse));
        rows.push(Highlight {
            id: server_id(),
            book_id: book_id.to_string(),
            chapter,
            verse,
            color,
            created_at: now_timestamp_millis(),
        });
        Ok(())
    }

    async fn add_highlights(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
        color: HighlightColor,
    ) -> Result<()> {
        self.record_write(FailOn::Highlights)?;
        let mut rows = self.highlights.lock();
        rows.retain(|h| {
            !(h.book_id == book_id && h.chapter == chapter && verses.contains(&h.verse))
        });
        for verse in verses {
            rows.push(Highlight {
                id: server_id(),
                book_id: book_id.to_string(),
                chapter,
                verse: *verse,
                color,
                created_at: now_timestamp_millis(),
            });
        }
        Ok(())
    }

    async fn remove_highlight(&self, book_id: &str, chapter: u32, verse: u32) -> Result<()> {
        self.record_write(FailOn::Highlights)?;
        self.highlights
            .lock()
            .retain(|h| !(h.book_id == book_id && h.chapter == chapter && h.verse == verse));
        Ok(())
    }

    async fn remove_highlights(&self, book_id: &str, chapter: u32, verses: &[u32]) -> Result<()> {
        self.record_write(FailOn::Highlights)?;
        self.highlights.lock().retain(|h| {
            !(h.book_id == book_id && h.chapter == chapter && verses.contains(&h.verse))
        });
        Ok(())
    }

    async fn highlights_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Highlight>> {
        Ok(self
            .highlights
            .lock()
            .iter()
            .filter(|h| h.book_id == book_id && h.chapter == chapter)
            .cloned()
            .collect())
    }

    async fn add_note(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
        content: &str,
    ) -> Result<()> {
        self.record_write(FailOn::Notes)?;
        let now = now_timestamp_millis();
        self.notes.lock().push(Note {
            id: server_id(),
            book_id: book_id.to_string(),
            chapter,
            verse_start,
            verse_end,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn update_note(&self, id: &AnnotationId, content: &str) -> Result<()> {
        self.record_write(FailOn::Notes)?;
        let mut rows = self.notes.lock();
        if let Some(note) = rows.iter_mut().find(|n| &n.id == id) {
            note.content = content.to_string();
            note.updated_at = now_timestamp_millis();
        }
        Ok(())
    }

    async fn delete_note(&self, id: &AnnotationId) -> Result<()> {
        self.record_write(FailOn::Notes)?;
        self.notes.lock().retain(|n| &n.id != id);
        Ok(())
    }

    async fn notes_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .lock()
            .iter()
            .filter(|n| n.book_id == book_id && n.chapter == chapter)
            .cloned()
            .collect())
    }

    async fn all_notes(&self) -> Result<Vec<Note>> {
        Ok(self.notes.lock().clone())
    }

    async fn add_bookmark(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
    ) -> Result<()> {
        self.record_write(FailOn::Bookmarks)?;
        self.bookmarks.lock().push(Bookmark {
            id: server_id(),
            book_id: book_id.to_string(),
            chapter,
            verse_start,
            verse_end,
            created_at: now_timestamp_millis(),
        });
        Ok(())
    }

    async fn delete_bookmark(&self, id: &AnnotationId) -> Result<()> {
        self.record_write(FailOn::Bookmarks)?;
        self.bookmarks.lock().retain(|b| &b.id != id);
        Ok(())
    }

    async fn delete_bookmarks_for_verses(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
    ) -> Result<()> {
        self.record_write(FailOn::Bookmarks)?;
        self.bookmarks.lock().retain(|b| {
            !(b.book_id == book_id && b.chapter == chapter && verses.iter().any(|v| b.covers(*v)))
        });
        Ok(())
    }

    async fn bookmarks_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Bookmark>> {
        Ok(self
            .bookmarks
            .lock()
            .iter()
            .filter(|b| b.book_id == book_id && b.chapter == chapter)
            .cloned()
            .collect())
    }

    async fn all_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let mut rows = self.bookmarks.lock().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn import_highlights(&self, highlights: &[Highlight]) -> Result<()> {
        self.record_write(FailOn::Highlights)?;
        let mut rows = self.highlights.lock();
        // Batch inserts are transactional: one duplicate rejects the batch
        for h in highlights {
            let duplicate = rows
                .iter()
                .any(|r| r.book_id == h.book_id && r.chapter == h.chapter && r.verse == h.verse);
            if duplicate {
                return Err(Error::Conflict(
                    "duplicate key value violates unique constraint".to_string(),
                ));
            }
        }
        for h in highlights {
            rows.push(Highlight {
                id: server_id(),
                ..h.clone()
            });
        }
        Ok(())
    }

    async fn import_notes(&self, notes: &[Note]) -> Result<()> {
        self.record_write(FailOn::Notes)?;
        let mut rows = self.notes.lock();
        for n in notes {
            let duplicate = rows.iter().any(|r| {
                r.book_id == n.book_id
                    && r.chapter == n.chapter
                    && r.verse_start == n.verse_start
                    && r.verse_end == n.verse_end
                    && r.created_at == n.created_at
            });
            if duplicate {
                return Err(Error::Conflict(
                    "duplicate key value violates unique constraint".to_string(),
                ));
            }
        }
        for n in notes {
            rows.push(Note {
                id: server_id(),
                ..n.clone()
            });
        }
        Ok(())
    }

    async fn import_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<()> {
        self.record_write(FailOn::Bookmarks)?;
        let mut rows = self.bookmarks.lock();
        for b in bookmarks {
            let duplicate = rows.iter().any(|r| {
                r.book_id == b.book_id
                    && r.chapter == b.chapter
                    && r.verse_start == b.verse_start
                    && r.verse_end == b.verse_end
                    && r.created_at == b.created_at
            });
            if duplicate {
                return Err(Error::Conflict(
                    "duplicate key value violates unique constraint".to_string(),
                ));
            }
        }
        for b in bookmarks {
            rows.push(Bookmark {
                id: server_id(),
                ..b.clone()
            });
        }
        Ok(())
    }
}
