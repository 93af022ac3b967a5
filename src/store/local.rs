//! # Local Store
//!
//! SQLite-backed, offline-capable storage for the three annotation kinds.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      LOCAL STORE OPERATIONS                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │     Facade      │                                                   │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   LocalStore    │  High-level API                                   │
//! │  │   (this file)   │  - Highlights, notes, bookmarks                   │
//! │  │                 │  - Sync flags                                     │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │    rusqlite     │  SQLite wrapper                                   │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   SQLite DB     │  In-memory for tests, file for production         │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No network dependency. Identifiers are auto-incrementing rowids,
//! converted to/from the opaque [`AnnotationId`] at this boundary.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ToSql};
use std::sync::Arc;

use super::schema;
use super::{AnnotationBackend, AnnotationId, Bookmark, Highlight, HighlightColor, Note};
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

impl FromSql for HighlightColor {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(e.to_string().into()))
    }
}

impl ToSql for HighlightColor {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// The on-device annotation database.
///
/// Wraps a SQLite connection and provides the offline half of the
/// annotation store. Only one logical writer (the current app instance)
/// is assumed.
pub struct LocalStore {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Open or create a database.
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub async fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
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
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| {
                    Error::DatabaseError(format!("Failed to set schema version: {}", e))
                })?;

                tracing::info!("Annotation schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                tracing::info!(
                    "Annotation schema version {} is older than current {}, running migrations",
                    v,
                    schema::SCHEMA_VERSION
                );

                if v < 2 {
                    tracing::info!("Running migration v1 → v2 (sync flags)");
                    conn.execute_batch(schema::MIGRATE_V1_TO_V2)
                        .map_err(|e| Error::DatabaseError(format!("Migration v1→v2 failed: {}", e)))?;
                }

                tracing::info!("All migrations complete (now at version {})", schema::SCHEMA_VERSION);
            }
            Some(v) => {
                tracing::debug!("Annotation schema version: {}", v);
            }
        }

        Ok(())
    }

    /// Parse an opaque id into a local rowid. Non-numeric ids cannot name
    /// a local row.
    fn rowid(id: &AnnotationId) -> Option<i64> {
        id.as_str().parse::<i64>().ok()
    }

    // ========================================================================
    // HIGHLIGHT OPERATIONS
    // ========================================================================

    /// Add a highlight, replacing any existing highlight on the same verse.
    pub fn insert_highlight(
        &self,
        book_id: &str,
        chapter: u32,
        verse: u32,
        color: HighlightColor,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let now = now_timestamp_millis();

        // Delete-then-insert inside one transaction so a concurrent reader
        // never observes two highlights for the same verse.
        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM highlights WHERE book_id = ? AND chapter = ? AND verse = ?",
            params![book_id, chapter, verse],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to clear highlight: {}", e)))?;

        tx.execute(
            "INSERT INTO highlights (book_id, chapter, verse, color, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![book_id, chapter, verse, color, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to add highlight: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit highlight: {}", e)))?;

        Ok(())
    }

    /// Add highlights for a verse set, replacing existing entries per verse.
    pub fn insert_highlights(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
        color: HighlightColor,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let now = now_timestamp_millis();

        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        for verse in verses {
            tx.execute(
                "DELETE FROM highlights WHERE book_id = ? AND chapter = ? AND verse = ?",
                params![book_id, chapter, verse],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to clear highlight: {}", e)))?;

            tx.execute(
                "INSERT INTO highlights (book_id, chapter, verse, color, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![book_id, chapter, verse, color, now],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to add highlight: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit highlights: {}", e)))?;

        Ok(())
    }

    /// Remove the highlight on one verse. Missing rows are a no-op.
    pub fn delete_highlight(&self, book_id: &str, chapter: u32, verse: u32) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM highlights WHERE book_id = ? AND chapter = ? AND verse = ?",
            params![book_id, chapter, verse],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to remove highlight: {}", e)))?;
        Ok(())
    }

    /// Remove highlights on a verse set.
    pub fn delete_highlights(&self, book_id: &str, chapter: u32, verses: &[u32]) -> Result<()> {
        let mut conn = self.conn.lock();

        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        for verse in verses {
            tx.execute(
                "DELETE FROM highlights WHERE book_id = ? AND chapter = ? AND verse = ?",
                params![book_id, chapter, verse],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to remove highlight: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit removal: {}", e)))?;

        Ok(())
    }

    /// Get all highlights for a chapter.
    pub fn highlights_in_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Highlight>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, chapter, verse, color, created_at
                 FROM highlights WHERE book_id = ? AND chapter = ?",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![book_id, chapter], |row| {
                Ok(Highlight {
                    id: AnnotationId::from(row.get::<_, i64>(0)?),
                    book_id: row.get(1)?,
                    chapter: row.get(2)?,
                    verse: row.get(3)?,
                    color: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query highlights: {}", e)))?;

        let mut highlights = Vec::new();
        for row in rows {
            highlights.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read highlight: {}", e)))?,
            );
        }

        Ok(highlights)
    }

    /// Get every highlight in the store (migration source).
    pub fn all_highlights(&self) -> Result<Vec<Highlight>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, book_id, chapter, verse, color, created_at FROM highlights")
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Highlight {
                    id: AnnotationId::from(row.get::<_, i64>(0)?),
                    book_id: row.get(1)?,
                    chapter: row.get(2)?,
                    verse: row.get(3)?,
                    color: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query highlights: {}", e)))?;

        let mut highlights = Vec::new();
        for row in rows {
            highlights.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read highlight: {}", e)))?,
            );
        }

        Ok(highlights)
    }

    // ========================================================================
    // NOTE OPERATIONS
    // ========================================================================

    /// Create a note on a verse range. Content validation happens above.
    pub fn insert_note(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
        content: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_timestamp_millis();

        conn.execute(
            "INSERT INTO notes (book_id, chapter, verse_start, verse_end, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![book_id, chapter, verse_start, verse_end, content, now, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to add note: {}", e)))?;

        Ok(())
    }

    /// Update a note's content and modification time. The verse range and
    /// creation time are never touched.
    pub fn update_note_content(&self, id: &AnnotationId, content: &str) -> Result<()> {
        let rowid = Self::rowid(id)
            .ok_or_else(|| Error::InvalidIdentifier(id.as_str().to_string()))?;

        let conn = self.conn.lock();
        let now = now_timestamp_millis();

        conn.execute(
            "UPDATE notes SET content = ?, updated_at = ? WHERE id = ?",
            params![content, now, rowid],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to update note: {}", e)))?;

        Ok(())
    }

    /// Delete a note. Missing rows (and ids that cannot name a local row)
    /// are a no-op success.
    pub fn delete_note_by_id(&self, id: &AnnotationId) -> Result<()> {
        let rowid = match Self::rowid(id) {
            Some(r) => r,
            None => {
                tracing::debug!("delete_note: id {:?} cannot name a local row, skipping", id.as_str());
                return Ok(());
            }
        };

        let conn = self.conn.lock();
        conn.execute("DELETE FROM notes WHERE id = ?", params![rowid])
            .map_err(|e| Error::DatabaseError(format!("Failed to delete note: {}", e)))?;
        Ok(())
    }

    /// Get all notes for a chapter.
    pub fn notes_in_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Note>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, chapter, verse_start, verse_end, content, created_at, updated_at
                 FROM notes WHERE book_id = ? AND chapter = ?",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![book_id, chapter], |row| {
                Ok(Note {
                    id: AnnotationId::from(row.get::<_, i64>(0)?),
                    book_id: row.get(1)?,
                    chapter: row.get(2)?,
                    verse_start: row.get(3)?,
                    verse_end: row.get(4)?,
                    content: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query notes: {}", e)))?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row.map_err(|e| Error::DatabaseError(format!("Failed to read note: {}", e)))?);
        }

        Ok(notes)
    }

    /// Get every note in the store.
    pub fn every_note(&self) -> Result<Vec<Note>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, chapter, verse_start, verse_end, content, created_at, updated_at
                 FROM notes",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Note {
                    id: AnnotationId::from(row.get::<_, i64>(0)?),
                    book_id: row.get(1)?,
                    chapter: row.get(2)?,
                    verse_start: row.get(3)?,
                    verse_end: row.get(4)?,
                    content: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query notes: {}", e)))?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row.map_err(|e| Error::DatabaseError(format!("Failed to read note: {}", e)))?);
        }

        Ok(notes)
    }

    // ========================================================================
    // BOOKMARK OPERATIONS
    // ========================================================================

    /// Save a bookmark on a verse range.
    pub fn insert_bookmark(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_timestamp_millis();

        conn.execute(
            "INSERT INTO bookmarks (book_id, chapter, verse_start, verse_end, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![book_id, chapter, verse_start, verse_end, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to add bookmark: {}", e)))?;

        Ok(())
    }

    /// Delete a bookmark. Missing rows are a no-op success.
    pub fn delete_bookmark_by_id(&self, id: &AnnotationId) -> Result<()> {
        let rowid = match Self::rowid(id) {
            Some(r) => r,
            None => {
                tracing::debug!("delete_bookmark: id {:?} cannot name a local row, skipping", id.as_str());
                return Ok(());
            }
        };

        let conn = self.conn.lock();
        conn.execute("DELETE FROM bookmarks WHERE id = ?", params![rowid])
            .map_err(|e| Error::DatabaseError(format!("Failed to delete bookmark: {}", e)))?;
        Ok(())
    }

    /// Delete every bookmark whose range overlaps any of `verses`.
    pub fn delete_bookmarks_overlapping(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
    ) -> Result<()> {
        let chapter_bookmarks = self.bookmarks_in_chapter(book_id, chapter)?;

        let ids: Vec<i64> = chapter_bookmarks
            .iter()
            .filter(|b| verses.iter().any(|v| b.covers(*v)))
            .filter_map(|b| Self::rowid(&b.id))
            .collect();

        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        for rowid in ids {
            tx.execute("DELETE FROM bookmarks WHERE id = ?", params![rowid])
                .map_err(|e| Error::DatabaseError(format!("Failed to delete bookmark: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit removal: {}", e)))?;

        Ok(())
    }

    /// Get all bookmarks for a chapter.
    pub fn bookmarks_in_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Bookmark>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, chapter, verse_start, verse_end, created_at
                 FROM bookmarks WHERE book_id = ? AND chapter = ?",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![book_id, chapter], |row| {
                Ok(Bookmark {
                    id: AnnotationId::from(row.get::<_, i64>(0)?),
                    book_id: row.get(1)?,
                    chapter: row.get(2)?,
                    verse_start: row.get(3)?,
                    verse_end: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query bookmarks: {}", e)))?;

        let mut bookmarks = Vec::new();
        for row in rows {
            bookmarks.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read bookmark: {}", e)))?,
            );
        }

        Ok(bookmarks)
    }

    /// Get every bookmark, most recently created first.
    pub fn every_bookmark(&self) -> Result<Vec<Bookmark>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, chapter, verse_start, verse_end, created_at
                 FROM bookmarks ORDER BY created_at DESC, id DESC",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Bookmark {
                    id: AnnotationId::from(row.get::<_, i64>(0)?),
                    book_id: row.get(1)?,
                    chapter: row.get(2)?,
                    verse_start: row.get(3)?,
                    verse_end: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query bookmarks: {}", e)))?;

        let mut bookmarks = Vec::new();
        for row in rows {
            bookmarks.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read bookmark: {}", e)))?,
            );
        }

        Ok(bookmarks)
    }

    // ========================================================================
    // BULK IMPORT
    // ========================================================================

    /// Insert highlights with their original timestamps. A duplicate verse
    /// trips the UNIQUE index and surfaces as a conflict.
    pub fn import_highlight_rows(&self, highlights: &[Highlight]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        for h in highlights {
            tx.execute(
                "INSERT INTO highlights (book_id, chapter, verse, color, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![h.book_id, h.chapter, h.verse, h.color, h.created_at],
            )
            .map_err(Error::from)?;
        }

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit import: {}", e)))?;
        Ok(())
    }

    /// Insert notes with their original timestamps.
    pub fn import_note_rows(&self, notes: &[Note]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        for n in notes {
            tx.execute(
                "INSERT INTO notes (book_id, chapter, verse_start, verse_end, content, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![n.book_id, n.chapter, n.verse_start, n.verse_end, n.content, n.created_at, n.updated_at],
            )
            .map_err(Error::from)?;
        }

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit import: {}", e)))?;
        Ok(())
    }

    /// Insert bookmarks with their original timestamps.
    pub fn import_bookmark_rows(&self, bookmarks: &[Bookmark]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        for b in bookmarks {
            tx.execute(
                "INSERT INTO bookmarks (book_id, chapter, verse_start, verse_end, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![b.book_id, b.chapter, b.verse_start, b.verse_end, b.created_at],
            )
            .map_err(Error::from)?;
        }

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit import: {}", e)))?;
        Ok(())
    }

    // ========================================================================
    // MIGRATION SUPPORT
    // ========================================================================

    /// Delete every annotation, all three tables in one transaction.
    /// Sync flags are untouched.
    pub fn clear_annotations(&self) -> Result<()> {
        let mut conn = self.conn.lock();

        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        tx.execute("DELETE FROM highlights", [])
            .map_err(|e| Error::DatabaseError(format!("Failed to clear highlights: {}", e)))?;
        tx.execute("DELETE FROM notes", [])
            .map_err(|e| Error::DatabaseError(format!("Failed to clear notes: {}", e)))?;
        tx.execute("DELETE FROM bookmarks", [])
            .map_err(|e| Error::DatabaseError(format!("Failed to clear bookmarks: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit clear: {}", e)))?;

        tracing::info!("Local annotation tables cleared");
        Ok(())
    }

    /// Count of highlights, notes and bookmarks, in that order.
    pub fn annotation_counts(&self) -> Result<(usize, usize, usize)> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<usize> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .map_err(|e| Error::DatabaseError(format!("Failed to count {}: {}", table, e)))
        };
        Ok((count("highlights")?, count("notes")?, count("bookmarks")?))
    }

    // ========================================================================
    // SYNC FLAGS
    // ========================================================================

    /// Read a durable flag value.
    pub fn get_flag(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM sync_flags WHERE key = ?",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to read flag: {}", e))),
        }
    }

    /// Write a durable flag value.
    pub fn set_flag(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_timestamp_millis();
        conn.execute(
            "INSERT OR REPLACE INTO sync_flags (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to write flag: {}", e)))?;
        Ok(())
    }

    /// Remove a durable flag. Missing keys are a no-op.
    pub fn delete_flag(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sync_flags WHERE key = ?", params![key])
            .map_err(|e| Error::DatabaseError(format!("Failed to delete flag: {}", e)))?;
        Ok(())
    }
}

// ============================================================================
// BACKEND TRAIT IMPLEMENTATION
// ============================================================================

#[async_trait]
impl AnnotationBackend for LocalStore {
    async fn add_highlight(
        &self,
        book_id: &str,
        chapter: u32,
        verse: u32,
        color: HighlightColor,
    ) -> Result<()> {
        self.insert_highlight(book_id, chapter, verse, color)
    }

    async fn add_highlights(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
        color: HighlightColor,
    ) -> Result<()> {
        self.insert_highlights(book_id, chapter, verses, color)
    }

    async fn remove_highlight(&self, book_id: &str, chapter: u32, verse: u32) -> Result<()> {
        self.delete_highlight(book_id, chapter, verse)
    }

    async fn remove_highlights(&self, book_id: &str, chapter: u32, verses: &[u32]) -> Result<()> {
        self.delete_highlights(book_id, chapter, verses)
    }

    async fn highlights_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Highlight>> {
        self.highlights_in_chapter(book_id, chapter)
    }

    async fn add_note(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
        content: &str,
    ) -> Result<()> {
        self.insert_note(book_id, chapter, verse_start, verse_end, content)
    }

    async fn update_note(&self, id: &AnnotationId, content: &str) -> Result<()> {
        self.update_note_content(id, content)
    }

    async fn delete_note(&self, id: &AnnotationId) -> Result<()> {
        self.delete_note_by_id(id)
    }

    async fn notes_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Note>> {
        self.notes_in_chapter(book_id, chapter)
    }

    async fn all_notes(&self) -> Result<Vec<Note>> {
        self.every_note()
    }

    async fn add_bookmark(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
    ) -> Result<()> {
        self.insert_bookmark(book_id, chapter, verse_start, verse_end)
    }

    async fn delete_bookmark(&self, id: &AnnotationId) -> Result<()> {
        self.delete_bookmark_by_id(id)
    }

    async fn delete_bookmarks_for_verses(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
    ) -> Result<()> {
        self.delete_bookmarks_overlapping(book_id, chapter, verses)
    }

    async fn bookmarks_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Bookmark>> {
        self.bookmarks_in_chapter(book_id, chapter)
    }

    async fn all_bookmarks(&self) -> Result<Vec<Bookmark>> {
        self.every_bookmark()
    }

    async fn import_highlights(&self, highlights: &[Highlight]) -> Result<()> {
        self.import_highlight_rows(highlights)
    }

    async fn import_notes(&self, notes: &[Note]) -> Result<()> {
        self.import_note_rows(notes)
    }

    async fn import_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<()> {
        self.import_bookmark_rows(bookmarks)
    }
}

// ============================================================================
// TESTS
// ============================================================================
