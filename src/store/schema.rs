//! # Local Database Schema
//!
//! SQL schema definitions for the on-device annotation store.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐      ┌─────────────────┐    │
//! │  │   highlights    │    │      notes      │      │    bookmarks    │    │
//! │  ├─────────────────┤    ├─────────────────┤      ├─────────────────┤    │
//! │  │ id              │    │ id              │      │ id              │    │
//! │  │ book_id         │    │ book_id         │      │ book_id         │    │
//! │  │ chapter         │    │ chapter         │      │ chapter         │    │
//! │  │ verse           │    │ verse_start     │      │ verse_start     │    │
//! │  │ color           │    │ verse_end       │      │ verse_end       │    │
//! │  │ created_at      │    │ content         │      │ created_at      │    │
//! │  └─────────────────┘    │ created_at      │      └─────────────────┘    │
//! │                         │ updated_at      │                             │
//! │                         └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐                             │
//! │  │   sync_flags    │    │ schema_version  │                             │
//! │  ├─────────────────┤    ├─────────────────┤                             │
//! │  │ key             │    │ version         │                             │
//! │  │ value           │    └─────────────────┘                             │
//! │  │ updated_at      │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All three annotation tables are indexed by (book_id, chapter); highlights
//! additionally carry a UNIQUE (book_id, chapter, verse) index backing the
//! one-highlight-per-verse invariant.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Highlights table
-- One color tag per verse; the UNIQUE index enforces replace-not-stack
CREATE TABLE IF NOT EXISTS highlights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id TEXT NOT NULL,
    chapter INTEGER NOT NULL,
    verse INTEGER NOT NULL,
    -- Palette name: yellow | green | blue | pink | orange
    color TEXT NOT NULL,
    -- Creation time (Unix timestamp ms)
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_highlights_chapter ON highlights(book_id, chapter);
CREATE UNIQUE INDEX IF NOT EXISTS idx_highlights_verse ON highlights(book_id, chapter, verse);

-- Notes table
-- Free text attached to a contiguous verse range
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id TEXT NOT NULL,
    chapter INTEGER NOT NULL,
    verse_start INTEGER NOT NULL,
    verse_end INTEGER NOT NULL,
    -- Never empty; guarded before insert
    content TEXT NOT NULL,
    -- Creation time (Unix timestamp ms)
    created_at INTEGER NOT NULL,
    -- Last edit time (Unix timestamp ms)
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notes_chapter ON notes(book_id, chapter);

-- Bookmarks table
-- Saved verse ranges, listed most-recent-first
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id TEXT NOT NULL,
    chapter INTEGER NOT NULL,
    verse_start INTEGER NOT NULL,
    verse_end INTEGER NOT NULL,
    -- Creation time (Unix timestamp ms)
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bookmarks_chapter ON bookmarks(book_id, chapter);
CREATE INDEX IF NOT EXISTS idx_bookmarks_created ON bookmarks(created_at DESC);

-- Sync flags table (v2)
-- Durable key/value markers, e.g. the per-user migration completion flag
CREATE TABLE IF NOT EXISTS sync_flags (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Migration from v1 to v2: cloud sync added the sync_flags table.
pub const MIGRATE_V1_TO_V2: &str = r#"
CREATE TABLE IF NOT EXISTS sync_flags (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
UPDATE schema_version SET version = 2;
"#;
