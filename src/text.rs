//! # Scripture Text
//!
//! Types and loading for the canonical scripture text the annotation core
//! reads against. The text itself is static content shipped with the app;
//! this module only loads, caches, and addresses it by (translation, book,
//! chapter, verse).
//!
//! The annotation core never persists scripture text — verse text is used
//! only to snapshot selections for display and clipboard formatting.
//!
//! Loaded books are held in an explicit [`BookCache`]: constructed once,
//! injectable for testing, unbounded (a full translation is a few megabytes
//! and a session touches a handful of books).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// TEXT TYPES
// ============================================================================

/// Which testament a book belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Testament {
    /// Old Testament (including the deuterocanonical books)
    Old,
    /// New Testament
    New,
}

/// One verse of scripture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    /// Verse number, 1-based
    pub number: u32,
    /// Verse text
    pub text: String,
    /// Translator footnotes, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footnotes: Option<Vec<String>>,
}

/// One chapter of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter number, 1-based
    pub number: u32,
    /// Verses in order
    pub verses: Vec<Verse>,
}

/// A complete book of one translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Stable book identifier, e.g. "ruth", "1corinthians"
    pub id: String,
    /// Display name
    pub name: String,
    /// Abbreviated display name
    pub short_name: String,
    /// Testament membership
    pub testament: Testament,
    /// Chapters in order
    pub chapters: Vec<Chapter>,
}

impl Book {
    /// Look up a chapter by number.
    pub fn chapter(&self, number: u32) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// Look up one verse's text.
    pub fn verse_text(&self, chapter: u32, verse: u32) -> Option<&str> {
        self.chapter(chapter)?
            .verses
            .iter()
            .find(|v| v.number == verse)
            .map(|v| v.text.as_str())
    }
}

// ============================================================================
// CANONICAL BOOK TABLE
// ============================================================================

/// Deuterocanonical books, available only in the `eu` translation.
const APOCRYPHA: [&str; 7] = [
    "tobit", "judith", "1maccabees", "2maccabees", "wisdom", "sirach", "baruch",
];

static BOOK_TESTAMENTS: Lazy<HashMap<&'static str, Testament>> = Lazy::new(|| {
    use Testament::{New, Old};
    let mut map = HashMap::new();
    let old = [
        "genesis", "exodus", "leviticus", "numbers", "deuteronomy",
        "joshua", "judges", "ruth", "1samuel", "2samuel",
        "1kings", "2kings", "1chronicles", "2chronicles",
        "ezra", "nehemiah", "esther", "job", "psalms",
        "proverbs", "ecclesiastes", "songofsolomon", "isaiah",
        "jeremiah", "lamentations", "ezekiel", "daniel",
        "hosea", "joel", "amos", "obadiah", "jonah",
        "micah", "nahum", "habakkuk", "zephaniah", "haggai",
        "zechariah", "malachi",
        "tobit", "judith", "1maccabees", "2maccabees",
        "wisdom", "sirach", "baruch",
    ];
    let new = [
        "matthew", "mark", "luke", "john", "acts",
        "romans", "1corinthians", "2corinthians", "galatians",
        "ephesians", "philippians", "colossians",
        "1thessalonians", "2thessalonians", "1timothy",
        "2timothy", "titus", "philemon", "hebrews",
        "james", "1peter", "2peter", "1john",
        "2john", "3john", "jude", "revelation",
    ];
    for id in old {
        map.insert(id, Old);
    }
    for id in new {
        map.insert(id, New);
    }
    map
});

/// Testament of a canonical book id, or None for unknown ids.
pub fn testament_of(book_id: &str) -> Option<Testament> {
    BOOK_TESTAMENTS.get(book_id).copied()
}

/// Whether a book exists in a given translation.
pub fn is_book_available(translation: &str, book_id: &str) -> bool {
    if APOCRYPHA.contains(&book_id) {
        return translation == "eu";
    }
    BOOK_TESTAMENTS.contains_key(book_id)
}

/// All book ids available in a translation.
pub fn available_books(translation: &str) -> Vec<&'static str> {
    BOOK_TESTAMENTS
        .keys()
        .copied()
        .filter(|id| is_book_available(translation, id))
        .collect()
}

// ============================================================================
// BOOK SOURCE
// ============================================================================

/// Loads book content for a translation.
#[async_trait]
pub trait BookSource: Send + Sync {
    /// Load one book, or None when the translation does not carry it.
    async fn load(&self, translation: &str, book_id: &str) -> Result<Option<Book>>;
}

/// Reads books from `<root>/<translation>/<book_id>.json`.
pub struct FsBookSource {
    root: PathBuf,
}

impl FsBookSource {
    /// Create a source rooted at the app's text directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BookSource for FsBookSource {
    async fn load(&self, translation: &str, book_id: &str) -> Result<Option<Book>> {
        let path = self.root.join(translation).join(format!("{}.json", book_id));
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let book: Book = serde_json::from_slice(&bytes)?;
                Ok(Some(book))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// ============================================================================
// BOOK CACHE
// ============================================================================

/// Explicit cache of loaded books, keyed by `translation:book`.
pub struct BookCache {
    source: Arc<dyn BookSource>,
    cache: RwLock<HashMap<String, Arc<Book>>>,
}

impl BookCache {
    /// Create a cache over a source.
    pub fn new(source: Arc<dyn BookSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(translation: &str, book_id: &str) -> String {
        format!("{}:{}", translation, book_id)
    }

    /// Get a book, loading and caching it on first use.
    ///
    /// Unknown book ids and books missing from the translation resolve to
    /// None rather than an error.
    pub async fn get(&self, translation: &str, book_id: &str) -> Result<Option<Arc<Book>>> {
        if !is_book_available(translation, book_id) {
            tracing::debug!("Book {} not available in translation {}", book_id, translation);
            return Ok(None);
        }

        let key = Self::cache_key(translation, book_id);
        if let Some(book) = self.cache.read().get(&key) {
            return Ok(Some(book.clone()));
        }

        match self.source.load(translation, book_id).await? {
            Some(book) => {
                let book = Arc::new(book);
                self.cache.write().insert(key, book.clone());
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }

    /// One verse's text, or None when the coordinates don't resolve.
    pub async fn verse_text(
        &self,
        translation: &str,
        book_id: &str,
        chapter: u32,
        verse: u32,
    ) -> Result<Option<String>> {
        Ok(self
            .get(translation, book_id)
            .await?
            .and_then(|book| book.verse_text(chapter, verse).map(str::to_string)))
    }

    /// Drop one cached book, forcing a reload on next use.
    pub fn invalidate(&self, translation: &str, book_id: &str) {
        self.cache.write().remove(&Self::cache_key(translation, book_id));
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Number of cached books.
    pub fn cached_books(&self) -> usize {
        self.cache.read().len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
