//! # Verse Selection
//!
//! Transient, in-memory state tracking which verses the user has marked
//! within one (book, chapter) context. Feeds the annotation store but holds
//! no persisted data; navigation resets it.
//!
//! Selections never span a context switch: changing the (book, chapter)
//! context clears the set entirely.

use std::collections::BTreeMap;

/// The minimal contiguous range spanning a selection.
///
/// This is a bounding range — it does not claim that every verse between
/// `start` and `end` is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseRange {
    /// Smallest selected verse number
    pub start: u32,
    /// Largest selected verse number
    pub end: u32,
}

impl VerseRange {
    /// True if `verse` falls inside the range.
    pub fn contains(&self, verse: u32) -> bool {
        self.start <= verse && verse <= self.end
    }
}

/// The set of verses currently selected within one chapter view.
///
/// Each selected verse carries a snapshot of its text, taken at selection
/// time, used only for clipboard formatting — the annotation store never
/// persists scripture text.
#[derive(Debug, Default)]
pub struct VerseSelection {
    book_id: String,
    chapter: u32,
    selected: BTreeMap<u32, String>,
}

impl VerseSelection {
    /// Create an empty selection for a chapter context.
    pub fn new(book_id: impl Into<String>, chapter: u32) -> Self {
        Self {
            book_id: book_id.into(),
            chapter,
            selected: BTreeMap::new(),
        }
    }

    /// The current (book, chapter) context.
    pub fn context(&self) -> (&str, u32) {
        (&self.book_id, self.chapter)
    }

    /// Switch to a new chapter context. Clears the selection.
    pub fn set_context(&mut self, book_id: impl Into<String>, chapter: u32) {
        self.book_id = book_id.into();
        self.chapter = chapter;
        self.selected.clear();
    }

    /// Toggle a verse's membership, snapshotting its text on select.
    pub fn toggle(&mut self, verse: u32, text: impl Into<String>) {
        if self.selected.remove(&verse).is_none() {
            self.selected.insert(verse, text.into());
        }
    }

    /// Deselect everything, keeping the context.
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Is this verse currently selected?
    pub fn is_selected(&self, verse: u32) -> bool {
        self.selected.contains_key(&verse)
    }

    /// Number of selected verses.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// True if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected verse numbers, ascending.
    pub fn verse_numbers(&self) -> Vec<u32> {
        self.selected.keys().copied().collect()
    }

    /// Selected (verse, text) pairs, ascending by verse.
    pub fn texts(&self) -> Vec<(u32, &str)> {
        self.selected.iter().map(|(v, t)| (*v, t.as_str())).collect()
    }

    /// Bounding range of the selection, or None when empty.
    pub fn range(&self) -> Option<VerseRange> {
        let start = *self.selected.keys().next()?;
        let end = *self.selected.keys().next_back()?;
        Some(VerseRange { start, end })
    }

    /// Render the selection for the clipboard: one "<verse> <text>" line per
    /// selected verse, then a reference line naming the book and range.
    ///
    /// Returns None when nothing is selected.
    pub fn format_for_copy(&self, book_name: &str) -> Option<String> {
        if self.selected.is_empty() {
            return None;
        }

        let body = self
            .selected
            .iter()
            .map(|(verse, text)| format!("{} {}", verse, text))
            .collect::<Vec<_>>()
            .join("\n");

        let range = self.range()?;
        let reference = if range.end != range.start {
            format!("\n\n— {} {}:{}-{}", book_name, self.chapter, range.start, range.end)
        } else {
            format!("\n\n— {} {}:{}", book_name, self.chapter, range.start)
        };

        Some(body + &reference)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_membership() {
        let mut sel = VerseSelection::new("genesis", 1);

        sel.toggle(3, "In the beginning");
        assert!(sel.is_selected(3));
        sel.toggle(3, "In the beginning");
        assert!(!sel.is_selected(3));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_context_switch_clears_selection() {
        let mut sel = VerseSelection::new("genesis", 1);
        sel.toggle(3, "a");
        sel.toggle(5, "b");
        assert_eq!(sel.len(), 2);

        sel.set_context("genesis", 2);
        assert!(sel.is_empty());
        assert_eq!(sel.context(), ("genesis", 2));
    }

    #[test]
    fn test_derived_views_are_sorted() {
        let mut sel = VerseSelection::new("psalms", 23);
        sel.toggle(7, "seven");
        sel.toggle(5, "five");
        sel.toggle(6, "six");

        assert_eq!(sel.verse_numbers(), vec![5, 6, 7]);
        assert_eq!(
            sel.texts(),
            vec![(5, "five"), (6, "six"), (7, "seven")]
        );
        assert_eq!(sel.range(), Some(VerseRange { start: 5, end: 7 }));
    }

    #[test]
    fn test_range_is_bounding_not_contiguity() {
        let mut sel = VerseSelection::new("psalms", 23);
        sel.toggle(2, "a");
        sel.toggle(9, "b");
        // 3..=8 are not selected but the bounding range still spans them
        assert_eq!(sel.range(), Some(VerseRange { start: 2, end: 9 }));
    }

    #[test]
    fn test_empty_selection_has_no_range() {
        let sel = VerseSelection::new("psalms", 23);
        assert_eq!(sel.range(), None);
        assert_eq!(sel.format_for_copy("Psalms"), None);
    }

    #[test]
    fn test_clipboard_format_multi_verse() {
        let mut sel = VerseSelection::new("matthew", 5);
        sel.toggle(4, "Blessed are those who mourn.");
        sel.toggle(3, "Blessed are the poor in spirit.");

        let text = sel.format_for_copy("Matthew").unwrap();
        assert_eq!(
            text,
            "3 Blessed are the poor in spirit.\n4 Blessed are those who mourn.\n\n— Matthew 5:3-4"
        );
    }

    #[test]
    fn test_clipboard_format_single_verse() {
        let mut sel = VerseSelection::new("john", 11);
        sel.toggle(35, "Jesus wept.");

        let text = sel.format_for_copy("John").unwrap();
        assert_eq!(text, "35 Jesus wept.\n\n— John 11:35");
    }

    #[test]
    fn test_range_contains() {
        let range = VerseRange { start: 3, end: 5 };
        assert!(range.contains(3));
        assert!(range.contains(4));
        assert!(range.contains(5));
        assert!(!range.contains(6));
    }
}
