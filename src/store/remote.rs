//! # Remote Store
//!
//! HTTP adapter for the hosted annotation backend.
//!
//! The backend is a PostgREST-style REST surface over a relational store
//! with row-level security: every row carries a `user_id` owner column the
//! server enforces. The adapter still filters every query by the current
//! user id client-side as defense in depth.
//!
//! Wire rows use snake_case columns and RFC 3339 timestamps; both are
//! translated to the normalized record shape at this boundary and never
//! leak above it. Identifiers are server-assigned opaque tokens carried
//! verbatim inside [`AnnotationId`].
//!
//! Write failures always propagate. Duplicate-key rejections (HTTP 409, or
//! an error body carrying the backend's unique-violation code `23505`)
//! classify as [`Error::Conflict`] so the migration routine can treat them
//! as already-done.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use super::{AnnotationBackend, AnnotationId, Bookmark, Highlight, HighlightColor, Note};
use crate::auth::{Session, SessionProvider};
use crate::error::{Error, Result};
use crate::time::{millis_to_rfc3339, rfc3339_to_millis};

use async_trait::async_trait;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the backend, e.g. `https://project.example.co`
    pub base_url: String,
    /// Project API key, sent on every request
    pub api_key: String,
}

/// Networked annotation store, scoped to the authenticated user.
pub struct RemoteStore {
    http: Client,
    config: RemoteConfig,
    session: Arc<dyn SessionProvider>,
}

// ============================================================================
// WIRE ROWS
// ============================================================================

#[derive(Debug, Deserialize)]
struct HighlightRow {
    id: String,
    book_id: String,
    chapter: u32,
    verse: u32,
    color: HighlightColor,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct HighlightInsert<'a> {
    user_id: &'a str,
    book_id: &'a str,
    chapter: u32,
    verse: u32,
    color: HighlightColor,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoteRow {
    id: String,
    book_id: String,
    chapter: u32,
    verse_start: u32,
    verse_end: u32,
    content: String,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Serialize)]
struct NoteInsert<'a> {
    user_id: &'a str,
    book_id: &'a str,
    chapter: u32,
    verse_start: u32,
    verse_end: u32,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct NotePatch<'a> {
    content: &'a str,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct BookmarkRow {
    id: String,
    book_id: String,
    chapter: u32,
    verse_start: u32,
    verse_end: u32,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct BookmarkInsert<'a> {
    user_id: &'a str,
    book_id: &'a str,
    chapter: u32,
    verse_start: u32,
    verse_end: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl HighlightRow {
    fn into_record(self) -> Result<Highlight> {
        Ok(Highlight {
            id: AnnotationId::new(self.id),
            book_id: self.book_id,
            chapter: self.chapter,
            verse: self.verse,
            color: self.color,
            created_at: rfc3339_to_millis(&self.created_at)?,
        })
    }
}

impl NoteRow {
    fn into_record(self) -> Result<Note> {
        Ok(Note {
            id: AnnotationId::new(self.id),
            book_id: self.book_id,
            chapter: self.chapter,
            verse_start: self.verse_start,
            verse_end: self.verse_end,
            content: self.content,
            created_at: rfc3339_to_millis(&self.created_at)?,
            updated_at: rfc3339_to_millis(&self.updated_at)?,
        })
    }
}

impl BookmarkRow {
    fn into_record(self) -> Result<Bookmark> {
        Ok(Bookmark {
            id: AnnotationId::new(self.id),
            book_id: self.book_id,
            chapter: self.chapter,
            verse_start: self.verse_start,
            verse_end: self.verse_end,
            created_at: rfc3339_to_millis(&self.created_at)?,
        })
    }
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Unique-violation code the relational backend reports on duplicate keys.
const DUPLICATE_KEY_CODE: &str = "23505";

fn classify_failure(status: u16, body: &str) -> Error {
    if status == 409 {
        return Error::Conflict(body.to_string());
    }
    if let Ok(parsed) = serde_json::from_str::<BackendErrorBody>(body) {
        if parsed.code.as_deref() == Some(DUPLICATE_KEY_CODE) {
            return Error::Conflict(parsed.message.unwrap_or_else(|| body.to_string()));
        }
    }
    Error::RemoteRejected {
        status,
        message: body.to_string(),
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body))
}

// ============================================================================
// STORE
// ============================================================================

impl RemoteStore {
    /// Create an adapter for the given backend and session source.
    pub fn new(config: RemoteConfig, session: Arc<dyn SessionProvider>) -> Self {
        Self {
            http: Client::new(),
            config,
            session,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url.trim_end_matches('/'), table)
    }

    /// Resolve the current session or fail hard.
    ///
    /// The facade never routes here without a session; reaching this without
    /// one is a contract violation, not something to paper over.
    async fn require_session(&self) -> Result<Session> {
        self.session
            .current_session()
            .await?
            .ok_or(Error::NotAuthenticated)
    }

    fn authed(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&session.access_token)
    }

    async fn delete_highlight_row(
        &self,
        session: &Session,
        book_id: &str,
        chapter: u32,
        verse: u32,
    ) -> Result<()> {
        let request = self
            .http
            .delete(self.table_url("highlights"))
            .query(&[
                ("user_id", format!("eq.{}", session.user_id)),
                ("book_id", format!("eq.{}", book_id)),
                ("chapter", format!("eq.{}", chapter)),
                ("verse", format!("eq.{}", verse)),
            ]);
        ensure_success(self.authed(request, session).send().await?).await?;
        Ok(())
    }

    async fn insert_rows<T: Serialize>(&self, session: &Session, table: &str, rows: &[T]) -> Result<()> {
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(rows);
        ensure_success(self.authed(request, session).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl AnnotationBackend for RemoteStore {
    // ------------------------------------------------------------------------
    // Highlights
    // ------------------------------------------------------------------------

    async fn add_highlight(
        &self,
        book_id: &str,
        chapter: u32,
        verse: u32,
        color: HighlightColor,
    ) -> Result<()> {
        let session = self.require_session().await?;

        // The backend has no upsert-by-composite-key guarantee; replace is
        // an explicit delete-then-insert.
        self.delete_highlight_row(&session, book_id, chapter, verse).await?;

        self.insert_rows(
            &session,
            "highlights",
            &[HighlightInsert {
                user_id: &session.user_id,
                book_id,
                chapter,
                verse,
                color,
                created_at: None,
            }],
        )
        .await
    }

    async fn add_highlights(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
        color: HighlightColor,
    ) -> Result<()> {
        let session = self.require_session().await?;

        for verse in verses {
            self.delete_highlight_row(&session, book_id, chapter, *verse).await?;
        }

        let rows: Vec<HighlightInsert<'_>> = verses
            .iter()
            .map(|verse| HighlightInsert {
                user_id: &session.user_id,
                book_id,
                chapter,
                verse: *verse,
                color,
                created_at: None,
            })
            .collect();

        self.insert_rows(&session, "highlights", &rows).await
    }

    async fn remove_highlight(&self, book_id: &str, chapter: u32, verse: u32) -> Result<()> {
        let session = self.require_session().await?;
        self.delete_highlight_row(&session, book_id, chapter, verse).await
    }

    async fn remove_highlights(&self, book_id: &str, chapter: u32, verses: &[u32]) -> Result<()> {
        let session = self.require_session().await?;
        for verse in verses {
            self.delete_highlight_row(&session, book_id, chapter, *verse).await?;
        }
        Ok(())
    }

    async fn highlights_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Highlight>> {
        let session = self.require_session().await?;

        let request = self
            .http
            .get(self.table_url("highlights"))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
                ("book_id", format!("eq.{}", book_id)),
                ("chapter", format!("eq.{}", chapter)),
            ]);
        let response = ensure_success(self.authed(request, &session).send().await?).await?;

        let rows: Vec<HighlightRow> = response.json().await?;
        rows.into_iter().map(HighlightRow::into_record).collect()
    }

    // ------------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------------

    async fn add_note(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
        content: &str,
    ) -> Result<()> {
        let session = self.require_session().await?;
        self.insert_rows(
            &session,
            "notes",
            &[NoteInsert {
                user_id: &session.user_id,
                book_id,
                chapter,
                verse_start,
                verse_end,
                content,
                created_at: None,
                updated_at: None,
            }],
        )
        .await
    }

    async fn update_note(&self, id: &AnnotationId, content: &str) -> Result<()> {
        let session = self.require_session().await?;

        let request = self
            .http
            .patch(self.table_url("notes"))
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", session.user_id)),
            ])
            .json(&NotePatch {
                content,
                updated_at: millis_to_rfc3339(crate::time::now_timestamp_millis()),
            });
        ensure_success(self.authed(request, &session).send().await?).await?;
        Ok(())
    }

    async fn delete_note(&self, id: &AnnotationId) -> Result<()> {
        let session = self.require_session().await?;

        let request = self
            .http
            .delete(self.table_url("notes"))
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", session.user_id)),
            ]);
        ensure_success(self.authed(request, &session).send().await?).await?;
        Ok(())
    }

    async fn notes_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Note>> {
        let session = self.require_session().await?;

        let request = self
            .http
            .get(self.table_url("notes"))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
                ("book_id", format!("eq.{}", book_id)),
                ("chapter", format!("eq.{}", chapter)),
                ("order", "created_at.desc".to_string()),
            ]);
        let response = ensure_success(self.authed(request, &session).send().await?).await?;

        let rows: Vec<NoteRow> = response.json().await?;
        rows.into_iter().map(NoteRow::into_record).collect()
    }

    async fn all_notes(&self) -> Result<Vec<Note>> {
        let session = self.require_session().await?;

        let request = self
            .http
            .get(self.table_url("notes"))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
                ("order", "created_at.desc".to_string()),
            ]);
        let response = ensure_success(self.authed(request, &session).send().await?).await?;

        let rows: Vec<NoteRow> = response.json().await?;
        rows.into_iter().map(NoteRow::into_record).collect()
    }

    // ------------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------------

    async fn add_bookmark(
        &self,
        book_id: &str,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
    ) -> Result<()> {
        let session = self.require_session().await?;
        self.insert_rows(
            &session,
            "bookmarks",
            &[BookmarkInsert {
                user_id: &session.user_id,
                book_id,
                chapter,
                verse_start,
                verse_end,
                created_at: None,
            }],
        )
        .await
    }

    async fn delete_bookmark(&self, id: &AnnotationId) -> Result<()> {
        let session = self.require_session().await?;

        let request = self
            .http
            .delete(self.table_url("bookmarks"))
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", session.user_id)),
            ]);
        ensure_success(self.authed(request, &session).send().await?).await?;
        Ok(())
    }

    async fn delete_bookmarks_for_verses(
        &self,
        book_id: &str,
        chapter: u32,
        verses: &[u32],
    ) -> Result<()> {
        let session = self.require_session().await?;

        let stored = self.bookmarks_for_chapter(book_id, chapter).await?;
        let ids: Vec<String> = stored
            .iter()
            .filter(|b| verses.iter().any(|v| b.covers(*v)))
            .map(|b| b.id.as_str().to_string())
            .collect();

        if ids.is_empty() {
            return Ok(());
        }

        let request = self
            .http
            .delete(self.table_url("bookmarks"))
            .query(&[
                ("id", format!("in.({})", ids.join(","))),
                ("user_id", format!("eq.{}", session.user_id)),
            ]);
        ensure_success(self.authed(request, &session).send().await?).await?;
        Ok(())
    }

    async fn bookmarks_for_chapter(&self, book_id: &str, chapter: u32) -> Result<Vec<Bookmark>> {
        let session = self.require_session().await?;

        let request = self
            .http
            .get(self.table_url("bookmarks"))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
                ("book_id", format!("eq.{}", book_id)),
                ("chapter", format!("eq.{}", chapter)),
            ]);
        let response = ensure_success(self.authed(request, &session).send().await?).await?;

        let rows: Vec<BookmarkRow> = response.json().await?;
        rows.into_iter().map(BookmarkRow::into_record).collect()
    }

    async fn all_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let session = self.require_session().await?;

        let request = self
            .http
            .get(self.table_url("bookmarks"))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
                ("order", "created_at.desc".to_string()),
            ]);
        let response = ensure_success(self.authed(request, &session).send().await?).await?;

        let rows: Vec<BookmarkRow> = response.json().await?;
        rows.into_iter().map(BookmarkRow::into_record).collect()
    }

    // ------------------------------------------------------------------------
    // Bulk import (migration)
    // ------------------------------------------------------------------------

    async fn import_highlights(&self, highlights: &[Highlight]) -> Result<()> {
        let session = self.require_session().await?;
        let rows: Vec<HighlightInsert<'_>> = highlights
            .iter()
            .map(|h| HighlightInsert {
                user_id: &session.user_id,
                book_id: &h.book_id,
                chapter: h.chapter,
                verse: h.verse,
                color: h.color,
                created_at: Some(millis_to_rfc3339(h.created_at)),
            })
            .collect();
        self.insert_rows(&session, "highlights", &rows).await
    }

    async fn import_notes(&self, notes: &[Note]) -> Result<()> {
        let session = self.require_session().await?;
        let rows: Vec<NoteInsert<'_>> = notes
            .iter()
            .map(|n| NoteInsert {
                user_id: &session.user_id,
                book_id: &n.book_id,
                chapter: n.chapter,
                verse_start: n.verse_start,
                verse_end: n.verse_end,
                content: &n.content,
                created_at: Some(millis_to_rfc3339(n.created_at)),
                updated_at: Some(millis_to_rfc3339(n.updated_at)),
            })
            .collect();
        self.insert_rows(&session, "notes", &rows).await
    }

    async fn import_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<()> {
        let session = self.require_session().await?;
        let rows: Vec<BookmarkInsert<'_>> = bookmarks
            .iter()
            .map(|b| BookmarkInsert {
                user_id: &session.user_id,
                book_id: &b.book_id,
                chapter: b.chapter,
                verse_start: b.verse_start,
                verse_end: b.verse_end,
                created_at: Some(millis_to_rfc3339(b.created_at)),
            })
            .collect();
        self.insert_rows(&session, "bookmarks", &rows).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticSessionProvider;

    #[test]
    fn test_highlight_row_maps_to_record() {
        let json = r#"{
            "id": "3f8a1c2e",
            "user_id": "user-1",
            "book_id": "genesis",
            "chapter": 1,
            "verse": 1,
            "color": "green",
            "created_at": "2024-06-01T12:00:00+00:00"
        }"#;
        let row: HighlightRow = serde_json::from_str(json).unwrap();
        let record = row.into_record().unwrap();

        assert_eq!(record.id.as_str(), "3f8a1c2e");
        assert_eq!(record.book_id, "genesis");
        assert_eq!(record.color, HighlightColor::Green);
        assert_eq!(record.created_at, 1_717_243_200_000);
    }

    #[test]
    fn test_note_row_maps_to_record() {
        let json = r#"{
            "id": "n-1",
            "user_id": "user-1",
            "book_id": "ruth",
            "chapter": 1,
            "verse_start": 1,
            "verse_end": 2,
            "content": "Test",
            "created_at": "2024-06-01T12:00:00Z",
            "updated_at": "2024-06-02T12:00:00Z"
        }"#;
        let record = serde_json::from_str::<NoteRow>(json).unwrap().into_record().unwrap();
        assert_eq!(record.verse_start, 1);
        assert_eq!(record.verse_end, 2);
        assert_eq!(record.content, "Test");
        assert!(record.updated_at > record.created_at);
    }

    #[test]
    fn test_insert_serializes_snake_case_and_skips_defaults() {
        let insert = HighlightInsert {
            user_id: "user-1",
            book_id: "genesis",
            chapter: 1,
            verse: 3,
            color: HighlightColor::Pink,
            created_at: None,
        };
        let json = serde_json::to_value(&insert).unwrap();
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["book_id"], "genesis");
        assert_eq!(json["color"], "pink");
        // Server assigns the timestamp when the client does not supply one
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_import_insert_carries_timestamps() {
        let insert = BookmarkInsert {
            user_id: "user-1",
            book_id: "matthew",
            chapter: 5,
            verse_start: 3,
            verse_end: 5,
            created_at: Some(millis_to_rfc3339(1_700_000_000_000)),
        };
        let json = serde_json::to_value(&insert).unwrap();
        assert!(json["created_at"].as_str().unwrap().starts_with("2023-11-14T"));
    }

    #[test]
    fn test_conflict_classification_from_status() {
        let err = classify_failure(409, "duplicate key value");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_conflict_classification_from_body_code() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        let err = classify_failure(400, body);
        assert!(err.is_conflict());
    }

    #[test]
    fn test_other_failures_are_rejections() {
        let err = classify_failure(500, "internal error");
        match err {
            Error::RemoteRejected { status, .. } => assert_eq!(status, 500),
            other => panic!("expected RemoteRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_table_url_normalizes_trailing_slash() {
        let store = RemoteStore::new(
            RemoteConfig {
                base_url: "https://project.example.co/".to_string(),
                api_key: "key".to_string(),
            },
            Arc::new(StaticSessionProvider::new()),
        );
        assert_eq!(
            store.table_url("highlights"),
            "https://project.example.co/rest/v1/highlights"
        );
    }

    #[tokio::test]
    async fn test_operations_require_a_session() {
        let store = RemoteStore::new(
            RemoteConfig {
                base_url: "https://project.example.co".to_string(),
                api_key: "key".to_string(),
            },
            Arc::new(StaticSessionProvider::new()),
        );
        let err = store.require_session().await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }
}
