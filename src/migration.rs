//! # Local → Remote Migration
//!
//! Exactly-once transfer of a device's local annotations into the hosted
//! backend, run the first time a user authenticates on a device that has
//! local data.
//!
//! ## State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       MIGRATION LIFECYCLE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   not_started ──── fresh session, no marker ────► in_progress           │
//! │                                                        │                │
//! │        ▲                                               │                │
//! │        │                              ┌────────────────┤                │
//! │        │                              │                │                │
//! │        └──────── any failure ─────────┘                │                │
//! │            (marker unset, local kept,        all three kinds submitted  │
//! │             next login retries)                        │                │
//! │                                                        ▼                │
//! │                                     clear local tables, set marker      │
//! │                                                        │                │
//! │                                                        ▼                │
//! │                                                    completed            │
//! │                                          (subsequent logins: no-op)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records are submitted in fixed-size batches. A batch rejected as a
//! duplicate means a prior partial run already transferred it — the batch
//! is skipped and the run continues. Any other error aborts the run with
//! the marker unset and local data intact, so the next login retries from
//! scratch; re-submitted rows are rejected as duplicates by the backend's
//! uniqueness constraints, which keeps the routine idempotent.

use std::sync::Arc;

use crate::error::Result;
use crate::store::{AnnotationBackend, LocalStore};

/// Rows per remote insert, bounding payload size.
pub const BATCH_SIZE: usize = 100;

const FLAG_PREFIX: &str = "cloud_migration_completed";

/// Persisted migration state for one user on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No completion marker; a run is due on next login
    NotStarted,
    /// A run is currently executing (never persisted)
    InProgress,
    /// The marker is set; future logins are no-ops
    Completed,
}

/// What a migration run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The completion marker was already set; zero remote writes
    AlreadyCompleted,
    /// Local data was transferred and cleared
    Migrated {
        /// Highlights submitted
        highlights: usize,
        /// Notes submitted
        notes: usize,
        /// Bookmarks submitted
        bookmarks: usize,
    },
}

/// Runs the one-time transfer for a user.
pub struct Migrator {
    local: Arc<LocalStore>,
    remote: Arc<dyn AnnotationBackend>,
}

fn completion_flag(user_id: &str) -> String {
    format!("{}_{}", FLAG_PREFIX, user_id)
}

impl Migrator {
    /// Wire the migrator to its source and destination.
    pub fn new(local: Arc<LocalStore>, remote: Arc<dyn AnnotationBackend>) -> Self {
        Self { local, remote }
    }

    /// The persisted state for a user on this device.
    pub fn state(&self, user_id: &str) -> Result<MigrationState> {
        match self.local.get_flag(&completion_flag(user_id))?.as_deref() {
            Some("true") => Ok(MigrationState::Completed),
            _ => Ok(MigrationState::NotStarted),
        }
    }

    /// Remove the completion marker so the next login migrates again.
    pub fn reset(&self, user_id: &str) -> Result<()> {
        self.local.delete_flag(&completion_flag(user_id))
    }

    /// Migrate all local annotations to the remote store for `user_id`.
    ///
    /// Safe to call on every login: once completed it is a no-op, and a
    /// failed run leaves everything in place for the next attempt.
    pub async fn run(&self, user_id: &str) -> Result<MigrationOutcome> {
        if self.state(user_id)? == MigrationState::Completed {
            tracing::debug!("Migration already completed for user {}", user_id);
            return Ok(MigrationOutcome::AlreadyCompleted);
        }

        tracing::info!("Starting migration to remote store for user {}", user_id);

        let highlights = self.local.all_highlights()?;
        let notes = self.local.every_note()?;
        let bookmarks = self.local.every_bookmark()?;

        if !highlights.is_empty() {
            tracing::info!("Migrating {} highlights...", highlights.len());
            for batch in highlights.chunks(BATCH_SIZE) {
                match self.remote.import_highlights(batch).await {
                    Ok(()) => {}
                    Err(e) if e.is_conflict() => {
                        tracing::warn!("Some highlights already exist, skipping batch");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if !notes.is_empty() {
            tracing::info!("Migrating {} notes...", notes.len());
            for batch in notes.chunks(BATCH_SIZE) {
                match self.remote.import_notes(batch).await {
                    Ok(()) => {}
                    Err(e) if e.is_conflict() => {
                        tracing::warn!("Some notes already exist, skipping batch");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if !bookmarks.is_empty() {
            tracing::info!("Migrating {} bookmarks...", bookmarks.len());
            for batch in bookmarks.chunks(BATCH_SIZE) {
                match self.remote.import_bookmarks(batch).await {
                    Ok(()) => {}
                    Err(e) if e.is_conflict() => {
                        tracing::warn!("Some bookmarks already exist, skipping batch");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        // Only now is the run complete: clear local data and persist the
        // marker. A failure above leaves both untouched.
        self.local.clear_annotations()?;
        self.local.set_flag(&completion_flag(user_id), "true")?;

        tracing::info!("Migration completed for user {}", user_id);

        Ok(MigrationOutcome::Migrated {
            highlights: highlights.len(),
            notes: notes.len(),
            bookmarks: bookmarks.len(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HighlightColor, LocalStore};
    use crate::testutil::{FailOn, MemoryRemote};

    async fn seeded_local() -> Arc<LocalStore> {
        let local = Arc::new(LocalStore::open(None).await.unwrap());
        local.insert_highlight("genesis", 1, 1, HighlightColor::Yellow).unwrap();
        local.insert_highlight("genesis", 1, 2, HighlightColor::Green).unwrap();
        local.insert_highlight("exodus", 3, 14, HighlightColor::Blue).unwrap();
        local.insert_note("ruth", 1, 1, 2, "first note").unwrap();
        local.insert_note("ruth", 1, 16, 17, "second note").unwrap();
        local
    }

    #[tokio::test]
    async fn test_first_login_transfers_and_clears() {
        let local = seeded_local().await;
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        let outcome = migrator.run("user-1").await.unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                highlights: 3,
                notes: 2,
                bookmarks: 0,
            }
        );

        assert_eq!(remote.total_rows(), 5);
        assert_eq!(local.annotation_counts().unwrap(), (0, 0, 0));
        assert_eq!(migrator.state("user-1").unwrap(), MigrationState::Completed);
    }

    #[tokio::test]
    async fn test_second_login_is_noop() {
        let local = seeded_local().await;
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        migrator.run("user-1").await.unwrap();
        let writes_after_first = remote.write_count();

        let outcome = migrator.run("user-1").await.unwrap();
        assert_eq!(outcome, MigrationOutcome::AlreadyCompleted);
        assert_eq!(remote.write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn test_retry_after_partial_success_never_duplicates() {
        let local = seeded_local().await;
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        // First attempt dies after highlights made it through
        remote.fail_on(FailOn::Notes);
        assert!(migrator.run("user-1").await.is_err());
        assert_eq!(migrator.state("user-1").unwrap(), MigrationState::NotStarted);
        assert_eq!(local.annotation_counts().unwrap(), (3, 2, 0));
        assert_eq!(remote.total_rows(), 3);

        // Retry re-submits everything; already-migrated highlights bounce
        // off the uniqueness constraints as a conflict and are skipped
        remote.fail_on(FailOn::Nothing);
        let outcome = migrator.run("user-1").await.unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                highlights: 3,
                notes: 2,
                bookmarks: 0,
            }
        );

        assert_eq!(remote.total_rows(), 5);
        assert_eq!(remote.highlight_rows(), 3);
        assert_eq!(local.annotation_counts().unwrap(), (0, 0, 0));
        assert_eq!(migrator.state("user-1").unwrap(), MigrationState::Completed);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_local_data_and_marker_unset() {
        let local = seeded_local().await;
        local.insert_bookmark("matthew", 5, 3, 5).unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        remote.fail_on(FailOn::Bookmarks);
        assert!(migrator.run("user-1").await.is_err());

        // Highlights and notes were submitted, but nothing was cleared and
        // the marker is unset — the next login retries all three kinds
        assert_eq!(local.annotation_counts().unwrap(), (3, 2, 1));
        assert_eq!(migrator.state("user-1").unwrap(), MigrationState::NotStarted);
    }

    #[tokio::test]
    async fn test_empty_local_store_completes_immediately() {
        let local = Arc::new(LocalStore::open(None).await.unwrap());
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        let outcome = migrator.run("user-1").await.unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                highlights: 0,
                notes: 0,
                bookmarks: 0,
            }
        );
        assert_eq!(remote.write_count(), 0);
        assert_eq!(migrator.state("user-1").unwrap(), MigrationState::Completed);
    }

    #[tokio::test]
    async fn test_markers_are_per_user() {
        let local = seeded_local().await;
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        migrator.run("user-1").await.unwrap();
        assert_eq!(migrator.state("user-1").unwrap(), MigrationState::Completed);
        assert_eq!(migrator.state("user-2").unwrap(), MigrationState::NotStarted);
    }

    #[tokio::test]
    async fn test_reset_allows_rerun() {
        let local = seeded_local().await;
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        migrator.run("user-1").await.unwrap();
        migrator.reset("user-1").unwrap();
        assert_eq!(migrator.state("user-1").unwrap(), MigrationState::NotStarted);

        // Local is empty now, so the rerun transfers nothing but completes
        let outcome = migrator.run("user-1").await.unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                highlights: 0,
                notes: 0,
                bookmarks: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_batching_large_dataset() {
        let local = Arc::new(LocalStore::open(None).await.unwrap());
        // Spread across chapters to stay clear of the per-verse unique index
        for chapter in 1..=10u32 {
            let verses: Vec<u32> = (1..=25).collect();
            local
                .insert_highlights("psalms", chapter, &verses, HighlightColor::Yellow)
                .unwrap();
        }
        let remote = Arc::new(MemoryRemote::new());
        let migrator = Migrator::new(local.clone(), remote.clone());

        let outcome = migrator.run("user-1").await.unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                highlights: 250,
                notes: 0,
                bookmarks: 0,
            }
        );
        // 250 rows in batches of 100 → 3 import calls
        assert_eq!(remote.write_count(), 3);
        assert_eq!(remote.highlight_rows(), 250);
    }
}
