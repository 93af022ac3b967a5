//! # Live Queries
//!
//! Reactive reads for chapter views. The local store notifies through its
//! caller-driven re-query; the remote backend has no push channel, so live
//! views over it are refreshed by re-issuing the read on a fixed interval.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         LIVE QUERY FLOW                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   spawn ──► run query once ──► publish to watch channel                 │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │        session present? ──no──► done (local data only changes          │
//! │                  │               through this app instance)            │
//! │                 yes                                                     │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │        every POLL interval: re-run query, publish                       │
//! │        stop when the consumer drops its receiver                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `LiveQuery` is bound to one query context (one chapter view). Navigating
//! away drops it, which aborts the task — a late result for a stale context
//! is never applied to the new one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::SessionProvider;
use crate::error::Result;

/// Refresh interval for remote-backed live views. This is the documented
/// staleness bound: remote edits from another device become visible within
/// one interval.
pub const REMOTE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A self-refreshing view over one store query.
///
/// Holds `None` until the first load completes. Read errors during refresh
/// are logged and leave the previous value in place.
pub struct LiveQuery<T> {
    rx: watch::Receiver<Option<T>>,
    handle: JoinHandle<()>,
}

impl<T: Clone + Send + Sync + 'static> LiveQuery<T> {
    /// Spawn a live view with the default poll interval.
    pub fn spawn<F, Fut>(session: Arc<dyn SessionProvider>, query: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::spawn_with_interval(session, query, REMOTE_POLL_INTERVAL)
    }

    /// Spawn a live view with an explicit poll interval (tests use short
    /// intervals; production uses [`REMOTE_POLL_INTERVAL`]).
    pub fn spawn_with_interval<F, Fut>(
        session: Arc<dyn SessionProvider>,
        query: F,
        interval: Duration,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);

        let handle = tokio::spawn(async move {
            match query().await {
                Ok(value) => {
                    if tx.send(Some(value)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // Best-effort read path: treat as "no data yet"
                    tracing::warn!("Live query initial load failed: {}", e);
                }
            }

            // Polling only matters when a remote session can change data
            // underneath us; purely local data only changes through this
            // app instance, which re-queries on its own writes.
            let polling = match session.current_session().await {
                Ok(Some(_)) => true,
                Ok(None) => false,
                Err(e) => {
                    tracing::warn!("Session check failed, live polling disabled: {}", e);
                    false
                }
            };
            if !polling {
                return;
            }

            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; the initial load covered it
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    return;
                }
                match query().await {
                    Ok(value) => {
                        if tx.send(Some(value)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Live query refresh failed: {}", e);
                    }
                }
            }
        });

        Self { rx, handle }
    }

    /// The most recent result, or None before the first load lands.
    pub fn current(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Wait until the next published result.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Session, StaticSessionProvider};
    use crate::store::{HighlightColor, LocalStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_initial_load_publishes() {
        let store = Arc::new(LocalStore::open(None).await.unwrap());
        store.insert_highlight("genesis", 1, 1, HighlightColor::Yellow).unwrap();

        let query_store = store.clone();
        let mut live = LiveQuery::spawn_with_interval(
            Arc::new(StaticSessionProvider::new()),
            move || {
                let store = query_store.clone();
                async move { store.highlights_in_chapter("genesis", 1) }
            },
            Duration::from_millis(10),
        );

        assert!(live.changed().await);
        assert_eq!(live.current().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unauthenticated_view_does_not_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let live = LiveQuery::spawn_with_interval(
            Arc::new(StaticSessionProvider::new()),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(42u32)
                }
            },
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(live.current(), Some(42));
    }

    #[tokio::test]
    async fn test_authenticated_view_refreshes() {
        let store = Arc::new(LocalStore::open(None).await.unwrap());
        let provider = Arc::new(StaticSessionProvider::signed_in(Session::new("u", "t")));

        let query_store = store.clone();
        let mut live = LiveQuery::spawn_with_interval(
            provider,
            move || {
                let store = query_store.clone();
                async move { store.bookmarks_in_chapter("psalms", 23) }
            },
            Duration::from_millis(5),
        );

        assert!(live.changed().await);
        assert!(live.current().unwrap().is_empty());

        store.insert_bookmark("psalms", 23, 1, 6).unwrap();

        let refreshed = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                live.changed().await;
                if live.current().map(|b| b.len()) == Some(1) {
                    return true;
                }
            }
        })
        .await
        .unwrap_or(false);
        assert!(refreshed, "poll never picked up the new bookmark");
    }

    #[tokio::test]
    async fn test_drop_cancels_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = Arc::new(StaticSessionProvider::signed_in(Session::new("u", "t")));

        let live = LiveQuery::spawn_with_interval(
            provider,
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(0u32)
                }
            },
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(live);

        let after_drop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn test_refresh_error_keeps_previous_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = Arc::new(StaticSessionProvider::signed_in(Session::new("u", "t")));

        let mut live = LiveQuery::spawn_with_interval(
            provider,
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Ok(7u32)
                    } else {
                        Err(crate::error::Error::RemoteRequest("flaky".to_string()))
                    }
                }
            },
            Duration::from_millis(5),
        );

        assert!(live.changed().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        // Later failures never clobber the last good value
        assert_eq!(live.current(), Some(7));
    }
}
