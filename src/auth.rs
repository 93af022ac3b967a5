//! # Authentication Collaborator
//!
//! The annotation core never implements authentication itself. It depends on
//! a [`SessionProvider`] that answers one question: is there a currently
//! valid authenticated session, and if so, for which user?
//!
//! The facade calls this on every operation, so implementations should be
//! cheap — a cached token check, not a network round trip. A provider that
//! fails (for example, a network error while refreshing) is treated by the
//! facade as "no session": local operations are always available offline.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

/// A currently valid authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Stable user identifier assigned by the auth provider
    pub user_id: String,
    /// Bearer token for the hosted backend
    pub access_token: String,
}

impl Session {
    /// Create a session from its parts.
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

/// Read-only view of the authentication state.
///
/// `Ok(None)` means "not signed in"; `Err` means the check itself failed.
/// Callers that can fall back to offline behavior should treat the two
/// the same way.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Return the current session, if any.
    async fn current_session(&self) -> Result<Option<Session>>;
}

/// An in-memory session provider.
///
/// Used by tests and by local-only deployments that never sign in. The
/// session can be swapped at runtime to simulate login and logout.
#[derive(Default)]
pub struct StaticSessionProvider {
    session: RwLock<Option<Session>>,
}

impl StaticSessionProvider {
    /// Create a provider with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that is already signed in.
    pub fn signed_in(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }

    /// Install a session (simulates login).
    pub fn sign_in(&self, session: Session) {
        *self.session.write() = Some(session);
    }

    /// Drop the session (simulates logout).
    pub fn sign_out(&self) {
        *self.session.write() = None;
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_starts_signed_out() {
        let provider = StaticSessionProvider::new();
        assert_eq!(provider.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let provider = StaticSessionProvider::new();
        provider.sign_in(Session::new("user-1", "token-abc"));

        let session = provider.current_session().await.unwrap().unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.access_token, "token-abc");

        provider.sign_out();
        assert_eq!(provider.current_session().await.unwrap(), None);
    }
}
