//! Injected session context
//!
//! Holds the access token and the set of resources the signed-in user has
//! borrowed. Created once at the application root and passed explicitly to
//! every component that needs it; `logout` tears the session down.
//!
//! Token changes are published on a `watch` channel so long-lived
//! subscribers (the realtime hub connection) can reconnect or disconnect.

use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default)]
struct SessionState {
    user_id: Option<String>,
    borrowed: HashSet<Uuid>,
}

struct SessionInner {
    state: RwLock<SessionState>,
    token_tx: watch::Sender<Option<String>>,
}

/// Shared handle to the current session
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

impl SessionContext {
    /// Create an anonymous session
    pub fn new() -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(SessionState::default()),
                token_tx,
            }),
        }
    }

    /// Set the access token (login or token refresh)
    ///
    /// Watchers are only notified when the token actually changes.
    pub async fn login(&self, access_token: String, user_id: Option<String>) {
        {
            let mut state = self.inner.state.write().await;
            // A refresh without a user id keeps the current user
            if let Some(user_id) = user_id {
                if state.user_id.as_deref() != Some(user_id.as_str()) {
                    // A different user never inherits the previous user's borrow set
                    state.borrowed.clear();
                }
                state.user_id = Some(user_id);
            }
        }

        let changed = self.inner.token_tx.send_if_modified(|current| {
            if current.as_deref() == Some(access_token.as_str()) {
                false
            } else {
                *current = Some(access_token.clone());
                true
            }
        });
        if changed {
            info!("Session token updated");
        }
    }

    /// Clear the token and all per-user state
    pub async fn logout(&self) {
        {
            let mut state = self.inner.state.write().await;
            state.user_id = None;
            state.borrowed.clear();
        }
        self.inner.token_tx.send_if_modified(|current| current.take().is_some());
        info!("Session cleared");
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.token_tx.borrow().clone()
    }

    /// Access token, or `Unauthenticated` when signed out
    pub fn require_token(&self) -> Result<String> {
        self.access_token()
            .ok_or_else(|| Error::Unauthenticated("no access token in session".to_string()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.token_tx.borrow().is_some()
    }

    /// Receiver notified on every token change
    pub fn watch_token(&self) -> watch::Receiver<Option<String>> {
        self.inner.token_tx.subscribe()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.inner.state.read().await.user_id.clone()
    }

    /// Record a resource the user now holds
    pub async fn mark_borrowed(&self, resource_id: Uuid) {
        self.inner.state.write().await.borrowed.insert(resource_id);
    }

    pub async fn is_borrowed(&self, resource_id: Uuid) -> bool {
        self.inner.state.read().await.borrowed.contains(&resource_id)
    }

    pub async fn borrowed(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.inner.state.read().await.borrowed.iter().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_session_is_anonymous() {
        let session = SessionContext::new();
        assert!(!session.is_authenticated());
        assert!(matches!(session.require_token(), Err(Error::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn test_login_notifies_watchers_once_per_change() {
        let session = SessionContext::new();
        let mut rx = session.watch_token();

        session.login("t1".to_string(), Some("u1".to_string())).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some("t1"));

        // Same token again: no notification
        session.login("t1".to_string(), Some("u1".to_string())).await;
        assert!(!rx.has_changed().unwrap());

        session.login("t2".to_string(), Some("u1".to_string())).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_logout_clears_state() {
        let session = SessionContext::new();
        let resource = Uuid::new_v4();
        session.login("t".to_string(), Some("u".to_string())).await;
        session.mark_borrowed(resource).await;
        assert!(session.is_borrowed(resource).await);

        let mut rx = session.watch_token();
        session.logout().await;

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
        assert!(!session.is_borrowed(resource).await);
        assert_eq!(session.user_id().await, None);
    }

    #[tokio::test]
    async fn test_user_switch_resets_borrowed() {
        let session = SessionContext::new();
        let resource = Uuid::new_v4();
        session.login("a".to_string(), Some("alice".to_string())).await;
        session.mark_borrowed(resource).await;

        session.login("b".to_string(), Some("bob".to_string())).await;
        assert!(session.borrowed().await.is_empty());
    }

    #[tokio::test]
    async fn test_token_refresh_without_user_keeps_state() {
        let session = SessionContext::new();
        let resource = Uuid::new_v4();
        session.login("t1".to_string(), Some("alice".to_string())).await;
        session.mark_borrowed(resource).await;

        session.login("t2".to_string(), None).await;
        assert_eq!(session.access_token().as_deref(), Some("t2"));
        assert_eq!(session.user_id().await.as_deref(), Some("alice"));
        assert!(session.is_borrowed(resource).await);
    }
}
