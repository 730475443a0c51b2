//! Explicit session state shared by every request the client makes.
//!
//! A `Session` owns the credential store, the in-memory access token that is
//! attached to outgoing requests, the gate that serialises token refreshes, and
//! the status channel the application watches for expiry.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use zeroize::Zeroize;

use super::auth::{StoreError, TokenKey, TokenStore};

/// Authentication state as seen by the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credentials held (never logged in, or logged out).
    Anonymous,
    /// Credentials held; requests are sent authenticated.
    Active,
    /// A refresh failed and the credentials were discarded. The user has to log in again.
    Expired,
}

/// Tokens returned by a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct Session {
    store: Arc<dyn TokenStore>,
    /// Value used for the `Authorization` header; written through to `store`.
    access_token: RwLock<Option<String>>,
    refresh_gate: Mutex<()>,
    status: watch::Sender<SessionStatus>,
}

impl Session {
    /// Open a session over `store`, picking up any access token persisted by an earlier run.
    pub fn open(store: Arc<dyn TokenStore>) -> Result<Self, StoreError> {
        let access_token = store.load(TokenKey::Access)?;
        let initial = if access_token.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::Anonymous
        };
        let (status, _) = watch::channel(initial);
        Ok(Self {
            store,
            access_token: RwLock::new(access_token),
            refresh_gate: Mutex::new(()),
            status,
        })
    }

    /// Current access token, if any.
    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    /// Refresh token straight from the store; it is only needed on the refresh path.
    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.store.load(TokenKey::Refresh)
    }

    /// Install a fresh credential pair after login.
    pub async fn establish(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.store.save(TokenKey::Access, &pair.access_token)?;
        self.store.save(TokenKey::Refresh, &pair.refresh_token)?;
        *self.access_token.write().await = Some(pair.access_token.clone());
        self.status.send_replace(SessionStatus::Active);
        log::info!("Session established");
        Ok(())
    }

    /// Replace only the access token (refresh success). The refresh token is kept.
    pub async fn replace_access_token(&self, token: &str) -> Result<(), StoreError> {
        {
            let mut guard = self.access_token.write().await;
            if let Some(ref mut old) = *guard {
                old.zeroize();
            }
            *guard = Some(token.to_string());
        }
        self.store.save(TokenKey::Access, token)?;
        self.status.send_replace(SessionStatus::Active);
        Ok(())
    }

    /// Store a rotated refresh token handed out alongside a new access token.
    pub fn replace_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.save(TokenKey::Refresh, token)
    }

    /// Delete both tokens (logout). Status becomes `Anonymous`.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.wipe_cached_token().await;
        self.store.delete(TokenKey::Access)?;
        self.store.delete(TokenKey::Refresh)?;
        self.status.send_replace(SessionStatus::Anonymous);
        log::info!("Session cleared");
        Ok(())
    }

    /// Delete both tokens after an unrecoverable refresh failure and signal expiry.
    ///
    /// Store errors are logged, not returned: the caller is already failing
    /// with the refresh error and the in-memory token is gone either way.
    pub async fn expire(&self) {
        self.wipe_cached_token().await;
        for key in [TokenKey::Access, TokenKey::Refresh] {
            if let Err(e) = self.store.delete(key) {
                log::warn!("Failed to delete {} after session expiry: {}", key.as_str(), e);
            }
        }
        self.status.send_replace(SessionStatus::Expired);
        log::warn!("Session expired, credentials cleared");
    }

    /// Current status; use [`Session::subscribe`] to be told when it changes.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes (e.g. to send the user back to login on expiry).
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Held for the whole duration of a refresh so concurrent 401s coalesce.
    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_gate.lock().await
    }

    async fn wipe_cached_token(&self) {
        let mut guard = self.access_token.write().await;
        if let Some(ref mut token) = *guard {
            token.zeroize();
        }
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::MemoryStore;

    #[tokio::test]
    async fn test_open_picks_up_persisted_token() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let session = Session::open(store).unwrap();
        assert_eq!(session.access_token().await.as_deref(), Some("A1"));
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("R1"));
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_establish_then_clear() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::open(store.clone()).unwrap();
        assert_eq!(session.status(), SessionStatus::Anonymous);

        session
            .establish(&CredentialPair {
                access_token: "A1".into(),
                refresh_token: "R1".into(),
            })
            .await
            .unwrap();
        assert_eq!(store.load(TokenKey::Access).unwrap().as_deref(), Some("A1"));
        assert_eq!(session.status(), SessionStatus::Active);

        session.clear().await.unwrap();
        assert_eq!(session.access_token().await, None);
        assert_eq!(store.load(TokenKey::Refresh).unwrap(), None);
        assert_eq!(session.status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_replace_keeps_refresh_token() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let session = Session::open(store.clone()).unwrap();

        session.replace_access_token("A2").await.unwrap();
        assert_eq!(session.access_token().await.as_deref(), Some("A2"));
        assert_eq!(store.load(TokenKey::Access).unwrap().as_deref(), Some("A2"));
        assert_eq!(store.load(TokenKey::Refresh).unwrap().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_expire_notifies_subscribers() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let session = Session::open(store.clone()).unwrap();
        let mut rx = session.subscribe();

        session.expire().await;

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionStatus::Expired);
        assert_eq!(store.load(TokenKey::Access).unwrap(), None);
        assert_eq!(store.load(TokenKey::Refresh).unwrap(), None);
    }
}
