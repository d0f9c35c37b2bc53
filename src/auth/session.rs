//! Session Manager
//! Mission: Keep at most one live session per user
//!
//! Per-user state machine:
//!
//! ```text
//! NoSession --open--> Active --close--> NoSession
//! Active --replace--> Active'   (new token pair, old refresh secret gone)
//! ```
//!
//! `open` while `Active` is a [`SessionError::Conflict`]. The pre-check and the
//! insert are not atomic; the store's uniqueness constraint closes that window
//! and its violation surfaces as the same `Conflict`.

use crate::auth::jwt::{TokenClass, TokenCodec};
use crate::auth::models::{Session, TokenPair, User};
use crate::auth::store::{CredentialStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("user {0} already has an active session")]
    Conflict(Uuid),
    #[error("token issuance failed: {0}")]
    Token(#[source] anyhow::Error),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Store(e)
    }
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    pub async fn has_active_session(&self, user_id: Uuid) -> Result<Option<Session>, SessionError> {
        Ok(self.store.find_session_by_user_id(user_id).await?)
    }

    /// Mint a token pair and persist the refresh token as the session secret
    pub async fn open_session(&self, user: &User) -> Result<TokenPair, SessionError> {
        if self.has_active_session(user.id).await?.is_some() {
            return Err(SessionError::Conflict(user.id));
        }

        let access = self
            .codec
            .issue(TokenClass::Access, user)
            .map_err(SessionError::Token)?;
        let refresh = self
            .codec
            .issue(TokenClass::Refresh, user)
            .map_err(SessionError::Token)?;

        match self.store.create_session(user.id, &refresh).await {
            Ok(session) => {
                info!("🔑 Session {} opened for {}", session.id, user.username);
                Ok(TokenPair { access, refresh })
            }
            // Lost the race against a concurrent open for the same user
            Err(StoreError::Conflict(_)) => Err(SessionError::Conflict(user.id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotent: closing without a session is not an error
    pub async fn close_session(&self, user_id: Uuid) -> Result<(), SessionError> {
        match self.store.delete_session(user_id).await? {
            Some(session) => info!("🔒 Session {} closed for user {}", session.id, user_id),
            None => debug!("No session to close for user {}", user_id),
        }
        Ok(())
    }

    /// Drop whatever session the user has and open a fresh one
    pub async fn replace_session(&self, user: &User) -> Result<TokenPair, SessionError> {
        if let Some(stale) = self.store.delete_session(user.id).await? {
            debug!("Replacing stale session {} for {}", stale.id, user.username);
        }
        self.open_session(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory_store::MemoryStore;
    use crate::auth::models::{NewUser, UserLevel};
    use crate::auth::password::PasswordHasher;
    use crate::auth::store::{IdentityStore, SessionStore};

    async fn setup() -> (SessionManager, Arc<MemoryStore>, Arc<TokenCodec>, User) {
        let store = Arc::new(MemoryStore::new(PasswordHasher::new(4, String::new())));
        let codec = Arc::new(TokenCodec::new("access-secret", "refresh-secret"));
        let user = store
            .create_user(NewUser {
                username: "alice".to_string(),
                password: "pw123".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                level: UserLevel::Customer,
            })
            .await
            .unwrap();
        let manager = SessionManager::new(store.clone(), codec.clone());
        (manager, store, codec, user)
    }

    #[tokio::test]
    async fn test_open_persists_refresh_secret() {
        let (manager, store, codec, user) = setup().await;

        let pair = manager.open_session(&user).await.unwrap();
        let session = store.find_session_by_user_id(user.id).await.unwrap().unwrap();
        assert_eq!(session.secret, pair.refresh);

        assert!(codec.verify(TokenClass::Access, &pair.access).is_some());
        assert!(codec.verify(TokenClass::Refresh, &pair.refresh).is_some());
    }

    #[tokio::test]
    async fn test_open_while_active_conflicts() {
        let (manager, store, _, user) = setup().await;

        manager.open_session(&user).await.unwrap();
        let err = manager.open_session(&user).await.unwrap_err();
        assert!(matches!(err, SessionError::Conflict(id) if id == user.id));
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (manager, _, _, user) = setup().await;

        manager.open_session(&user).await.unwrap();
        manager.close_session(user.id).await.unwrap();
        manager.close_session(user.id).await.unwrap();
        assert!(manager.has_active_session(user.id).await.unwrap().is_none());

        // NoSession -> Active is legal again
        manager.open_session(&user).await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_swaps_session_row() {
        let (manager, store, _, user) = setup().await;

        manager.open_session(&user).await.unwrap();
        let before = store.find_session_by_user_id(user.id).await.unwrap().unwrap();

        let pair = manager.replace_session(&user).await.unwrap();
        let after = store.find_session_by_user_id(user.id).await.unwrap().unwrap();

        assert_ne!(before.id, after.id);
        assert_eq!(after.secret, pair.refresh);
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_without_session_opens_one() {
        let (manager, _, _, user) = setup().await;

        manager.replace_session(&user).await.unwrap();
        assert!(manager.has_active_session(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_opens_yield_single_session() {
        let (manager, store, _, user) = setup().await;
        let manager = Arc::new(manager);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move { manager.open_session(&user).await }));
        }

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(SessionError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }
}
