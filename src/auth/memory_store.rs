//! In-memory credential store for local development and tests

use crate::auth::models::{NewUser, Session, User};
use crate::auth::password::PasswordHasher;
use crate::auth::store::{IdentityStore, SessionStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    // Keyed by user id: the map itself enforces one session per user
    sessions: RwLock<HashMap<Uuid, Session>>,
    next_session_id: AtomicI64,
    hasher: PasswordHasher,
}

impl MemoryStore {
    pub fn new(hasher: PasswordHasher) -> Self {
        Self {
            hasher,
            ..Default::default()
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let hasher = self.hasher.clone();
        let password = new_user.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            level: new_user.level,
            created_at: Utc::now().to_rfc3339(),
        };

        let mut users = self.users.write();
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        users.insert(user.id, user.clone());
        drop(users);

        info!("✅ Created user: {} ({})", user.username, user.level.as_str());
        Ok(user)
    }

    async fn authenticate(&self, username: &str, password: &str) -> StoreResult<Option<User>> {
        let Some(user) = self.find_user_by_username(username).await? else {
            return Ok(None);
        };

        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || -> StoreResult<Option<User>> {
            let valid = hasher.verify(&password, &user.password_hash)?;
            Ok(valid.then_some(user))
        })
        .await?
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().get(&user_id).cloned())
    }

    async fn create_session(&self, user_id: Uuid, secret: &str) -> StoreResult<Session> {
        match self.sessions.write().entry(user_id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "session already exists for user {}",
                user_id
            ))),
            Entry::Vacant(slot) => {
                let session = Session {
                    id: self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1,
                    user_id,
                    secret: secret.to_string(),
                    created_at: Utc::now().to_rfc3339(),
                };
                Ok(slot.insert(session).clone())
            }
        }
    }

    async fn delete_session(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.sessions.write().remove(&user_id))
    }

    async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().values().cloned().collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }
}
