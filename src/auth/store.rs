//! Credential Store seam
//! Mission: Storage-agnostic identity and session persistence, split by capability
//!
//! Every store holds identities ([`IdentityStore`]). Only identity-bearing
//! stores that can track logins also implement [`SessionStore`]; the auth
//! gateway requires both through [`CredentialStore`].

use crate::auth::models::{NewUser, Session, User, UserLevel};
use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("constraint violated: {0}")]
    Conflict(String),
    /// The backing store does not implement this capability
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, ref msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for StoreError {
    fn from(e: bcrypt::BcryptError) -> Self {
        StoreError::Backend(format!("password hashing failed: {}", e))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Backend(format!("blocking task failed: {}", e))
    }
}

/// Identity persistence
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Hashes the password and inserts the identity. Duplicate handles are `Conflict`.
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    /// Store-specific credential comparison. `None` for unknown handle or wrong password.
    async fn authenticate(&self, username: &str, password: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Err(StoreError::Unsupported("list_users"))
    }
}

/// Session persistence. At most one row per user id must be enforced on insert.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Session>>;

    /// Fails with `Conflict` if the user already has a session row
    async fn create_session(&self, user_id: Uuid, secret: &str) -> StoreResult<Session>;

    /// Returns the removed row, if any
    async fn delete_session(&self, user_id: Uuid) -> StoreResult<Option<Session>>;

    async fn list_sessions(&self) -> StoreResult<Vec<Session>>;
}

/// A store that can back the full sign-up / sign-in / sign-out lifecycle
pub trait CredentialStore: IdentityStore + SessionStore {}

impl<T: IdentityStore + SessionStore + ?Sized> CredentialStore for T {}

/// Create the privileged account on first start. Existing handles are left untouched.
pub async fn seed_admin<S: IdentityStore + ?Sized>(
    store: &S,
    username: &str,
    password: &str,
) -> StoreResult<Option<User>> {
    if store.find_user_by_username(username).await?.is_some() {
        return Ok(None);
    }

    let admin = store
        .create_user(NewUser {
            username: username.to_string(),
            password: password.to_string(),
            first_name: "administrator".to_string(),
            last_name: String::new(),
            level: UserLevel::Admin,
        })
        .await?;

    info!("🔐 Admin user seeded: {}", admin.username);
    if password.len() < 8 {
        warn!("⚠️  Admin password is shorter than 8 characters");
    }

    Ok(Some(admin))
}
