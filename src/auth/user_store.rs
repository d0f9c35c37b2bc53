//! User Storage
//! Mission: Persist accounts and sessions with SQLite

use crate::auth::models::{NewUser, Session, User, UserLevel};
use crate::auth::password::PasswordHasher;
use crate::auth::store::{IdentityStore, SessionStore, StoreResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    level INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- UNIQUE(user_id) backs the one-session-per-user invariant
CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    secret TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

const USER_COLUMNS: &str = "id, username, password_hash, first_name, last_name, level, created_at";
const SESSION_COLUMNS: &str = "id, user_id, secret, created_at";

/// User storage with SQLite backend
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
    hasher: PasswordHasher,
}

impl UserStore {
    /// Open (or create) the store at `db_path` and initialize the schema
    pub fn new<P: AsRef<Path>>(db_path: P, hasher: PasswordHasher) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open auth database at {}", path.display()))?;
        Self::from_connection(conn, hasher)
    }

    pub fn in_memory(hasher: PasswordHasher) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, hasher)
    }

    fn from_connection(conn: Connection, hasher: PasswordHasher) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize auth schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hasher,
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&*conn)
        })
        .await?
    }
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let level: i64 = row.get(5)?;
    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        level: u8::try_from(level)
            .ok()
            .and_then(|l| UserLevel::try_from(l).ok())
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(5, level))?,
        created_at: row.get(6)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let user_id: String = row.get(1)?;
    Ok(Session {
        id: row.get(0)?,
        user_id: Uuid::parse_str(&user_id).map_err(|e| conversion_error(1, e))?,
        secret: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

#[async_trait]
impl IdentityStore for UserStore {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let username = username.to_string();
        self.with_conn(move |conn| query_user_by_username(conn, &username))
            .await
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    params![id.to_string()],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        // Hash outside the connection lock
        let hasher = self.hasher.clone();
        let password = new_user.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;

        self.with_conn(move |conn| {
            let user = User {
                id: Uuid::new_v4(),
                username: new_user.username,
                password_hash,
                first_name: new_user.first_name,
                last_name: new_user.last_name,
                level: new_user.level,
                created_at: Utc::now().to_rfc3339(),
            };

            conn.execute(
                &format!(
                    "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    USER_COLUMNS
                ),
                params![
                    user.id.to_string(),
                    user.username,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    u8::from(user.level),
                    user.created_at,
                ],
            )?;

            info!("✅ Created user: {} ({})", user.username, user.level.as_str());
            Ok(user)
        })
        .await
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
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at",
                USER_COLUMNS
            ))?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for UserStore {
    async fn find_session_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        self.with_conn(move |conn| {
            let session = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM user_sessions WHERE user_id = ?1",
                        SESSION_COLUMNS
                    ),
                    params![user_id.to_string()],
                    session_from_row,
                )
                .optional()?;
            Ok(session)
        })
        .await
    }

    async fn create_session(&self, user_id: Uuid, secret: &str) -> StoreResult<Session> {
        let secret = secret.to_string();
        self.with_conn(move |conn| {
            let created_at = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO user_sessions (user_id, secret, created_at) VALUES (?1, ?2, ?3)",
                params![user_id.to_string(), secret, created_at],
            )?;
            debug!("Session row inserted for user {}", user_id);
            Ok(Session {
                id: conn.last_insert_rowid(),
                user_id,
                secret,
                created_at,
            })
        })
        .await
    }

    async fn delete_session(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        self.with_conn(move |conn| {
            let removed = conn
                .query_row(
                    &format!(
                        "DELETE FROM user_sessions WHERE user_id = ?1 RETURNING {}",
                        SESSION_COLUMNS
                    ),
                    params![user_id.to_string()],
                    session_from_row,
                )
                .optional()?;
            Ok(removed)
        })
        .await
    }

    async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM user_sessions ORDER BY id",
                SESSION_COLUMNS
            ))?;
            let sessions = stmt
                .query_map([], session_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
    }
}
