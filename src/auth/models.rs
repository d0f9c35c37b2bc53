//! Authentication Models
//! Mission: Define identity, session and token payload structures

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub first_name: String,
    pub last_name: String,
    pub level: UserLevel,
    pub created_at: String,
}

impl User {
    /// Outward view of the account, secret stripped
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            level: self.level,
        }
    }
}

/// Authorization tier. Serialized as its integer value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum UserLevel {
    #[default]
    Customer = 0,
    Admin = 1,
}

impl UserLevel {
    pub fn as_str(&self) -> &str {
        match self {
            UserLevel::Customer => "customer",
            UserLevel::Admin => "admin",
        }
    }
}

impl From<UserLevel> for u8 {
    fn from(level: UserLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for UserLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UserLevel::Customer),
            1 => Ok(UserLevel::Admin),
            other => Err(format!("unknown user level {}", other)),
        }
    }
}

/// Identity record as it leaves the service (and as it is signed into tokens)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub level: UserLevel,
}

/// Data needed to create an identity
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub level: UserLevel,
}

/// Server-side session row. `secret` holds the refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub secret: String,
    pub created_at: String,
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(flatten)]
    pub user: PublicUser,
    pub iat: i64, // issued-at timestamp
    pub exp: i64, // expiration timestamp
    /// Unique per issue, so a replaced session never gets its old refresh token back
    pub jti: Uuid,
}

/// Freshly minted credential pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Sign-up request body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Sign-in request body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// JSON envelope shared by every auth endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, user: Option<PublicUser>) -> Self {
        Self {
            status: 200,
            message: message.into(),
            user,
        }
    }
}

/// Admin listing of registered accounts
#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub status: u16,
    pub users: Vec<PublicUser>,
}
