//! Auth error taxonomy and its HTTP mapping

use crate::auth::session::SessionError;
use crate::auth::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Session already active
    Conflict(String),
    /// Duplicate handle or malformed credentials
    BadRequest(String),
    /// Bad handle/secret, or action blocked by an existing session
    Unauthorized(String),
    /// Deliberately masks both "no such route" and "access denied"
    NotFound,
    /// A collaborator lacks a required capability
    Unsupported(String),
    InternalServerError,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            AuthError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            AuthError::Conflict(r)
            | AuthError::BadRequest(r)
            | AuthError::Unauthorized(r)
            | AuthError::Unsupported(r) => r,
            AuthError::NotFound => "Resource Not Found",
            AuthError::InternalServerError => "Unknown Server Error",
        }
    }

    pub fn already_signed_in() -> Self {
        AuthError::Unauthorized(
            "You are already signed in. Please sign out before taking this action".to_string(),
        )
    }

    pub fn invalid_credentials() -> Self {
        AuthError::Unauthorized("Invalid username or password".to_string())
    }

    pub fn username_taken() -> Self {
        AuthError::BadRequest("Username is already taken".to_string())
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.reason(), self.status().as_u16())
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unsupported(op) => {
                error!("Credential store does not support {}", op);
                AuthError::Unsupported(format!("Operation '{}' is not supported", op))
            }
            other => {
                error!("Credential store failure: {}", other);
                AuthError::InternalServerError
            }
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Conflict(_) => AuthError::Conflict(
                "An active session already exists for this account".to_string(),
            ),
            SessionError::Store(store) => store.into(),
            SessionError::Token(err) => {
                error!("Token issuance failed: {:#}", err);
                AuthError::InternalServerError
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // Same shape as the router fallback so a denial looks like a missing route
            AuthError::NotFound => ErrorBody {
                status: status.as_u16(),
                message: None,
                reason: None,
                error: Some(self.reason()),
            },
            _ => ErrorBody {
                status: status.as_u16(),
                message: Some(status.canonical_reason().unwrap_or("Error")),
                reason: Some(self.reason()),
                error: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
