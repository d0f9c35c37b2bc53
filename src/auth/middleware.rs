//! Authorization Gate
//! Mission: Admit requests whose access cookie carries exactly the required level
//!
//! Every denial is the same `404 Resource Not Found` so a caller cannot tell a
//! protected route from a missing one.

use crate::auth::cookies::{presented_artifacts, CookieSink};
use crate::auth::errors::AuthError;
use crate::auth::gateway::ArtifactSink;
use crate::auth::jwt::{TokenClass, TokenCodec};
use crate::auth::models::{Claims, UserLevel};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{debug, warn};

/// Replacement access token produced by a renewal policy
#[derive(Debug, Clone)]
pub struct RenewedAccess {
    pub claims: Claims,
    pub token: String,
}

/// Decides what happens when the access token is unusable but the refresh
/// token still verifies
#[async_trait]
pub trait AccessRenewal: Send + Sync {
    async fn renew(&self, refresh: &Claims) -> Option<RenewedAccess>;
}

/// Never renews: an expired access token means the request is denied
pub struct DenyRenewal;

#[async_trait]
impl AccessRenewal for DenyRenewal {
    async fn renew(&self, refresh: &Claims) -> Option<RenewedAccess> {
        debug!(
            "Access renewal declined for {} ({})",
            refresh.user.username, refresh.user.id
        );
        None
    }
}

/// Gate configuration, one per protected route group
#[derive(Clone)]
pub struct GateState {
    codec: Arc<TokenCodec>,
    required: UserLevel,
    renewal: Arc<dyn AccessRenewal>,
    secure_cookies: bool,
}

impl GateState {
    pub fn with_renewal(mut self, renewal: Arc<dyn AccessRenewal>) -> Self {
        self.renewal = renewal;
        self
    }

    pub fn secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn required(&self) -> UserLevel {
        self.required
    }
}

/// Build a gate admitting only `required`. Use with
/// `middleware::from_fn_with_state(authorize(codec, level), auth_gate)`.
pub fn authorize(codec: Arc<TokenCodec>, required: UserLevel) -> GateState {
    GateState {
        codec,
        required,
        renewal: Arc::new(DenyRenewal),
        secure_cookies: false,
    }
}

/// Auth middleware that validates the access cookie against the gate's level
pub async fn auth_gate(
    State(gate): State<GateState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let presented = presented_artifacts(&jar);

    let Some(access) = presented.get(TokenClass::Access) else {
        debug!("Denied {}: no access token", req.uri().path());
        return Err(AuthError::NotFound);
    };

    let (claims, renewed) = match gate.codec.verify(TokenClass::Access, access) {
        Some(claims) => (claims, None),
        None => {
            let refresh_claims = presented
                .get(TokenClass::Refresh)
                .and_then(|token| gate.codec.verify(TokenClass::Refresh, token))
                .ok_or(AuthError::NotFound)?;

            let renewed = gate
                .renewal
                .renew(&refresh_claims)
                .await
                .ok_or(AuthError::NotFound)?;
            (renewed.claims, Some(renewed.token))
        }
    };

    // Exact match: an admin does not pass a customer gate
    if claims.user.level != gate.required {
        warn!(
            "⚠️  Access denied for {} on {}: level {} required, has {}",
            claims.user.username,
            req.uri().path(),
            gate.required.as_str(),
            claims.user.level.as_str()
        );
        return Err(AuthError::NotFound);
    }

    req.extensions_mut().insert(claims);
    let response = next.run(req).await;

    match renewed {
        Some(token) => {
            let mut sink = CookieSink::new(jar, gate.secure_cookies);
            sink.set_artifact(TokenClass::Access, token);
            Ok((sink.into_jar(), response).into_response())
        }
        None => Ok(response),
    }
}

/// Extract claims from request (use after `auth_gate`)
pub fn extract_claims(req: &Request) -> Option<&Claims> {
    req.extensions().get::<Claims>()
}
