//! Authentication Gateway
//! Mission: Sign-up, sign-in and sign-out on top of the session manager
//!
//! The gateway knows nothing about HTTP. Callers hand it the credential
//! artifacts the client presented and an [`ArtifactSink`] to write new ones to.

use crate::auth::errors::AuthError;
use crate::auth::jwt::{TokenClass, TokenCodec};
use crate::auth::models::{
    Claims, NewUser, PublicUser, Session, SignInRequest, SignUpRequest, TokenPair, UserLevel,
};
use crate::auth::session::SessionManager;
use crate::auth::store::{CredentialStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Credential artifacts presented by the client (cookie values)
#[derive(Debug, Clone, Default)]
pub struct PresentedArtifacts {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl PresentedArtifacts {
    pub fn get(&self, class: TokenClass) -> Option<&str> {
        match class {
            TokenClass::Access => self.access.as_deref(),
            TokenClass::Refresh => self.refresh.as_deref(),
        }
    }
}

/// Where outward credential artifacts are written
pub trait ArtifactSink {
    /// Lifetime is `class.lifetime()`
    fn set_artifact(&mut self, class: TokenClass, token: String);
    fn clear_artifact(&mut self, class: TokenClass);
}

#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub user: PublicUser,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum SignOutOutcome {
    SignedOut(PublicUser),
    /// Artifacts missing or unusable; nothing was changed
    NotSignedIn,
}

pub struct AuthGateway {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    sessions: SessionManager,
}

impl AuthGateway {
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<TokenCodec>) -> Self {
        let sessions = SessionManager::new(store.clone(), codec.clone());
        Self {
            store,
            codec,
            sessions,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The session the presented refresh token belongs to. A token that verifies
    /// but is not the stored secret was superseded and does not count.
    async fn presented_session(
        &self,
        presented: &PresentedArtifacts,
    ) -> Result<Option<(Claims, Session)>, AuthError> {
        let Some((token, claims)) = presented.get(TokenClass::Refresh).and_then(|token| {
            self.codec
                .verify(TokenClass::Refresh, token)
                .map(|claims| (token, claims))
        }) else {
            return Ok(None);
        };

        match self.sessions.has_active_session(claims.user.id).await? {
            Some(session) if session.secret == token => Ok(Some((claims, session))),
            Some(_) => {
                debug!("Superseded refresh token presented for {}", claims.user.username);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn presented_session_is_active(
        &self,
        presented: &PresentedArtifacts,
    ) -> Result<bool, AuthError> {
        Ok(self.presented_session(presented).await?.is_some())
    }

    pub async fn sign_up<S: ArtifactSink + Send>(
        &self,
        presented: &PresentedArtifacts,
        request: SignUpRequest,
        sink: &mut S,
    ) -> Result<AuthSuccess, AuthError> {
        if self.presented_session_is_active(presented).await? {
            warn!("Sign-up blocked: caller is already signed in");
            return Err(AuthError::already_signed_in());
        }

        require_credentials(&request.username, &request.password)?;

        if self
            .store
            .find_user_by_username(&request.username)
            .await?
            .is_some()
        {
            warn!("Sign-up rejected, username taken: {}", request.username);
            return Err(AuthError::username_taken());
        }

        let user = match self
            .store
            .create_user(NewUser {
                username: request.username,
                password: request.password,
                first_name: request.first_name,
                last_name: request.last_name,
                level: UserLevel::Customer,
            })
            .await
        {
            Ok(user) => user,
            // Concurrent sign-up took the handle between lookup and insert
            Err(StoreError::Conflict(_)) => return Err(AuthError::username_taken()),
            Err(e) => return Err(e.into()),
        };

        let tokens = self.sessions.open_session(&user).await?;
        emit_tokens(sink, tokens);

        info!("✅ Sign-up successful: {}", user.username);
        Ok(AuthSuccess {
            message: format!("Welcome {}! You are now signed up.", user.username),
            user: user.public(),
        })
    }

    pub async fn sign_in<S: ArtifactSink + Send>(
        &self,
        presented: &PresentedArtifacts,
        request: SignInRequest,
        sink: &mut S,
    ) -> Result<AuthSuccess, AuthError> {
        if self.presented_session_is_active(presented).await? {
            warn!("Sign-in blocked: caller is already signed in");
            return Err(AuthError::already_signed_in());
        }

        require_credentials(&request.username, &request.password)?;

        let Some(user) = self
            .store
            .authenticate(&request.username, &request.password)
            .await?
        else {
            warn!("❌ Failed sign-in attempt: {}", request.username);
            return Err(AuthError::invalid_credentials());
        };

        // A leftover row means the client lost its artifacts without signing out
        let tokens = if self.sessions.has_active_session(user.id).await?.is_some() {
            self.sessions.replace_session(&user).await?
        } else {
            self.sessions.open_session(&user).await?
        };
        emit_tokens(sink, tokens);

        info!("✅ Sign-in successful: {} ({})", user.username, user.level.as_str());
        Ok(AuthSuccess {
            message: format!("Welcome {}! You are signed in.", user.username),
            user: user.public(),
        })
    }

    /// Never fails for missing or invalid artifacts; that is just "not signed in"
    pub async fn sign_out<S: ArtifactSink + Send>(
        &self,
        presented: &PresentedArtifacts,
        sink: &mut S,
    ) -> Result<SignOutOutcome, AuthError> {
        if presented.get(TokenClass::Access).is_none() {
            return Ok(SignOutOutcome::NotSignedIn);
        }

        // Only the holder of the current refresh secret may end the session
        let Some((claims, _)) = self.presented_session(presented).await? else {
            return Ok(SignOutOutcome::NotSignedIn);
        };

        let Some(user) = self.store.find_user_by_id(claims.user.id).await? else {
            return Ok(SignOutOutcome::NotSignedIn);
        };

        self.sessions.close_session(user.id).await?;
        sink.clear_artifact(TokenClass::Access);
        sink.clear_artifact(TokenClass::Refresh);

        info!("👋 Sign-out: {}", user.username);
        Ok(SignOutOutcome::SignedOut(user.public()))
    }
}

fn require_credentials(username: &str, password: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AuthError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }
    Ok(())
}

fn emit_tokens<S: ArtifactSink>(sink: &mut S, tokens: TokenPair) {
    sink.set_artifact(TokenClass::Access, tokens.access);
    sink.set_artifact(TokenClass::Refresh, tokens.refresh);
}
