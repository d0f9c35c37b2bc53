//! JWT Token Codec
//! Mission: Issue and verify access/refresh tokens, one signing key per class

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Clock skew tolerated when checking `exp`
const LEEWAY_SECS: u64 = 5;

/// Token class. Each class has its own secret and lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenClass::Access => Duration::from_secs(60 * 60),
            TokenClass::Refresh => Duration::from_secs(30 * 24 * 60 * 60),
        }
    }

    /// Cookie name the artifact travels under
    pub fn cookie_name(&self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl ClassKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies tokens for both classes
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;

        Self {
            access: ClassKeys::from_secret(access_secret),
            refresh: ClassKeys::from_secret(refresh_secret),
            validation,
        }
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Issue a token of `class` for `user`, valid from now
    pub fn issue(&self, class: TokenClass, user: &User) -> Result<String> {
        self.issue_at(class, user, Utc::now())
    }

    /// Issue a token as if the clock read `issued_at`
    pub fn issue_at(&self, class: TokenClass, user: &User, issued_at: DateTime<Utc>) -> Result<String> {
        let lifetime = chrono::Duration::from_std(class.lifetime()).context("Invalid lifetime")?;
        let expiration = issued_at
            .checked_add_signed(lifetime)
            .context("Invalid timestamp")?;

        let claims = Claims {
            user: user.public(),
            iat: issued_at.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4(),
        };

        debug!(
            "Issuing {:?} token for user {} ({}), expires at {}",
            class, user.username, user.id, expiration
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(class).encoding)
            .context("Failed to encode token")
    }

    /// Verify a token against `class`. Any malformed, forged or expired token yields `None`.
    pub fn verify(&self, class: TokenClass, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.keys(class).decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("Rejected {:?} token: {}", class, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::UserLevel;

    fn create_test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            level: UserLevel::Customer,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new("access-secret-12345", "refresh-secret-67890")
    }

    #[test]
    fn test_round_trip_both_classes() {
        let codec = codec();
        let user = create_test_user();

        for class in [TokenClass::Access, TokenClass::Refresh] {
            let token = codec.issue(class, &user).unwrap();
            let claims = codec.verify(class, &token).unwrap();
            assert_eq!(claims.user, user.public());
            assert_eq!(claims.exp - claims.iat, class.lifetime().as_secs() as i64);
        }
    }

    #[test]
    fn test_cross_class_rejected() {
        let codec = codec();
        let user = create_test_user();

        let access = codec.issue(TokenClass::Access, &user).unwrap();
        let refresh = codec.issue(TokenClass::Refresh, &user).unwrap();

        assert!(codec.verify(TokenClass::Refresh, &access).is_none());
        assert!(codec.verify(TokenClass::Access, &refresh).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let user = create_test_user();

        let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
        let access = codec.issue_at(TokenClass::Access, &user, two_hours_ago).unwrap();
        assert!(codec.verify(TokenClass::Access, &access).is_none());

        // Same instant is still well inside the refresh lifetime
        let refresh = codec.issue_at(TokenClass::Refresh, &user, two_hours_ago).unwrap();
        assert!(codec.verify(TokenClass::Refresh, &refresh).is_some());

        let last_month = Utc::now() - chrono::Duration::days(31);
        let refresh = codec.issue_at(TokenClass::Refresh, &user, last_month).unwrap();
        assert!(codec.verify(TokenClass::Refresh, &refresh).is_none());
    }

    #[test]
    fn test_same_instant_tokens_differ() {
        let codec = codec();
        let user = create_test_user();
        let now = Utc::now();

        let first = codec.issue_at(TokenClass::Refresh, &user, now).unwrap();
        let second = codec.issue_at(TokenClass::Refresh, &user, now).unwrap();
        assert_ne!(first, second);

        let a = codec.verify(TokenClass::Refresh, &first).unwrap();
        let b = codec.verify(TokenClass::Refresh, &second).unwrap();
        assert_eq!(a.iat, b.iat);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = codec();
        assert!(codec.verify(TokenClass::Access, "invalid.token.here").is_none());
        assert!(codec.verify(TokenClass::Refresh, "").is_none());
    }

    #[test]
    fn test_different_secrets_reject() {
        let codec1 = TokenCodec::new("secret1", "secret2");
        let codec2 = TokenCodec::new("secret3", "secret4");
        let user = create_test_user();

        let token = codec1.issue(TokenClass::Access, &user).unwrap();
        assert!(codec2.verify(TokenClass::Access, &token).is_none());
    }

    #[test]
    fn test_payload_omits_password_hash() {
        let codec = codec();
        let user = create_test_user();
        let token = codec.issue(TokenClass::Access, &user).unwrap();

        let claims = codec.verify(TokenClass::Access, &token).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
