//! Service configuration
//! Mission: One place for every knob, from flags or the environment

use crate::auth::password::PasswordHasher;
use crate::auth::store::CredentialStore;
use crate::auth::{MemoryStore, TokenCodec, UserStore};
use crate::server::RouterOptions;
use anyhow::{bail, Context, Result};
use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// SQLite file at `--db-path`
    Sqlite,
    /// Process memory; everything is lost on exit
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "storefront-auth")]
#[command(about = "Storefront auth service - sign-up, sign-in, sign-out and gated routes")]
pub struct AuthConfig {
    /// Listen address
    #[arg(long = "bind", env = "AUTH_BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: String,

    /// Path prefix for every auth route
    #[arg(long, env = "AUTH_API_PREFIX", default_value = "/api/v1")]
    pub api_prefix: String,

    /// Credential store backend
    #[arg(long, env = "AUTH_BACKEND", value_enum, default_value_t = StoreBackend::Sqlite)]
    pub backend: StoreBackend,

    /// SQLite database file (sqlite backend only)
    #[arg(long, env = "AUTH_DB_PATH", default_value = "storefront_auth.db")]
    pub db_path: PathBuf,

    /// Signing secret for access tokens
    #[arg(long, env = "ACCESS_TOKEN_SECRET", default_value = DEV_ACCESS_SECRET, hide_env_values = true)]
    pub access_secret: String,

    /// Signing secret for refresh tokens
    #[arg(long, env = "REFRESH_TOKEN_SECRET", default_value = DEV_REFRESH_SECRET, hide_env_values = true)]
    pub refresh_secret: String,

    /// bcrypt work factor
    #[arg(
        long,
        env = "BCRYPT_COST",
        default_value_t = bcrypt::DEFAULT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31)
    )]
    pub bcrypt_cost: u32,

    /// Server-side pepper appended to passwords before hashing
    #[arg(long, env = "PASSWORD_PEPPER", default_value = "", hide_env_values = true)]
    pub password_pepper: String,

    /// Mark auth cookies `Secure` (HTTPS only)
    #[arg(long = "secure-cookies", env = "COOKIE_SECURE")]
    pub secure_cookies: bool,

    /// Browser origins allowed to call the API with credentials (comma-separated)
    #[arg(long, env = "AUTH_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Admin account seeded at startup
    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            bail!("Token secrets must not be empty");
        }
        // Shared keys would let a refresh token pass as an access token
        if self.access_secret == self.refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }
        if self.admin_username.is_some() != self.admin_password.is_some() {
            bail!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together");
        }

        if self.access_secret == DEV_ACCESS_SECRET || self.refresh_secret == DEV_REFRESH_SECRET {
            warn!("⚠️  Using development token secrets. Set ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET in production!");
        }
        if !self.secure_cookies {
            warn!("⚠️  Auth cookies are not marked Secure");
        }
        Ok(())
    }

    pub fn password_hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.bcrypt_cost, self.password_pepper.clone())
    }

    pub fn token_codec(&self) -> TokenCodec {
        TokenCodec::new(&self.access_secret, &self.refresh_secret)
    }

    pub fn build_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let hasher = self.password_hasher();
        let store: Arc<dyn CredentialStore> = match self.backend {
            StoreBackend::Sqlite => {
                info!("🗄️  Using SQLite credential store at {}", self.db_path.display());
                Arc::new(UserStore::new(&self.db_path, hasher)?)
            }
            StoreBackend::Memory => {
                warn!("⚠️  Using in-memory credential store; data is lost on restart");
                Arc::new(MemoryStore::new(hasher))
            }
        };
        Ok(store)
    }

    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        Some((self.admin_username.as_deref()?, self.admin_password.as_deref()?))
    }

    pub fn router_options(&self) -> Result<RouterOptions> {
        let allowed_origins = self
            .allowed_origins
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid origin: {}", o)))
            .collect::<Result<Vec<_>>>()?;

        Ok(RouterOptions {
            api_prefix: self.api_prefix.clone(),
            allowed_origins,
        })
    }
}
