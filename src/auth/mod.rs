//! Authentication Module
//! Mission: Session lifecycle with paired access/refresh tokens and level-gated routes

pub mod api;
pub mod cookies;
pub mod errors;
pub mod gateway;
pub mod jwt;
pub mod memory_store;
pub mod middleware;
pub mod models;
pub mod password;
pub mod session;
pub mod store;
pub mod user_store;

pub use api::AuthState;
pub use errors::AuthError;
pub use gateway::{ArtifactSink, AuthGateway, PresentedArtifacts, SignOutOutcome};
pub use jwt::{TokenClass, TokenCodec};
pub use memory_store::MemoryStore;
pub use middleware::{auth_gate, authorize, AccessRenewal, DenyRenewal, GateState};
pub use session::{SessionError, SessionManager};
pub use store::{seed_admin, CredentialStore, IdentityStore, SessionStore, StoreError};
pub use user_store::UserStore;
