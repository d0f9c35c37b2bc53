//! Storefront Auth Library
//!
//! Session lifecycle and level-gated routes, exposed for the binary and tests.

pub mod auth;
pub mod config;
pub mod middleware;
pub mod server;

pub use config::AuthConfig;
pub use server::{build_router, RouterOptions};
