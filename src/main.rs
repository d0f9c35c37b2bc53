//! Storefront Auth - sign-up, sign-in, sign-out and level-gated routes
//! Mission: One live session per account, nothing leaks past the gate

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_auth::{
    auth::{seed_admin, AuthGateway, AuthState},
    build_router, AuthConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = AuthConfig::parse();
    config.validate()?;

    info!("🚀 Storefront auth starting ({:?} store)", config.backend);

    let store = config.build_store().context("Failed to open credential store")?;

    if let Some((username, password)) = config.admin_credentials() {
        match seed_admin(store.as_ref(), username, password).await {
            Ok(Some(_)) => {}
            Ok(None) => info!("Admin user {} already exists", username),
            Err(e) => warn!("Failed to seed admin user: {}", e),
        }
    }

    let codec = Arc::new(config.token_codec());
    let gateway = Arc::new(AuthGateway::new(store, codec));
    let state = AuthState::new(gateway, config.secure_cookies);
    let app = build_router(state, &config.router_options()?);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(
        "🎯 Auth server listening on {} (prefix {})",
        config.bind_addr, config.api_prefix
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 Auth server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Fall back to the crate root when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
