//! HTTP surface: route table, gates and outer layers

use crate::auth::api::{self as auth_api, AuthState};
use crate::auth::errors::AuthError;
use crate::auth::middleware::{auth_gate, authorize};
use crate::auth::models::UserLevel;
use crate::middleware::request_logging;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub api_prefix: String,
    /// Empty means no CORS layer at all
    pub allowed_origins: Vec<HeaderValue>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            api_prefix: "/api/v1".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

pub async fn health_check() -> &'static str {
    "storefront-auth operational"
}

/// Unknown routes look exactly like gate denials
async fn not_found() -> AuthError {
    AuthError::NotFound
}

pub fn build_router(state: AuthState, options: &RouterOptions) -> Router {
    let codec = state.gateway.codec().clone();
    let secure = state.secure_cookies;

    let customer_routes = Router::new()
        .route("/account", get(auth_api::get_account))
        .route_layer(middleware::from_fn_with_state(
            authorize(codec.clone(), UserLevel::Customer).secure_cookies(secure),
            auth_gate,
        ));

    let admin_routes = Router::new()
        .route("/users", get(auth_api::list_users))
        .route_layer(middleware::from_fn_with_state(
            authorize(codec, UserLevel::Admin).secure_cookies(secure),
            auth_gate,
        ));

    let api = Router::new()
        .route("/sign-up", post(auth_api::sign_up))
        .route("/sign-in", post(auth_api::sign_in))
        .route("/sign-out", post(auth_api::sign_out))
        .merge(customer_routes)
        .merge(admin_routes)
        .with_state(state);

    let prefix = options.api_prefix.trim_end_matches('/');
    let app = Router::new().route("/health", get(health_check));
    let app = if prefix.is_empty() {
        app.merge(api)
    } else if prefix.starts_with('/') {
        app.nest(prefix, api)
    } else {
        app.nest(&format!("/{}", prefix), api)
    };

    let app = app
        .fallback(not_found)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http());

    if options.allowed_origins.is_empty() {
        app
    } else {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(options.allowed_origins.clone()))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true),
        )
    }
}
