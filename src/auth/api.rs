//! Authentication API Endpoints
//! Mission: Expose sign-up, sign-in, sign-out and the gated account endpoints

use crate::auth::{
    cookies::{presented_artifacts, CookieSink},
    errors::AuthError,
    gateway::{AuthGateway, SignOutOutcome},
    models::{ApiResponse, Claims, PublicUser, SignInRequest, SignUpRequest, UserListResponse},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub gateway: Arc<AuthGateway>,
    pub secure_cookies: bool,
}

impl AuthState {
    pub fn new(gateway: Arc<AuthGateway>, secure_cookies: bool) -> Self {
        Self {
            gateway,
            secure_cookies,
        }
    }
}

type AuthReply = Result<(CookieJar, Json<ApiResponse>), AuthError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload.map(|Json(inner)| inner).map_err(|rejection| {
        warn!("Rejected auth payload: {}", rejection.body_text());
        AuthError::BadRequest(rejection.body_text())
    })
}

/// Sign-up endpoint - POST {prefix}/sign-up
pub async fn sign_up(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> AuthReply {
    let request = body(payload)?;
    debug!("Sign-up attempt: {}", request.username);

    let presented = presented_artifacts(&jar);
    let mut sink = CookieSink::new(jar, state.secure_cookies);
    let ok = state.gateway.sign_up(&presented, request, &mut sink).await?;

    Ok((sink.into_jar(), Json(ApiResponse::ok(ok.message, Some(ok.user)))))
}

/// Sign-in endpoint - POST {prefix}/sign-in
pub async fn sign_in(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> AuthReply {
    let request = body(payload)?;
    debug!("🔐 Sign-in attempt: {}", request.username);

    let presented = presented_artifacts(&jar);
    let mut sink = CookieSink::new(jar, state.secure_cookies);
    let ok = state.gateway.sign_in(&presented, request, &mut sink).await?;

    Ok((sink.into_jar(), Json(ApiResponse::ok(ok.message, Some(ok.user)))))
}

/// Sign-out endpoint - POST {prefix}/sign-out. Succeeds even when not signed in.
pub async fn sign_out(State(state): State<AuthState>, jar: CookieJar) -> AuthReply {
    let presented = presented_artifacts(&jar);
    let mut sink = CookieSink::new(jar, state.secure_cookies);

    let response = match state.gateway.sign_out(&presented, &mut sink).await? {
        SignOutOutcome::SignedOut(user) => ApiResponse::ok(
            format!(
                "You have successfully signed out! See you soon {}!",
                user.username
            ),
            None,
        ),
        SignOutOutcome::NotSignedIn => ApiResponse::ok("You are not signed in.", None),
    };

    Ok((sink.into_jar(), Json(response)))
}

/// Current account - GET {prefix}/account (Customer gate)
/// Built from the verified token; no store lookup
pub async fn get_account(Extension(claims): Extension<Claims>) -> Json<ApiResponse> {
    let message = format!("Signed in as {}", claims.user.username);
    Json(ApiResponse::ok(message, Some(claims.user)))
}

/// List all users - GET {prefix}/users (Admin gate)
pub async fn list_users(
    State(state): State<AuthState>,
) -> Result<Json<UserListResponse>, AuthError> {
    let users: Vec<PublicUser> = state
        .gateway
        .store()
        .list_users()
        .await?
        .iter()
        .map(|u| u.public())
        .collect();

    Ok(Json(UserListResponse { status: 200, users }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenClass, TokenCodec};
    use crate::auth::memory_store::MemoryStore;
    use crate::auth::middleware::{auth_gate, authorize};
    use crate::auth::models::UserLevel;
    use crate::auth::password::PasswordHasher;
    use crate::auth::store::{seed_admin, CredentialStore};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        middleware,
        response::Response,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    fn app(store: Arc<dyn CredentialStore>) -> (Router, Arc<TokenCodec>) {
        let codec = Arc::new(TokenCodec::new("access-secret", "refresh-secret"));
        let state = AuthState::new(Arc::new(AuthGateway::new(store, codec.clone())), false);

        let router = Router::new()
            .route("/sign-up", post(sign_up))
            .route("/sign-in", post(sign_in))
            .route("/sign-out", post(sign_out))
            .merge(
                Router::new().route("/account", get(get_account)).route_layer(
                    middleware::from_fn_with_state(
                        authorize(codec.clone(), UserLevel::Customer),
                        auth_gate,
                    ),
                ),
            )
            .merge(Router::new().route("/users", get(list_users)).route_layer(
                middleware::from_fn_with_state(authorize(codec.clone(), UserLevel::Admin), auth_gate),
            ))
            .with_state(state);
        (router, codec)
    }

    fn memory_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(PasswordHasher::new(4, String::new())))
    }

    fn post_json(uri: &str, json: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(json.to_string())).unwrap()
    }

    /// Collapse Set-Cookie headers into a Cookie header value, dropping removals
    fn cookies_from(response: &Response) -> String {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter(|pair| !pair.ends_with('='))
            .collect::<Vec<_>>()
            .join("; ")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_sets_cookies_and_welcomes() {
        let (app, codec) = app(memory_store());

        let response = app
            .oneshot(post_json(
                "/sign-up",
                r#"{"username":"alice","password":"pw123","firstName":"Alice"}"#,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = cookies_from(&response);
        let access = cookies
            .split("; ")
            .find_map(|c| c.strip_prefix("access="))
            .unwrap()
            .to_string();
        assert_eq!(
            codec.verify(TokenClass::Access, &access).unwrap().user.username,
            "alice"
        );

        let json = json_body(response).await;
        assert_eq!(json["status"], 200);
        assert_eq!(json["message"], "Welcome alice! You are now signed up.");
        assert_eq!(json["user"]["firstName"], "Alice");
        assert_eq!(json["user"]["level"], 0);
        assert!(json["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (app, _) = app(memory_store());

        let response = app
            .oneshot(post_json("/sign-in", "{not json", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_account_requires_customer_cookie() {
        let (app, _) = app(memory_store());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/account").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let signed_up = app
            .clone()
            .oneshot(post_json("/sign-up", r#"{"username":"bob","password":"pw"}"#, None))
            .await
            .unwrap();
        let cookies = cookies_from(&signed_up);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/account")
                    .header(header::COOKIE, cookies)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["user"]["username"], "bob");
    }

    #[tokio::test]
    async fn test_admin_lists_users() {
        let store = memory_store();
        seed_admin(store.as_ref(), "root", "supersecret").await.unwrap();
        let (app, _) = app(store);

        let signed_in = app
            .clone()
            .oneshot(post_json(
                "/sign-in",
                r#"{"username":"root","password":"supersecret"}"#,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(signed_in.status(), StatusCode::OK);
        let cookies = cookies_from(&signed_in);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users")
                    .header(header::COOKIE, cookies.clone())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["users"][0]["username"], "root");
        assert_eq!(json["users"][0]["level"], 1);

        // Admin is not a customer
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/account")
                    .header(header::COOKIE, cookies)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sign_out_clears_cookies_and_is_repeatable() {
        let (app, _) = app(memory_store());

        let signed_up = app
            .clone()
            .oneshot(post_json("/sign-up", r#"{"username":"carol","password":"pw"}"#, None))
            .await
            .unwrap();
        let cookies = cookies_from(&signed_up);

        let response = app
            .clone()
            .oneshot(post_json("/sign-out", "", Some(&cookies)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let removals = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter(|v| v.to_str().unwrap().contains("Max-Age=0"))
            .count();
        assert_eq!(removals, 2);
        assert_eq!(
            json_body(response).await["message"],
            "You have successfully signed out! See you soon carol!"
        );

        let response = app
            .oneshot(post_json("/sign-out", "", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "You are not signed in.");
    }
}
