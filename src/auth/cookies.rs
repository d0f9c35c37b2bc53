//! Cookie transport for credential artifacts

use crate::auth::gateway::{ArtifactSink, PresentedArtifacts};
use crate::auth::jwt::TokenClass;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Reads the `access` / `refresh` cookies off an incoming request
pub fn presented_artifacts(jar: &CookieJar) -> PresentedArtifacts {
    let value = |class: TokenClass| {
        jar.get(class.cookie_name())
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };

    PresentedArtifacts {
        access: value(TokenClass::Access),
        refresh: value(TokenClass::Refresh),
    }
}

/// Writes artifacts as http-only cookies. Start from the request's jar so
/// clearing emits proper removal cookies.
pub struct CookieSink {
    jar: CookieJar,
    secure: bool,
}

impl CookieSink {
    pub fn new(jar: CookieJar, secure: bool) -> Self {
        Self { jar, secure }
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }

    fn update(&mut self, f: impl FnOnce(CookieJar) -> CookieJar) {
        let jar = std::mem::replace(&mut self.jar, CookieJar::new());
        self.jar = f(jar);
    }
}

impl ArtifactSink for CookieSink {
    fn set_artifact(&mut self, class: TokenClass, token: String) {
        let max_age = time::Duration::seconds(class.lifetime().as_secs() as i64);
        let cookie = Cookie::build((class.cookie_name(), token))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age);
        self.update(|jar| jar.add(cookie));
    }

    fn clear_artifact(&mut self, class: TokenClass) {
        let cookie = Cookie::build(class.cookie_name()).path("/");
        self.update(|jar| jar.remove(cookie));
    }
}
