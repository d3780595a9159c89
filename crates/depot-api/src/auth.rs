//! # HTTP Basic Authentication
//!
//! Every route except the health check and the OpenAPI document sits behind
//! this middleware. Authentication is disabled when neither a username nor
//! a password is configured.
//!
//! Credentials are compared in constant time. A failed check answers 401
//! with `WWW-Authenticate: Basic realm="depot"` so that Maven and Gradle
//! clients retry with their configured credentials.

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Value of the `WWW-Authenticate` challenge.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"depot\"";

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the password to prevent credential leakage in logs.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field(
                "password",
                &(!self.password.is_empty()).then_some("[REDACTED]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Credentials required on every protected request.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether requests must authenticate.
    pub fn is_enabled(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }

    fn accepts(&self, username: &str, password: &str) -> bool {
        // Both comparisons always run.
        let user_ok = constant_time_eq(username, &self.username);
        let pass_ok = constant_time_eq(password, &self.password);
        user_ok & pass_ok
    }
}

/// Constant-time string comparison. When lengths differ a dummy comparison
/// runs so the timing does not depend on where the mismatch is.
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Decode `Basic <base64(user:pass)>`.
pub fn parse_basic(header_value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Axum middleware enforcing Basic credentials from [`AuthConfig`].
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let config = request.extensions().get::<AuthConfig>().cloned();
    let Some(config) = config.filter(AuthConfig::is_enabled) else {
        return next.run(request).await;
    };

    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(parse_basic);

    match credentials {
        Some(Some((user, pass))) if config.accepts(&user, &pass) => next.run(request).await,
        Some(Some((user, _))) => {
            tracing::warn!(user = %user, "authentication failed: bad credentials");
            unauthorized_response("invalid credentials")
        }
        Some(None) => {
            tracing::warn!("authentication failed: malformed Basic authorization header");
            unauthorized_response("authorization header must use Basic scheme")
        }
        None => {
            tracing::debug!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::{Extension, Router};
    use tower::ServiceExt;

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    fn test_app(config: AuthConfig) -> Router {
        Router::new()
            .route("/catalog", get(|| async { "ok" }))
            .layer(from_fn(auth_middleware))
            .layer(Extension(config))
    }

    async fn call(app: Router, auth: Option<String>) -> Response {
        let mut builder = Request::builder().uri("/catalog");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn disabled_auth_passes_everything() {
        let resp = call(test_app(AuthConfig::default()), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn valid_credentials_pass() {
        let app = test_app(AuthConfig::new("deployer", "s3cret"));
        let resp = call(app, Some(basic("deployer", "s3cret"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_header_is_challenged() {
        let resp = call(test_app(AuthConfig::new("u", "p")), None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            BASIC_CHALLENGE
        );
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = test_app(AuthConfig::new("u", "p"));
        let resp = call(app, Some(basic("u", "nope"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_scheme_is_rejected() {
        let app = test_app(AuthConfig::new("u", "p"));
        let resp = call(app, Some("Bearer abc".into())).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn password_only_config_is_enabled() {
        assert!(AuthConfig::new("", "p").is_enabled());
        assert!(!AuthConfig::default().is_enabled());
    }

    #[test]
    fn parse_basic_handles_colons_in_password() {
        assert_eq!(
            parse_basic(&basic("u", "a:b")),
            Some(("u".to_string(), "a:b".to_string()))
        );
        assert_eq!(parse_basic("Basic !!!"), None);
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", AuthConfig::new("u", "hunter2"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
