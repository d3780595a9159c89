//! # depot-api: HTTP Surface for the Depot Artifact Repository
//!
//! Serves build artifacts stored in an S3-compatible bucket, pulls missing
//! artifacts through registered upstream proxies, and merges local and
//! remote listings into one catalog.
//!
//! ## API Surface
//!
//! | Path                    | Module                    | Auth |
//! |-------------------------|---------------------------|------|
//! | `/healthz`              | [`routes::health`]        | no   |
//! | `/openapi.json`         | [`openapi`]               | no   |
//! | `/catalog`              | [`routes::catalog`]       | yes  |
//! | `/proxies[/{name}]`     | [`routes::proxies`]       | yes  |
//! | `/packages/*`           | [`routes::packages`]      | yes  |
//! | any other path          | [`routes::artifacts`]     | yes  |
//! | `/metrics` (own port)   | [`metrics_router`]        | no   |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod orchestration;
pub mod routes;
pub mod state;

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

use crate::middleware::metrics::ApiMetrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Assemble the full application router with all routes and middleware.
///
/// The health check and the OpenAPI document are mounted outside the auth
/// middleware. Every path not claimed by a named route is direct artifact
/// access through the router fallback.
pub fn app(state: AppState) -> Router {
    let auth_config = state.auth.clone();
    let metrics = state.metrics.clone();

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::catalog::router())
        .merge(routes::proxies::router())
        .merge(routes::packages::router())
        .fallback(routes::artifacts::artifact)
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .layer(Extension(metrics))
        .with_state(state);

    // Unauthenticated health check and document.
    let public = Router::new()
        .merge(routes::health::router())
        .merge(openapi::router());

    Router::new().merge(public).merge(api)
}

/// Router for the separate metrics listener.
pub fn metrics_router(metrics: ApiMetrics) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .layer(Extension(metrics))
}

/// GET /metrics: Prometheus text exposition.
async fn render_metrics(Extension(metrics): Extension<ApiMetrics>) -> axum::response::Response {
    match metrics.gather_and_encode() {
        Ok(body) => ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
