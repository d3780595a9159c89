//! Liveness check. Mounted outside authentication.

use axum::routing::get;
use axum::Router;

/// Assemble the health router.
pub fn router() -> Router {
    Router::new().route("/healthz", get(liveness))
}

/// GET /healthz: the process is up and serving.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is alive", body = String)),
    security(()),
    tag = "health"
)]
pub async fn liveness() -> &'static str {
    "ok"
}
