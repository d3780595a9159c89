//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented routes into one OpenAPI document served at
//! `/openapi.json`. Direct artifact access lives in the router fallback and
//! has no path entry of its own.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Assembled OpenAPI document for the API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Depot Artifact Repository",
        version = "0.1.0",
        description = "Object-storage backed artifact repository with upstream proxies, merged catalog listings, and the packages group view.",
        license(name = "BUSL-1.1")
    ),
    paths(
        crate::routes::health::liveness,
        crate::routes::catalog::catalog,
        crate::routes::proxies::list_proxies,
        crate::routes::proxies::create_proxy,
        crate::routes::proxies::update_proxy,
        crate::routes::proxies::delete_proxy,
        crate::routes::packages::package_get,
        crate::routes::packages::package_head,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::proxies::ProxyBody,
    )),
    modifiers(&BasicAuthAddon),
    security(("basic_auth" = [])),
    tags(
        (name = "health", description = "Liveness"),
        (name = "catalog", description = "Merged directory listings"),
        (name = "proxies", description = "Upstream proxy management"),
        (name = "packages", description = "Group view over local storage and every proxy"),
    )
)]
pub struct ApiDoc;

/// Registers the `basic_auth` scheme referenced by the document.
struct BasicAuthAddon;

impl Modify for BasicAuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            );
        }
    }
}

/// Build the OpenAPI router. Mounted outside authentication.
pub fn router() -> Router {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
