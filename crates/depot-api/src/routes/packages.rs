//! `GET/HEAD /packages/*path`: one artifact resolved across local storage,
//! proxy caches, and the upstreams.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::routes::{head_response, object_response};
use crate::state::AppState;

/// Assemble the packages router.
pub fn router() -> Router<AppState> {
    Router::new().route("/packages/*path", get(package_get).head(package_head))
}

/// GET /packages/{path}: first source that has the artifact wins.
#[utoipa::path(
    get,
    path = "/packages/{path}",
    params(("path" = String, Path, description = "Artifact path")),
    responses(
        (status = 200, description = "Artifact content"),
        (status = 404, description = "No source has the artifact", body = crate::error::ErrorBody),
    ),
    tag = "packages"
)]
pub async fn package_get(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let object = state.resolver.resolve_package_get(&path).await?;
    Ok(object_response(object))
}

/// HEAD /packages/{path}: metadata from the first source that has it.
#[utoipa::path(
    head,
    path = "/packages/{path}",
    params(("path" = String, Path, description = "Artifact path")),
    responses(
        (status = 200, description = "Artifact exists"),
        (status = 404, description = "No source has the artifact"),
    ),
    tag = "packages"
)]
pub async fn package_head(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let head = state.resolver.resolve_package_head(&path).await?;
    Ok(head_response(&head))
}
