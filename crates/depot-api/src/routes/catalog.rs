//! # Catalog Route
//!
//! `GET /catalog?path=&limit=` returns a JSON array of entries for one
//! directory. `limit` outside `1..=1000` (or unparseable) falls back to 100.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use depot_core::Entry;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Assemble the catalog router.
pub fn router() -> Router<AppState> {
    Router::new().route("/catalog", get(catalog))
}

/// Query parameters. Both are optional strings so that a bad `limit` falls
/// back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

fn effective_limit(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| (1..=MAX_LIMIT).contains(n))
        .unwrap_or(DEFAULT_LIMIT)
}

/// GET /catalog: merged listing of one directory.
#[utoipa::path(
    get,
    path = "/catalog",
    params(
        ("path" = Option<String>, Query, description = "Directory to list; root when empty. `packages/...` lists the group view."),
        ("limit" = Option<usize>, Query, description = "Maximum entries, 1..=1000 (default 100)"),
    ),
    responses(
        (status = 200, description = "Array of entries {name, path, type, size?}"),
        (status = 401, description = "Missing or invalid credentials", body = crate::error::ErrorBody),
        (status = 500, description = "Storage failure", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
pub async fn catalog(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<Entry>>, AppError> {
    let limit = effective_limit(query.limit.as_deref());
    let path = query.path.unwrap_or_default();
    let entries = state.resolver.catalog(&path, limit).await?;
    Ok(Json(entries))
}
