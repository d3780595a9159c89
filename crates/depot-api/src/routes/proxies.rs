//! # Proxy Management Routes
//!
//! - `GET    /proxies`: list definitions
//! - `POST   /proxies`: register (201)
//! - `PUT    /proxies/:name`: replace the URL of `name`
//! - `DELETE /proxies/:name`: remove (204, also when already absent)

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use depot_core::ProxyDefinition;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the proxy router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proxies", get(list_proxies).post(create_proxy))
        .route("/proxies/:name", put(update_proxy).delete(delete_proxy))
}

/// A proxy definition as sent and returned over the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProxyBody {
    /// Proxy name, `[A-Za-z0-9._-]+`. Ignored on update.
    #[serde(default)]
    pub name: String,
    /// Upstream base URL.
    #[serde(default)]
    pub url: String,
}

impl From<ProxyDefinition> for ProxyBody {
    fn from(def: ProxyDefinition) -> Self {
        Self {
            name: def.name,
            url: def.url,
        }
    }
}

impl From<ProxyBody> for ProxyDefinition {
    fn from(body: ProxyBody) -> Self {
        ProxyDefinition::new(body.name, body.url)
    }
}

/// Map a body rejection to a 400.
fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

/// GET /proxies: all readable definitions.
#[utoipa::path(
    get,
    path = "/proxies",
    responses(
        (status = 200, description = "Registered proxies", body = Vec<ProxyBody>),
        (status = 401, description = "Missing or invalid credentials", body = crate::error::ErrorBody),
    ),
    tag = "proxies"
)]
pub async fn list_proxies(State(state): State<AppState>) -> Result<Json<Vec<ProxyBody>>, AppError> {
    let proxies = state.registry.list().await?;
    Ok(Json(proxies.into_iter().map(ProxyBody::from).collect()))
}

/// POST /proxies: register a proxy, replacing any with the same name.
#[utoipa::path(
    post,
    path = "/proxies",
    request_body = ProxyBody,
    responses(
        (status = 201, description = "Proxy registered", body = ProxyBody),
        (status = 400, description = "Invalid name, missing URL, or malformed JSON", body = crate::error::ErrorBody),
    ),
    tag = "proxies"
)]
pub async fn create_proxy(
    State(state): State<AppState>,
    body: Result<Json<ProxyBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ProxyBody>), AppError> {
    let def = ProxyDefinition::from(extract_json(body)?);
    let stored = state.registry.add(&def).await?;
    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// PUT /proxies/:name: replace the definition stored under `name`.
#[utoipa::path(
    put,
    path = "/proxies/{name}",
    params(("name" = String, Path, description = "Proxy name")),
    request_body = ProxyBody,
    responses(
        (status = 200, description = "Proxy updated", body = ProxyBody),
        (status = 400, description = "Invalid name, missing URL, or malformed JSON", body = crate::error::ErrorBody),
    ),
    tag = "proxies"
)]
pub async fn update_proxy(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<ProxyBody>, JsonRejection>,
) -> Result<Json<ProxyBody>, AppError> {
    let def = ProxyDefinition::from(extract_json(body)?);
    let stored = state.registry.update(&name, &def).await?;
    Ok(Json(stored.into()))
}

/// DELETE /proxies/:name: remove a proxy.
#[utoipa::path(
    delete,
    path = "/proxies/{name}",
    params(("name" = String, Path, description = "Proxy name")),
    responses(
        (status = 204, description = "Proxy removed or never existed"),
        (status = 400, description = "Invalid name", body = crate::error::ErrorBody),
    ),
    tag = "proxies"
)]
pub async fn delete_proxy(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.registry.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
