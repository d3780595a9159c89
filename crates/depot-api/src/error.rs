//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from depot-core, depot-store, depot-proxy and the
//! resolver to HTTP status codes with a JSON error body.
//!
//! An upstream repository's status code is passed through unchanged, so a
//! client asking for a protected artifact sees the upstream's 401 or 403.
//! Internal error details are logged and never returned to the client.

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use depot_core::ValidationError;
use depot_proxy::ProxyError;
use depot_store::StoreError;

use crate::orchestration::ResolveError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid key, proxy definition, or request body (400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or wrong credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Method not supported on this path (405).
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Upload without a `Content-Length` header (411).
    #[error("Content-Length required")]
    LengthRequired,

    /// An upstream repository answered with this status.
    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::LengthRequired => (StatusCode::LENGTH_REQUIRED, "LENGTH_REQUIRED"),
            Self::UpstreamStatus(code) => (
                StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
                "UPSTREAM_STATUS",
            ),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Construct a not-found error (404).
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let challenge = matches!(self, Self::Unauthorized(_));

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::UpstreamStatus(code) => tracing::info!(code, "upstream status passed through"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        // Only our own auth failures challenge; upstream 401s pass through bare.
        if challenge {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(crate::auth::BASIC_CHALLENGE),
            );
        }
        response
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidKey(e) => e.into(),
            StoreError::NotFound(key) => Self::NotFound(key),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Validation(e) => e.into(),
            ProxyError::UpstreamStatus { code } => Self::UpstreamStatus(code),
            ProxyError::Store(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(path) => Self::NotFound(path),
            ResolveError::Reserved(path) => {
                Self::Validation(format!("path {path} is in the reserved namespace"))
            }
            ResolveError::Validation(e) => e.into(),
            incomplete @ ResolveError::IncompleteBody { .. } => {
                Self::Validation(incomplete.to_string())
            }
            ResolveError::UpstreamStatus(code) => Self::UpstreamStatus(code),
            ResolveError::Store(e) => e.into(),
            ResolveError::Proxy(e) => e.into(),
        }
    }
}
