//! Direct artifact access on every path no other route claims.
//!
//! Mounted as the router fallback, so the key is the whole request path:
//! `GET /com/acme/lib/1.0/lib-1.0.jar` reads key `com/acme/lib/1.0/lib-1.0.jar`.
//! GET and HEAD fall through local storage, implicit proxy roots, and proxy
//! caches before reaching upstreams. PUT stores the body and both checksum
//! sidecars.

use std::io;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use crate::error::AppError;
use crate::routes::{head_response, object_response};
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Router fallback: dispatch on method.
pub async fn artifact(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let key = request_key(&uri)?;
    match method {
        Method::GET => {
            let object = state.resolver.get_artifact(&key).await?;
            Ok(object_response(object))
        }
        Method::HEAD => {
            let head = state.resolver.head_artifact(&key).await?;
            Ok(head_response(&head))
        }
        Method::PUT => upload(&state, &key, &headers, body).await,
        other => Err(AppError::MethodNotAllowed(other.to_string())),
    }
}

/// Percent-decoded request path without the leading slash.
fn request_key(uri: &Uri) -> Result<String, AppError> {
    let decoded = urlencoding::decode(uri.path())
        .map_err(|_| AppError::Validation("request path is not valid UTF-8".to_string()))?;
    let key = decoded.trim_start_matches('/');
    if key.is_empty() {
        return Err(AppError::not_found("/"));
    }
    Ok(key.to_string())
}

fn content_length(headers: &HeaderMap) -> Result<u64, AppError> {
    let raw = headers.get(CONTENT_LENGTH).ok_or(AppError::LengthRequired)?;
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| AppError::Validation("invalid Content-Length".to_string()))
}

async fn upload(
    state: &AppState,
    key: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let length = content_length(headers)?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    state
        .resolver
        .upload(key, reader, content_type, length)
        .await?;
    Ok(StatusCode::CREATED.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_decoded_path_without_leading_slash() {
        let uri: Uri = "/com/acme/my%20lib/1.0/a.jar?x=1".parse().unwrap();
        assert_eq!(request_key(&uri).unwrap(), "com/acme/my lib/1.0/a.jar");
    }

    #[test]
    fn root_path_is_not_found() {
        let uri: Uri = "/".parse().unwrap();
        assert!(matches!(request_key(&uri), Err(AppError::NotFound(_))));
    }

    #[test]
    fn missing_content_length_is_length_required() {
        let headers = HeaderMap::new();
        assert!(matches!(
            content_length(&headers),
            Err(AppError::LengthRequired)
        ));
    }

    #[test]
    fn malformed_content_length_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "ten".parse().unwrap());
        assert!(matches!(
            content_length(&headers),
            Err(AppError::Validation(_))
        ));
        headers.insert(CONTENT_LENGTH, "10".parse().unwrap());
        assert_eq!(content_length(&headers).unwrap(), 10);
    }
}
