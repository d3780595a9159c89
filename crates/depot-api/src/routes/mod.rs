//! # API Route Modules
//!
//! - `health`: unauthenticated liveness check.
//! - `catalog`: merged, non-recursive directory listings.
//! - `proxies`: proxy definition management.
//! - `packages`: the `packages/` group view over every source.
//! - `artifacts`: direct GET/HEAD/PUT on any other path (router fallback).

pub mod artifacts;
pub mod catalog;
pub mod health;
pub mod packages;
pub mod proxies;

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use depot_store::StoredObject;
use tokio_util::io::ReaderStream;

use crate::orchestration::ArtifactHead;

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(name, value);
    }
}

fn artifact_headers(head: &ArtifactHead) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(len) = head.content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    insert_header(&mut headers, CONTENT_TYPE, head.content_type.as_deref());
    insert_header(
        &mut headers,
        ETAG,
        head.etag.as_deref().map(|e| e.trim_matches('"')),
    );
    insert_header(&mut headers, LAST_MODIFIED, head.last_modified.as_deref());
    headers
}

/// 200 with metadata headers and no body.
pub(crate) fn head_response(head: &ArtifactHead) -> Response {
    (StatusCode::OK, artifact_headers(head)).into_response()
}

/// 200 streaming the object body.
pub(crate) fn object_response(object: StoredObject) -> Response {
    let headers = artifact_headers(&ArtifactHead::from(&object.meta));
    let body = Body::from_stream(ReaderStream::new(object.body));
    (StatusCode::OK, headers, body).into_response()
}
