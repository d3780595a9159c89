//! # S3 Backend
//!
//! [`ObjectBackend`] over `aws-sdk-s3`.
//!
//! Reads, heads, deletes, and listings use the SDK directly. Uploads go
//! through a presigned PUT URL sent with `reqwest`, so the body streams
//! from the spool file with an explicit `Content-Length` instead of being
//! buffered for the SDK's checksum computation.
//!
//! S3-compatible services disagree on how a missing object is reported.
//! [`is_not_found`] accepts every shape seen in practice: a typed
//! `NoSuchKey`/`NotFound` error, an error code of `NotFound`, `NoSuchKey`,
//! or `NotFoundException`, a raw HTTP 404, or a message mentioning
//! `NotFound`.
//!
//! Retries are NOT built into the backend.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tokio_util::io::ReaderStream;

use crate::backend::{
    ListPage, ListedObject, ObjectBackend, ObjectMeta, SeekableBody, StoredObject,
};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Lifetime of presigned upload URLs.
const PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);

const NOT_FOUND_CODES: [&str; 3] = ["NotFound", "NoSuchKey", "NotFoundException"];

/// Bucket access through the AWS SDK.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    http: reqwest::Client,
    bucket: String,
}

impl S3Backend {
    /// Build a client from connection settings.
    ///
    /// Static credentials are used when both halves are configured; the
    /// default provider chain otherwise.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.use_path_style)
            .build();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Client::from_conf(s3_config),
            http,
            bucket: config.bucket.clone(),
        })
    }
}

/// Whether an SDK error means the object does not exist.
pub fn is_not_found<E>(err: &SdkError<E, HttpResponse>) -> bool
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    if err
        .raw_response()
        .is_some_and(|raw| raw.status().as_u16() == 404)
    {
        return true;
    }
    if err.code().is_some_and(|code| NOT_FOUND_CODES.contains(&code)) {
        return true;
    }
    if err.message().is_some_and(|m| m.contains("NotFound")) {
        return true;
    }
    DisplayErrorContext(err).to_string().contains("NotFound")
}

fn classify<E>(err: SdkError<E, HttpResponse>, key: &str, op: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    if is_not_found(&err) {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Backend(format!("{op} {key}: {}", DisplayErrorContext(&err)))
    }
}

fn to_chrono(value: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

fn sanitize_etag(etag: Option<&str>) -> Option<String> {
    etag.map(|value| value.trim_matches('"').to_string())
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_key())
                {
                    StoreError::NotFound(key.to_string())
                } else {
                    classify(err, key, "get_object")
                }
            })?;

        let meta = ObjectMeta {
            content_length: output.content_length().unwrap_or_default().max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            etag: sanitize_etag(output.e_tag()),
            last_modified: to_chrono(output.last_modified()),
        };
        Ok(StoredObject {
            meta,
            body: Box::new(output.body.into_async_read()),
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    classify(err, key, "head_object")
                }
            })?;

        Ok(ObjectMeta {
            content_length: output.content_length().unwrap_or_default().max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            etag: sanitize_etag(output.e_tag()),
            last_modified: to_chrono(output.last_modified()),
        })
    }

    async fn put(
        &self,
        key: &str,
        body: Box<dyn SeekableBody>,
        content_type: &str,
        length: u64,
    ) -> Result<(), StoreError> {
        let presign = PresigningConfig::expires_in(PRESIGN_EXPIRY)
            .map_err(|e| StoreError::Backend(format!("invalid presign config: {e}")))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign)
            .await
            .map_err(|e| StoreError::Backend(format!("presign {key}: {}", DisplayErrorContext(&e))))?;

        let mut request = self
            .http
            .put(presigned.uri())
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(body)));
        for (name, value) in presigned.headers() {
            request = request.header(name, value);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("upload {key}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::upload_failed(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(classify(err, key, "delete_object")),
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_delimiter(delimiter.map(str::to_string))
            .set_continuation_token(continuation.map(str::to_string))
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|err| classify(err, prefix, "list_objects_v2"))?;

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let objects = output
            .contents()
            .iter()
            .filter_map(|o| {
                o.key().map(|key| ListedObject {
                    key: key.to_string(),
                    size: o.size().unwrap_or_default().max(0) as u64,
                })
            })
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            common_prefixes,
            objects,
            next_token,
        })
    }
}
