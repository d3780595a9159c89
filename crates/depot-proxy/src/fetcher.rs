//! # Proxy Fetcher
//!
//! Upstream GET/HEAD and fetch-through caching.
//!
//! A fetched body is streamed once: every chunk goes to a [`Spool`] that
//! writes the temporary file and feeds SHA-1/MD5 at the same time. The
//! spooled file is then stored under the proxy-qualified key and, unless
//! the artifact is itself a checksum file, both sidecars are written from
//! the digests just computed.
//!
//! ## Multi-proxy fallback
//!
//! [`ProxyFetcher::fetch_from_any`] and [`ProxyFetcher::head_from_any`] walk
//! the proxies in registry order. A miss (404) moves on to the next proxy;
//! 401 and 403 move on as well and are remembered. Any other failure aborts
//! the walk. When no proxy succeeds the last remembered 401/403 is returned,
//! even if later proxies only missed; otherwise the result is plain
//! "not found".

use std::time::Duration;

use depot_core::{clean_path, has_checksum_suffix, ArtifactKey, Entry, ProxyDefinition};
use depot_store::{KeyStore, Spool};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Response, StatusCode};

use crate::error::ProxyError;
use crate::listing::parse_index;
use crate::registry::ProxyRegistry;

/// Default upstream request timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default number of entries taken from an index page.
const DEFAULT_LISTING_LIMIT: usize = 100;

/// Result of a fetch-through attempt on a proxy-qualified key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The artifact was fetched and stored under this key.
    Cached(ArtifactKey),
    /// The upstream does not have it, or the key names no artifact.
    NotFound,
    /// The first key segment is not a registered proxy.
    NotHandled,
}

/// Metadata from an upstream HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamHead {
    /// Name of the proxy that answered.
    pub proxy: String,
    /// `Content-Length`, when sent.
    pub content_length: Option<u64>,
    /// `Content-Type`, when sent.
    pub content_type: Option<String>,
    /// `ETag`, when sent.
    pub etag: Option<String>,
    /// `Last-Modified`, verbatim.
    pub last_modified: Option<String>,
}

/// Denials after which the fallback walk moves on and remembers the code.
fn is_denial(code: u16) -> bool {
    matches!(code, 401 | 403)
}

/// Upstream client bound to the registry and the cache store.
#[derive(Debug, Clone)]
pub struct ProxyFetcher {
    http: reqwest::Client,
    registry: ProxyRegistry,
    store: KeyStore,
}

impl ProxyFetcher {
    /// Build a fetcher whose upstream requests time out after `timeout`.
    pub fn new(
        registry: ProxyRegistry,
        store: KeyStore,
        timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::Client(e.to_string()))?;
        Ok(Self {
            http,
            registry,
            store,
        })
    }

    /// The registry this fetcher resolves proxy names against.
    pub fn registry(&self) -> &ProxyRegistry {
        &self.registry
    }

    /// Split a proxy-qualified key and look up the proxy.
    ///
    /// `Ok(None)` when the proxy is unknown; the artifact path is `None`
    /// when the key has a single segment.
    async fn resolve<'k>(
        &self,
        key: &'k ArtifactKey,
    ) -> Result<Option<(ProxyDefinition, Option<&'k str>)>, ProxyError> {
        let (name, rest) = match key.split_first() {
            Some((name, rest)) => (name, Some(rest)),
            None => (key.as_str(), None),
        };
        Ok(self.registry.find(name).await?.map(|def| (def, rest)))
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Response, ProxyError> {
        request
            .send()
            .await
            .map_err(|e| ProxyError::transport(url, e))
    }

    /// Fetch `<proxy>/<path>` from the proxy's upstream and cache it under
    /// the same key.
    pub async fn fetch_and_cache(&self, raw_key: &str) -> Result<FetchOutcome, ProxyError> {
        let key = ArtifactKey::parse(raw_key)?;
        let Some((def, rest)) = self.resolve(&key).await? else {
            return Ok(FetchOutcome::NotHandled);
        };
        let Some(artifact_path) = rest else {
            return Ok(FetchOutcome::NotFound);
        };
        self.cache_from(&def, artifact_path, &key).await
    }

    async fn cache_from(
        &self,
        def: &ProxyDefinition,
        artifact_path: &str,
        cache_key: &ArtifactKey,
    ) -> Result<FetchOutcome, ProxyError> {
        let url = def.upstream_url(artifact_path);
        let mut resp = self.send(self.http.get(&url), &url).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(proxy = %def.name, url = %url, "upstream miss");
            return Ok(FetchOutcome::NotFound);
        }
        if status.as_u16() >= 300 {
            return Err(ProxyError::UpstreamStatus {
                code: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let mut spool = Spool::new().await?;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| ProxyError::transport(&url, e))?
        {
            spool.write(&chunk).await?;
        }
        let body = spool.finish().await?;

        self.store
            .put(cache_key.as_str(), Box::new(body.file), &content_type, body.len)
            .await?;
        if !has_checksum_suffix(artifact_path) {
            self.store.write_checksums(cache_key, &body.checksums).await?;
        }
        tracing::info!(
            proxy = %def.name,
            key = %cache_key,
            bytes = body.len,
            "cached upstream artifact"
        );
        Ok(FetchOutcome::Cached(cache_key.clone()))
    }

    /// Try every proxy in registry order and cache the first hit.
    ///
    /// Returns the proxy-qualified key of the cached copy, `Ok(None)` when
    /// nobody has it, or the last 401/403 seen.
    pub async fn fetch_from_any(
        &self,
        artifact_path: &str,
    ) -> Result<Option<ArtifactKey>, ProxyError> {
        let path = ArtifactKey::parse(artifact_path)?;
        let mut last_status: Option<u16> = None;

        for def in self.registry.list().await? {
            let cache_key = ArtifactKey::parse(&format!("{}/{}", def.name, path))?;
            match self.cache_from(&def, path.as_str(), &cache_key).await {
                Ok(FetchOutcome::Cached(key)) => return Ok(Some(key)),
                Ok(_) => {}
                Err(ProxyError::UpstreamStatus { code }) if is_denial(code) => {
                    tracing::debug!(proxy = %def.name, path = %path, code, "proxy declined");
                    last_status = Some(code);
                }
                Err(err) => return Err(err),
            }
        }
        Self::exhausted(last_status).map(|()| None)
    }

    fn exhausted(last_status: Option<u16>) -> Result<(), ProxyError> {
        match last_status {
            Some(code) => Err(ProxyError::UpstreamStatus { code }),
            None => Ok(()),
        }
    }

    async fn head_upstream(
        &self,
        def: &ProxyDefinition,
        artifact_path: &str,
    ) -> Result<Option<UpstreamHead>, ProxyError> {
        let url = def.upstream_url(artifact_path);
        let resp = self.send(self.http.head(&url), &url).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.as_u16() >= 300 {
            return Err(ProxyError::UpstreamStatus {
                code: status.as_u16(),
            });
        }
        let header = |name: reqwest::header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Ok(Some(UpstreamHead {
            proxy: def.name.clone(),
            content_length: header(CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            content_type: header(CONTENT_TYPE),
            etag: header(ETAG),
            last_modified: header(LAST_MODIFIED),
        }))
    }

    /// Upstream HEAD for a proxy-qualified key. Unknown proxies and
    /// single-segment keys resolve to `Ok(None)`.
    pub async fn head(&self, raw_key: &str) -> Result<Option<UpstreamHead>, ProxyError> {
        let key = ArtifactKey::parse(raw_key)?;
        match self.resolve(&key).await? {
            Some((def, Some(path))) => self.head_upstream(&def, path).await,
            _ => Ok(None),
        }
    }

    /// Upstream HEAD across every proxy with the same fallback rules as
    /// [`ProxyFetcher::fetch_from_any`]. Nothing is cached.
    pub async fn head_from_any(
        &self,
        artifact_path: &str,
    ) -> Result<Option<UpstreamHead>, ProxyError> {
        let path = ArtifactKey::parse(artifact_path)?;
        let mut last_status: Option<u16> = None;

        for def in self.registry.list().await? {
            match self.head_upstream(&def, path.as_str()).await {
                Ok(Some(head)) => return Ok(Some(head)),
                Ok(None) => {}
                Err(ProxyError::UpstreamStatus { code }) if is_denial(code) => {
                    last_status = Some(code);
                }
                Err(err) => return Err(err),
            }
        }
        Self::exhausted(last_status).map(|()| None)
    }

    /// Directory listing of `<proxy>/<path>` synthesized from the upstream
    /// index page.
    ///
    /// `Ok(None)` when the first segment is not a registered proxy. An
    /// upstream 404 is an empty listing. Entry paths are proxy-qualified.
    pub async fn list_path(
        &self,
        raw_prefix: &str,
        limit: usize,
    ) -> Result<Option<Vec<Entry>>, ProxyError> {
        let cleaned = clean_path(raw_prefix);
        if cleaned.is_empty() {
            return Ok(None);
        }
        let (name, rest) = cleaned.split_once('/').unwrap_or((cleaned.as_str(), ""));
        let Some(def) = self.registry.find(name).await? else {
            return Ok(None);
        };

        let url = if rest.is_empty() {
            format!("{}/", def.base_url())
        } else {
            format!("{}/", def.upstream_url(rest))
        };
        let resp = self.send(self.http.get(&url), &url).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Some(Vec::new()));
        }
        if status.as_u16() >= 300 {
            return Err(ProxyError::UpstreamStatus {
                code: status.as_u16(),
            });
        }
        let html = resp
            .text()
            .await
            .map_err(|e| ProxyError::transport(&url, e))?;

        let limit = if limit == 0 { DEFAULT_LISTING_LIMIT } else { limit };
        let entries = parse_index(&html, limit)
            .into_iter()
            .map(|link| {
                let path = format!("{cleaned}/{}", link.name);
                if link.is_dir {
                    Entry::dir(link.name, path)
                } else {
                    Entry::file(link.name, path, None)
                }
            })
            .collect();
        Ok(Some(entries))
    }
}
