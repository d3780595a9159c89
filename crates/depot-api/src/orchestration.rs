//! # Resolution
//!
//! Merges the three artifact sources behind one set of operations:
//! local storage, cached copies of proxied artifacts (stored under
//! `<proxy>/<path>`), and the live upstream repositories.
//!
//! ## Catalog
//!
//! A plain catalog lists one local directory. When the path names a
//! registered proxy the upstream index is merged in front of the local
//! entries and wins on name collisions. The root additionally carries the
//! `packages/` group and one entry per proxy.
//!
//! ## Packages view
//!
//! `packages/<path>` fans a listing out over local storage and every proxy
//! under one shared entry budget, and resolves point requests in this
//! order:
//!
//! ```text
//! local key → <top-level dir>/<key> → <proxy>/<key> (cache) → upstream fetch
//! ```
//!
//! Only not-found moves on to the next source. An upstream status is
//! returned as-is; any other store failure ends the resolution.
//!
//! Nothing under the reserved `__proxycfg__/` namespace is ever listed or
//! served.

use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use depot_core::{
    clean_path, has_checksum_suffix, is_reserved, join_path, ArtifactKey, Checksums, Entry,
    EntryType, ValidationError,
};
use depot_proxy::{FetchOutcome, ProxyError, ProxyFetcher, ProxyRegistry, UpstreamHead};
use depot_store::{KeyStore, ObjectMeta, Spool, StoreError, StoredObject, DEFAULT_LIST_LIMIT};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Name of the synthetic group directory.
pub const PACKAGES: &str = "packages";

/// How many top-level directories are checked as implicit roots.
const ROOT_SCAN_LIMIT: usize = 1000;

/// Errors from resolution and catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No source has the artifact.
    #[error("not found: {0}")]
    NotFound(String),

    /// Writes into the reserved namespace are refused.
    #[error("reserved path: {0}")]
    Reserved(String),

    /// The request path or body is unusable.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body ended before the declared length.
    #[error("body ended after {received} of {expected} bytes")]
    IncompleteBody { received: u64, expected: u64 },

    /// An upstream answered with this status.
    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    /// The store failed for a reason other than a missing object.
    #[error(transparent)]
    Store(StoreError),

    /// The proxy layer failed for a reason other than an upstream status.
    #[error(transparent)]
    Proxy(ProxyError),
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::InvalidKey(e) => Self::Validation(e),
            other => Self::Store(other),
        }
    }
}

impl From<ProxyError> for ResolveError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Validation(e) => Self::Validation(e),
            ProxyError::UpstreamStatus { code } => Self::UpstreamStatus(code),
            ProxyError::Store(e) => e.into(),
            other => Self::Proxy(other),
        }
    }
}

/// Response headers for a HEAD, from whichever source answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactHead {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// HTTP-date.
    pub last_modified: Option<String>,
}

/// Format a timestamp as an RFC 7231 HTTP-date.
pub fn http_date(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

impl From<&ObjectMeta> for ArtifactHead {
    fn from(meta: &ObjectMeta) -> Self {
        Self {
            content_length: Some(meta.content_length),
            content_type: meta.content_type.clone(),
            etag: meta.etag.clone(),
            last_modified: meta.last_modified.as_ref().map(http_date),
        }
    }
}

impl From<UpstreamHead> for ArtifactHead {
    fn from(head: UpstreamHead) -> Self {
        Self {
            content_length: head.content_length,
            content_type: head.content_type,
            etag: head.etag,
            last_modified: head.last_modified,
        }
    }
}

/// Not-found becomes `None`; every other failure is kept.
fn found<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Split `packages[/rest]` into its remainder.
fn packages_remainder(cleaned: &str) -> Option<&str> {
    if cleaned == PACKAGES {
        return Some("");
    }
    cleaned
        .strip_prefix(PACKAGES)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// Entries gathered under a shared budget, unique by name.
struct Budgeted {
    entries: Vec<Entry>,
    seen: HashSet<String>,
    remaining: usize,
}

impl Budgeted {
    fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
            remaining: limit,
        }
    }

    fn exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Add an entry rewritten to `path`. Returns `true` once the budget is
    /// spent.
    fn add(&mut self, mut entry: Entry, path: String) -> bool {
        entry.path = path;
        entry.normalize_slashes();
        if self.seen.insert(entry.name.clone()) {
            self.entries.push(entry);
            self.remaining -= 1;
        }
        self.exhausted()
    }
}

/// Merge/precedence logic over the store, the registry, and the fetcher.
#[derive(Debug, Clone)]
pub struct Resolver {
    store: KeyStore,
    registry: ProxyRegistry,
    fetcher: ProxyFetcher,
}

impl Resolver {
    pub fn new(store: KeyStore, fetcher: ProxyFetcher) -> Self {
        Self {
            store,
            registry: fetcher.registry().clone(),
            fetcher,
        }
    }

    /// The underlying proxy registry.
    pub fn registry(&self) -> &ProxyRegistry {
        &self.registry
    }

    // -- Catalog ------------------------------------------------------------

    /// Non-recursive merged listing of `path`.
    pub async fn catalog(&self, path: &str, limit: usize) -> Result<Vec<Entry>, ResolveError> {
        let cleaned = clean_path(path);
        if let Some(remainder) = packages_remainder(&cleaned) {
            return self.list_packages(remainder, limit).await;
        }

        let local = self.store.list(&cleaned, limit).await?;
        let mut entries = if cleaned.is_empty() {
            local
        } else {
            match self.fetcher.list_path(&cleaned, limit).await {
                Ok(Some(remote)) => {
                    let names: HashSet<String> = remote.iter().map(|e| e.name.clone()).collect();
                    let mut merged = remote;
                    merged.extend(local.into_iter().filter(|e| !names.contains(&e.name)));
                    merged
                }
                Ok(None) => local,
                Err(err) => {
                    tracing::warn!(path = %cleaned, error = %err, "remote listing failed");
                    local
                }
            }
        };
        entries.retain(|e| !is_reserved(&e.path));

        if cleaned.is_empty() {
            entries.push(Entry::group(PACKAGES));
            match self.registry.list().await {
                Ok(proxies) => entries.extend(proxies.iter().map(|p| Entry::proxy(&p.name))),
                Err(err) => tracing::warn!(error = %err, "proxy list for root catalog failed"),
            }
        }
        Ok(entries)
    }

    /// Listing of `packages/<remainder>`: local entries first, then each
    /// proxy's upstream listing, sharing one budget of `limit` entries.
    pub async fn list_packages(
        &self,
        remainder: &str,
        limit: usize,
    ) -> Result<Vec<Entry>, ResolveError> {
        let remainder = clean_path(remainder);
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
        let mut out = Budgeted::new(limit);

        match self.store.list(&remainder, out.remaining).await {
            Ok(local) => {
                for entry in local {
                    if is_reserved(&entry.path) || is_reserved(&entry.name) {
                        continue;
                    }
                    let path = join_path(PACKAGES, &entry.path);
                    if out.add(entry, path) {
                        return Ok(out.entries);
                    }
                }
            }
            Err(err) => tracing::warn!(path = %remainder, error = %err, "local packages listing failed"),
        }

        for def in self.registry.list().await? {
            let prefix = join_path(&def.name, &remainder);
            let remote = match self.fetcher.list_path(&prefix, out.remaining).await {
                Ok(Some(remote)) => remote,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(proxy = %def.name, path = %remainder, error = %err, "proxy packages listing failed");
                    continue;
                }
            };
            for entry in remote {
                if is_reserved(&entry.name) {
                    continue;
                }
                let path = join_path(PACKAGES, &entry.path);
                if out.add(entry, path) {
                    return Ok(out.entries);
                }
            }
        }
        Ok(out.entries)
    }

    // -- Point resolution ---------------------------------------------------

    /// Key for a read. Reserved keys read as missing.
    fn readable_key(raw: &str) -> Result<ArtifactKey, ResolveError> {
        let key = ArtifactKey::parse(raw).map_err(|_| ResolveError::NotFound(raw.to_string()))?;
        if is_reserved(key.as_str()) {
            return Err(ResolveError::NotFound(raw.to_string()));
        }
        Ok(key)
    }

    /// Top-level local directories, reserved namespace excluded.
    async fn implicit_roots(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .list("", ROOT_SCAN_LIMIT)
            .await?
            .into_iter()
            .filter(|e| e.kind == EntryType::Dir && !is_reserved(&e.path))
            .map(|e| e.name.trim_end_matches('/').to_string())
            .collect())
    }

    /// Run `op` against `key`, then against `<root>/<key>` for every
    /// implicit root, then against `<proxy>/<key>` for every proxy.
    async fn lookup<T, F, Fut>(&self, key: &ArtifactKey, op: F) -> Result<Option<T>, ResolveError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if let Some(hit) = found(op(key.to_string()).await)? {
            return Ok(Some(hit));
        }
        for root in self.implicit_roots().await? {
            if let Some(hit) = found(op(join_path(&root, key.as_str())).await)? {
                tracing::debug!(key = %key, root = %root, "resolved under implicit root");
                return Ok(Some(hit));
            }
        }
        for def in self.registry.list().await? {
            if let Some(hit) = found(op(join_path(&def.name, key.as_str())).await)? {
                tracing::debug!(key = %key, proxy = %def.name, "resolved from proxy cache");
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    /// GET under `packages/`.
    pub async fn resolve_package_get(&self, path: &str) -> Result<StoredObject, ResolveError> {
        let key = Self::readable_key(path)?;
        let store = &self.store;
        if let Some(object) = self.lookup(&key, |k| async move { store.get(&k).await }).await? {
            return Ok(object);
        }
        match self.fetcher.fetch_from_any(key.as_str()).await? {
            Some(cached) => Ok(self.store.get(cached.as_str()).await?),
            None => Err(ResolveError::NotFound(key.into_string())),
        }
    }

    /// HEAD under `packages/`. Upstream metadata is not cached.
    pub async fn resolve_package_head(&self, path: &str) -> Result<ArtifactHead, ResolveError> {
        let key = Self::readable_key(path)?;
        let store = &self.store;
        if let Some(meta) = self.lookup(&key, |k| async move { store.head(&k).await }).await? {
            return Ok(ArtifactHead::from(&meta));
        }
        match self.fetcher.head_from_any(key.as_str()).await? {
            Some(head) => Ok(head.into()),
            None => Err(ResolveError::NotFound(key.into_string())),
        }
    }

    /// Direct GET: local, else fetch through the proxy named by the first
    /// segment.
    pub async fn get_artifact(&self, raw: &str) -> Result<StoredObject, ResolveError> {
        let key = Self::readable_key(raw)?;
        if let Some(object) = found(self.store.get(key.as_str()).await)? {
            return Ok(object);
        }
        match self.fetcher.fetch_and_cache(key.as_str()).await? {
            FetchOutcome::Cached(cached) => Ok(self.store.get(cached.as_str()).await?),
            FetchOutcome::NotFound | FetchOutcome::NotHandled => {
                Err(ResolveError::NotFound(key.into_string()))
            }
        }
    }

    /// Direct HEAD: local, else an upstream HEAD through the proxy named by
    /// the first segment.
    pub async fn head_artifact(&self, raw: &str) -> Result<ArtifactHead, ResolveError> {
        let key = Self::readable_key(raw)?;
        if let Some(meta) = found(self.store.head(key.as_str()).await)? {
            return Ok(ArtifactHead::from(&meta));
        }
        match self.fetcher.head(key.as_str()).await? {
            Some(head) => Ok(head.into()),
            None => Err(ResolveError::NotFound(key.into_string())),
        }
    }

    // -- Upload -------------------------------------------------------------

    /// Store exactly `length` bytes from `body` under `raw`, then write both
    /// checksum sidecars. Checksum files get no sidecars of their own.
    pub async fn upload<R>(
        &self,
        raw: &str,
        body: R,
        content_type: &str,
        length: u64,
    ) -> Result<Checksums, ResolveError>
    where
        R: AsyncRead + Unpin,
    {
        let key = ArtifactKey::parse(raw)?;
        if is_reserved(key.as_str()) {
            return Err(ResolveError::Reserved(key.into_string()));
        }

        let mut spool = Spool::new().await?;
        let mut limited = body.take(length);
        let received = spool.copy_from(&mut limited).await?;
        if received != length {
            return Err(ResolveError::IncompleteBody {
                received,
                expected: length,
            });
        }
        let spooled = spool.finish().await?;

        self.store
            .put(key.as_str(), Box::new(spooled.file), content_type, spooled.len)
            .await?;
        if !has_checksum_suffix(key.as_str()) {
            self.store.write_checksums(&key, &spooled.checksums).await?;
        }
        tracing::info!(key = %key, bytes = spooled.len, "artifact uploaded");
        Ok(spooled.checksums)
    }
}
