//! # KeyStore
//!
//! Logical artifact storage over an [`ObjectBackend`].
//!
//! Every raw path is normalized through [`ArtifactKey::parse`] before it
//! reaches the backend and is then joined with the configured root prefix.
//! Listings are emulated over the flat key space with a `/` delimiter and
//! follow continuation tokens until the requested number of entries has been
//! gathered.

use std::io::{Cursor, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use depot_core::{clean_path, ArtifactKey, Checksums, Entry};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::backend::{ObjectBackend, ObjectMeta, SeekableBody, StoredObject};
use crate::error::StoreError;

/// Listing size used when the caller passes zero.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Keys requested from the backend per page during scans.
const SCAN_PAGE_SIZE: usize = 1000;

/// Largest page the backend is asked for.
const MAX_PAGE_SIZE: usize = 1000;

const CHECKSUM_CONTENT_TYPE: &str = "text/plain";

/// One page of a recursive key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Logical keys (root prefix removed).
    pub keys: Vec<String>,
    /// Token for the next page, `None` when exhausted.
    pub next: Option<String>,
}

/// Artifact storage rooted at an optional key prefix.
#[derive(Clone)]
pub struct KeyStore {
    backend: Arc<dyn ObjectBackend>,
    root: String,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Create a store. Surrounding slashes on `root_prefix` are ignored.
    pub fn new(backend: Arc<dyn ObjectBackend>, root_prefix: &str) -> Self {
        Self {
            backend,
            root: clean_path(root_prefix),
        }
    }

    fn storage_key(&self, key: &ArtifactKey) -> String {
        if self.root.is_empty() {
            key.as_str().to_string()
        } else {
            format!("{}/{}", self.root, key)
        }
    }

    /// Storage prefix for a logical directory; ends in `/` unless it is the
    /// bucket root.
    fn storage_dir(&self, logical: &str) -> String {
        let logical = clean_path(logical);
        match (self.root.is_empty(), logical.is_empty()) {
            (true, true) => String::new(),
            (true, false) => format!("{logical}/"),
            (false, true) => format!("{}/", self.root),
            (false, false) => format!("{}/{logical}/", self.root),
        }
    }

    fn logical<'a>(&self, storage_key: &'a str) -> &'a str {
        if self.root.is_empty() {
            return storage_key;
        }
        storage_key
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(storage_key)
    }

    /// Open an object.
    pub async fn get(&self, raw: &str) -> Result<StoredObject, StoreError> {
        let key = ArtifactKey::parse(raw)?;
        self.backend.get(&self.storage_key(&key)).await
    }

    /// Read an object fully into memory. Only for small records.
    pub async fn get_bytes(&self, raw: &str) -> Result<Vec<u8>, StoreError> {
        let mut object = self.get(raw).await?;
        let mut buf = Vec::with_capacity(object.meta.content_length as usize);
        object.body.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Fetch object metadata.
    pub async fn head(&self, raw: &str) -> Result<ObjectMeta, StoreError> {
        let key = ArtifactKey::parse(raw)?;
        self.backend.head(&self.storage_key(&key)).await
    }

    /// Whether an object exists. Errors other than not-found propagate.
    pub async fn exists(&self, raw: &str) -> Result<bool, StoreError> {
        match self.head(raw).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Upload `length` bytes. The body is rewound to its start first.
    pub async fn put(
        &self,
        raw: &str,
        mut body: Box<dyn SeekableBody>,
        content_type: &str,
        length: u64,
    ) -> Result<(), StoreError> {
        let key = ArtifactKey::parse(raw)?;
        body.seek(SeekFrom::Start(0)).await?;
        self.backend
            .put(&self.storage_key(&key), body, content_type, length)
            .await
    }

    /// Upload a small in-memory object.
    pub async fn put_bytes(
        &self,
        raw: &str,
        data: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let data: Bytes = data.into();
        let length = data.len() as u64;
        self.put(raw, Box::new(Cursor::new(data)), content_type, length)
            .await
    }

    /// Remove an object.
    pub async fn delete(&self, raw: &str) -> Result<(), StoreError> {
        let key = ArtifactKey::parse(raw)?;
        self.backend.delete(&self.storage_key(&key)).await
    }

    /// Write both checksum sidecars for `key`.
    pub async fn write_checksums(
        &self,
        key: &ArtifactKey,
        sums: &Checksums,
    ) -> Result<(), StoreError> {
        self.put_bytes(
            key.sha1_sidecar().as_str(),
            sums.sha1.clone(),
            CHECKSUM_CONTENT_TYPE,
        )
        .await?;
        self.put_bytes(
            key.md5_sidecar().as_str(),
            sums.md5.clone(),
            CHECKSUM_CONTENT_TYPE,
        )
        .await
    }

    /// Write a single sidecar holding `digest`.
    pub async fn write_sidecar(&self, sidecar: &ArtifactKey, digest: &str) -> Result<(), StoreError> {
        self.put_bytes(sidecar.as_str(), digest.to_string(), CHECKSUM_CONTENT_TYPE)
            .await
    }

    /// Non-recursive listing of a logical directory.
    ///
    /// Sub-directories come back as `dir` entries, objects as `file` entries
    /// with their size. The object whose key equals the directory prefix
    /// itself is skipped. At most `limit` entries are returned; a zero
    /// limit means [`DEFAULT_LIST_LIMIT`].
    pub async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<Entry>, StoreError> {
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
        let dir = self.storage_dir(prefix);
        let mut entries = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let want = (limit - entries.len()).min(MAX_PAGE_SIZE);
            let page = self
                .backend
                .list_page(&dir, Some("/"), token.as_deref(), want)
                .await?;

            for common in &page.common_prefixes {
                let path = self.logical(common);
                let name = path
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                entries.push(Entry::dir(name, path));
            }
            for object in &page.objects {
                if object.key == dir {
                    continue;
                }
                let path = self.logical(&object.key);
                let name = path.rsplit('/').next().unwrap_or(path);
                if name.is_empty() {
                    continue;
                }
                entries.push(Entry::file(name, path, Some(object.size)));
            }

            match page.next_token {
                Some(next) if entries.len() < limit => token = Some(next),
                _ => break,
            }
        }

        entries.truncate(limit);
        Ok(entries)
    }

    /// One page of a recursive scan under `prefix`.
    pub async fn scan(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ScanPage, StoreError> {
        let cleaned = clean_path(prefix);
        let storage_prefix = match (self.root.is_empty(), cleaned.is_empty()) {
            (true, _) => cleaned,
            (false, true) => format!("{}/", self.root),
            (false, false) => format!("{}/{cleaned}", self.root),
        };
        let page = self
            .backend
            .list_page(&storage_prefix, None, continuation, SCAN_PAGE_SIZE)
            .await?;
        Ok(ScanPage {
            keys: page
                .objects
                .iter()
                .map(|o| self.logical(&o.key).to_string())
                .collect(),
            next: page.next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use depot_core::EntryType;
    use std::sync::atomic::Ordering;

    fn store(backend: &Arc<MemoryBackend>, root: &str) -> KeyStore {
        KeyStore::new(backend.clone(), root)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_under_root() {
        let backend = Arc::new(MemoryBackend::new());
        let ks = store(&backend, "/mirror/");
        ks.put_bytes("/com/acme/a.jar", "payload", "application/java-archive")
            .await
            .unwrap();
        assert!(backend.contains("mirror/com/acme/a.jar"));
        assert_eq!(ks.get_bytes("com/acme/a.jar").await.unwrap(), b"payload");
        let meta = ks.head("com/acme/a.jar").await.unwrap();
        assert_eq!(meta.content_length, 7);
        assert_eq!(meta.content_type.as_deref(), Some("application/java-archive"));
    }

    #[tokio::test]
    async fn traversal_stays_under_root() {
        let backend = Arc::new(MemoryBackend::new());
        let ks = store(&backend, "mirror");
        ks.put_bytes("../../escape.txt", "x", "text/plain").await.unwrap();
        assert_eq!(backend.keys(), vec!["mirror/escape.txt".to_string()]);
    }

    #[tokio::test]
    async fn empty_and_degenerate_keys_never_reach_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let ks = store(&backend, "");
        assert!(matches!(ks.get("").await, Err(StoreError::InvalidKey(_))));
        assert!(matches!(ks.head("/").await, Err(StoreError::InvalidKey(_))));
        assert!(matches!(ks.delete("a/..").await, Err(StoreError::InvalidKey(_))));
        let calls = backend.calls();
        assert_eq!(calls.get.load(Ordering::SeqCst), 0);
        assert_eq!(calls.head.load(Ordering::SeqCst), 0);
        assert_eq!(calls.delete.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let backend = Arc::new(MemoryBackend::new());
        let ks = store(&backend, "");
        assert!(ks.get("nope").await.unwrap_err().is_not_found());
        assert!(!ks.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn put_rewinds_body() {
        let backend = Arc::new(MemoryBackend::new());
        let ks = store(&backend, "");
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        cursor.set_position(4);
        ks.put("k", Box::new(cursor), "text/plain", 6).await.unwrap();
        assert_eq!(backend.object("k").unwrap().as_ref(), b"abcdef");
    }

    #[tokio::test]
    async fn list_emulates_directories() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("com/", "", "application/x-directory");
        backend.insert("com/acme/a.jar", "aaa", "application/java-archive");
        backend.insert("com/acme/b.jar", "bb", "application/java-archive");
        backend.insert("com/top.pom", "p", "text/xml");
        let ks = store(&backend, "");

        let entries = ks.list("com", 0).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Entry::dir("acme", "com/acme"));
        assert_eq!(entries[1].kind, EntryType::File);
        assert_eq!(entries[1].path, "com/top.pom");
        assert_eq!(entries[1].size, Some(1));
    }

    #[tokio::test]
    async fn list_follows_pages_and_caps_at_limit() {
        let backend = Arc::new(MemoryBackend::new().with_page_size(2));
        for i in 0..7 {
            backend.insert(&format!("r/f{i}"), "x", "text/plain");
        }
        let ks = store(&backend, "");
        let entries = ks.list("r/", 5).await.unwrap();
        assert_eq!(entries.len(), 5);
        assert!(backend.calls().list.load(Ordering::SeqCst) >= 3);

        let all = ks.list("r", 100).await.unwrap();
        assert_eq!(all.len(), 7);
    }

    #[tokio::test]
    async fn list_root_strips_root_prefix() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("mirror/com/a.jar", "x", "text/plain");
        backend.insert("mirror/top.txt", "x", "text/plain");
        let ks = store(&backend, "mirror");
        let entries = ks.list("", 0).await.unwrap();
        assert_eq!(entries[0], Entry::dir("com", "com"));
        assert_eq!(entries[1].path, "top.txt");
    }

    #[tokio::test]
    async fn scan_pages_through_recursive_keys() {
        let backend = Arc::new(MemoryBackend::new().with_page_size(2));
        backend.insert("root/a/1", "x", "text/plain");
        backend.insert("root/a/b/2", "x", "text/plain");
        backend.insert("root/c", "x", "text/plain");
        let ks = store(&backend, "root");
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = ks.scan("", token.as_deref()).await.unwrap();
            keys.extend(page.keys);
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(keys, vec!["a/1", "a/b/2", "c"]);
    }

    #[tokio::test]
    async fn write_checksums_creates_text_sidecars() {
        let backend = Arc::new(MemoryBackend::new());
        let ks = store(&backend, "");
        let key = ArtifactKey::parse("a.jar").unwrap();
        let sums = Checksums::of(b"abc");
        ks.write_checksums(&key, &sums).await.unwrap();
        assert_eq!(
            backend.object("a.jar.sha1").unwrap().as_ref(),
            sums.sha1.as_bytes()
        );
        let meta = ks.head("a.jar.md5").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
    }
}
