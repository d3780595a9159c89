//! # Backend Trait
//!
//! The raw object API Depot needs from a bucket. Keys passed to a backend
//! are full storage keys (root prefix already applied); the [`KeyStore`]
//! owns normalization.
//!
//! Backends must report a missing object as [`StoreError::NotFound`].
//!
//! [`KeyStore`]: crate::KeyStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncSeek};

use crate::error::StoreError;

/// Upload body: must be rewindable so the store can restart it from zero.
pub trait SeekableBody: AsyncRead + AsyncSeek + Send + Sync + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Sync + Unpin> SeekableBody for T {}

/// Streaming object content.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Object metadata as returned by HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Size in bytes.
    pub content_length: u64,
    /// Stored content type, if any.
    pub content_type: Option<String>,
    /// Entity tag, quotes stripped.
    pub etag: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
}

/// An object opened for reading.
pub struct StoredObject {
    /// Object metadata.
    pub meta: ObjectMeta,
    /// Object content.
    pub body: ObjectReader,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// One object row of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    /// Full storage key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
}

/// One page of a list-v2 style listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Common prefixes (only with a delimiter), each ending in the delimiter.
    pub common_prefixes: Vec<String>,
    /// Objects on this page.
    pub objects: Vec<ListedObject>,
    /// Continuation token; `None` when the listing is exhausted.
    pub next_token: Option<String>,
}

/// Raw object operations against a bucket.
#[async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
    /// Open an object for reading.
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Fetch object metadata.
    async fn head(&self, key: &str) -> Result<ObjectMeta, StoreError>;

    /// Upload `length` bytes from `body`, which is positioned at its start.
    async fn put(
        &self,
        key: &str,
        body: Box<dyn SeekableBody>,
        content_type: &str,
        length: u64,
    ) -> Result<(), StoreError>;

    /// Remove an object. Removing an absent object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List one page of keys starting with `prefix`.
    ///
    /// With a delimiter, keys containing the delimiter after the prefix are
    /// rolled up into `common_prefixes`. Each common prefix counts as one
    /// entry against `max_keys`.
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage, StoreError>;
}
