//! In-memory [`ObjectBackend`] used as the test double for the store,
//! proxy, integrity, and API crates.
//!
//! Objects live in a `BTreeMap` so that listings come back in key order,
//! matching S3. The map sits behind a `parking_lot::RwLock` that is never
//! held across an `.await`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::io::AsyncReadExt;

use crate::backend::{
    ListPage, ListedObject, ObjectBackend, ObjectMeta, SeekableBody, StoredObject,
};
use crate::error::StoreError;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// Per-operation call counts.
#[derive(Debug, Default)]
pub struct CallCounters {
    /// `get` calls.
    pub get: AtomicUsize,
    /// `head` calls.
    pub head: AtomicUsize,
    /// `put` calls.
    pub put: AtomicUsize,
    /// `delete` calls.
    pub delete: AtomicUsize,
    /// `list_page` calls.
    pub list: AtomicUsize,
}

/// Bucket held in process memory.
#[derive(Debug)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, MemoryObject>>,
    page_size: usize,
    calls: CallCounters,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A listing row before pagination: an object or a rolled-up prefix.
enum Item {
    Object(ListedObject),
    Prefix(String),
}

impl Item {
    fn marker(&self) -> &str {
        match self {
            Item::Object(o) => &o.key,
            Item::Prefix(p) => p,
        }
    }
}

impl MemoryBackend {
    /// Empty bucket with S3's default page size.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            calls: CallCounters::default(),
        }
    }

    /// Cap every listing page at `page_size` entries, regardless of the
    /// `max_keys` requested.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Seed an object directly, bypassing key normalization.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>, content_type: &str) {
        self.objects.write().insert(
            key.to_string(),
            MemoryObject {
                data: data.into(),
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
    }

    /// Whether a storage key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Content of a storage key.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    /// All storage keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Operation counters.
    pub fn calls(&self) -> &CallCounters {
        &self.calls
    }

    fn meta(object: &MemoryObject) -> ObjectMeta {
        ObjectMeta {
            content_length: object.data.len() as u64,
            content_type: Some(object.content_type.clone()),
            etag: None,
            last_modified: Some(object.last_modified),
        }
    }

    fn items(&self, prefix: &str, delimiter: Option<&str>) -> Vec<Item> {
        let objects = self.objects.read();
        let mut items: Vec<Item> = Vec::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            let rolled = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| format!("{prefix}{}", &rest[..idx + d.len()])));
            match rolled {
                Some(common) => {
                    if !matches!(items.last(), Some(Item::Prefix(last)) if *last == common) {
                        items.push(Item::Prefix(common));
                    }
                }
                None => items.push(Item::Object(ListedObject {
                    key: key.clone(),
                    size: object.data.len() as u64,
                })),
            }
        }
        items
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        let object = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(StoredObject {
            meta: Self::meta(&object),
            body: Box::new(std::io::Cursor::new(object.data)),
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, StoreError> {
        self.calls.head.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .get(key)
            .map(Self::meta)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        key: &str,
        mut body: Box<dyn SeekableBody>,
        content_type: &str,
        length: u64,
    ) -> Result<(), StoreError> {
        self.calls.put.fetch_add(1, Ordering::SeqCst);
        let mut data = Vec::with_capacity(length as usize);
        body.read_to_end(&mut data).await?;
        if data.len() as u64 != length {
            return Err(StoreError::upload_failed(
                400,
                &format!("declared length {length}, received {}", data.len()),
            ));
        }
        self.insert(key, data, content_type);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage, StoreError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        let page_size = max_keys.clamp(1, self.page_size);
        let mut remaining = self
            .items(prefix, delimiter)
            .into_iter()
            .filter(|item| continuation.map_or(true, |token| item.marker() > token))
            .peekable();

        let mut page = ListPage::default();
        let mut last_marker = None;
        for item in remaining.by_ref().take(page_size) {
            last_marker = Some(item.marker().to_string());
            match item {
                Item::Object(o) => page.objects.push(o),
                Item::Prefix(p) => page.common_prefixes.push(p),
            }
        }
        if remaining.peek().is_some() {
            page.next_token = last_marker;
        }
        Ok(page)
    }
}
