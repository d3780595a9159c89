//! # Proxy Registry
//!
//! CRUD over proxy definitions. Each definition is one JSON record at
//! `__proxycfg__/<name>.json` in the artifact store. There is no in-process
//! cache: every call re-reads the store, so all replicas see a change as
//! soon as the write lands.

use depot_core::{EntryType, ProxyDefinition, ProxyName, RESERVED_PREFIX};
use depot_store::{KeyStore, StoreError};

use crate::error::ProxyError;

/// Upper bound on records read per listing.
const MAX_PROXIES: usize = 1000;

const RECORD_CONTENT_TYPE: &str = "application/json";

/// Store-backed proxy definitions.
#[derive(Debug, Clone)]
pub struct ProxyRegistry {
    store: KeyStore,
}

impl ProxyRegistry {
    /// Registry over the given store.
    pub fn new(store: KeyStore) -> Self {
        Self { store }
    }

    /// All readable definitions in record-key order.
    ///
    /// Records that fail to load, parse, or validate are logged and skipped.
    pub async fn list(&self) -> Result<Vec<ProxyDefinition>, ProxyError> {
        let entries = self.store.list(RESERVED_PREFIX, MAX_PROXIES).await?;
        let mut proxies = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.kind != EntryType::File || !entry.name.ends_with(".json") {
                continue;
            }
            match self.load(&entry.path).await {
                Ok(def) => proxies.push(def),
                Err(err) => {
                    tracing::warn!(key = %entry.path, error = %err, "skipping unreadable proxy record");
                }
            }
        }
        Ok(proxies)
    }

    async fn load(&self, key: &str) -> Result<ProxyDefinition, ProxyError> {
        let bytes = self.store.get_bytes(key).await?;
        let def: ProxyDefinition = serde_json::from_slice(&bytes)?;
        let (_, def) = def.normalized()?;
        Ok(def)
    }

    /// The current definition for `name`, if one is registered.
    ///
    /// Names that could never be registered resolve to `None`, as do
    /// records that cannot be read back.
    pub async fn find(&self, name: &str) -> Result<Option<ProxyDefinition>, ProxyError> {
        let Ok(name) = ProxyName::new(name) else {
            return Ok(None);
        };
        match self.load(&name.record_key()).await {
            Ok(def) => Ok(Some(def)),
            Err(ProxyError::Store(StoreError::NotFound(_))) => Ok(None),
            Err(ProxyError::Store(err)) => Err(ProxyError::Store(err)),
            Err(err) => {
                tracing::warn!(proxy = %name, error = %err, "proxy record is unreadable");
                Ok(None)
            }
        }
    }

    /// Register a proxy, replacing any existing record with the same name.
    pub async fn add(&self, def: &ProxyDefinition) -> Result<ProxyDefinition, ProxyError> {
        let (name, def) = def.normalized()?;
        let record = serde_json::to_vec(&def)?;
        self.store
            .put_bytes(&name.record_key(), record, RECORD_CONTENT_TYPE)
            .await?;
        tracing::info!(proxy = %name, url = %def.url, "proxy registered");
        Ok(def)
    }

    /// Replace the definition stored under `name`. The name in `def` is
    /// ignored.
    pub async fn update(
        &self,
        name: &str,
        def: &ProxyDefinition,
    ) -> Result<ProxyDefinition, ProxyError> {
        self.add(&ProxyDefinition::new(name, def.url.clone())).await
    }

    /// Remove a proxy. Removing an unknown proxy succeeds.
    ///
    /// Checksum sidecars of the record are removed first on a best-effort
    /// basis.
    pub async fn delete(&self, name: &str) -> Result<(), ProxyError> {
        let name = ProxyName::new(name.trim())?;
        let record = name.record_key();
        for sidecar in [format!("{record}.sha1"), format!("{record}.md5")] {
            if let Err(err) = self.store.delete(&sidecar).await {
                tracing::debug!(key = %sidecar, error = %err, "sidecar removal failed");
            }
        }
        match self.store.delete(&record).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        tracing::info!(proxy = %name, "proxy removed");
        Ok(())
    }
}
