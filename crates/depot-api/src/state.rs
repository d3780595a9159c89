//! Shared application state.
//!
//! Every component here is a cheap handle over the same object store. No
//! request data is cached in process: all replicas read the bucket.

use std::sync::Arc;

use depot_integrity::ChecksumIntegrity;
use depot_proxy::{ProxyError, ProxyFetcher, ProxyRegistry};
use depot_store::{KeyStore, ObjectBackend};

use crate::auth::AuthConfig;
use crate::config::AppConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::orchestration::Resolver;

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: KeyStore,
    pub registry: ProxyRegistry,
    pub resolver: Resolver,
    pub auth: AuthConfig,
    pub metrics: ApiMetrics,
}

impl AppState {
    /// Wire the store, registry, fetcher, and resolver over `backend`.
    pub fn new(backend: Arc<dyn ObjectBackend>, config: &AppConfig) -> Result<Self, ProxyError> {
        let store = KeyStore::new(backend, &config.store.prefix);
        let registry = ProxyRegistry::new(store.clone());
        let fetcher = ProxyFetcher::new(registry.clone(), store.clone(), config.upstream_timeout)?;
        Ok(Self {
            resolver: Resolver::new(store.clone(), fetcher),
            registry,
            store,
            auth: config.auth.clone(),
            metrics: ApiMetrics::new(),
        })
    }

    /// Checksum scanner over this state's store.
    pub fn checksum_integrity(&self, prefix: &str) -> ChecksumIntegrity {
        ChecksumIntegrity::new(self.store.clone(), prefix)
    }
}
