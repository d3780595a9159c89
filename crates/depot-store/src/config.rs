//! Object store connection settings.

/// Connection settings for the S3-compatible bucket.
///
/// Custom `Debug` implementation redacts the secret key.
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// Bucket name.
    pub bucket: String,
    /// Region (e.g. `us-east-1`).
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, Ceph).
    pub endpoint: Option<String>,
    /// Static access key id.
    pub access_key: Option<String>,
    /// Static secret key.
    pub secret_key: Option<String>,
    /// Use path-style addressing instead of virtual-hosted buckets.
    pub use_path_style: bool,
    /// Root prefix for every key, without surrounding slashes.
    pub prefix: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("use_path_style", &self.use_path_style)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl StoreConfig {
    /// Static credentials, when both halves are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(ak), Some(sk)) if !ak.is_empty() && !sk.is_empty() => Some((ak, sk)),
            _ => None,
        }
    }
}
