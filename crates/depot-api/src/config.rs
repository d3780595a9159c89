//! Server configuration.
//!
//! Everything is read from environment variables at startup. Only
//! `S3_BUCKET` is required; a malformed `S3_USE_PATH_STYLE` is fatal, while
//! a malformed `CHECKSUM_SCAN_INTERVAL` only disables the scanner.

use std::time::Duration;

use depot_store::StoreConfig;

use crate::auth::AuthConfig;

const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Log line encoding selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else is text.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Read `LOG_FORMAT`. Used before the rest of the configuration so that
    /// configuration warnings are already formatted correctly.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

/// Complete server configuration.
///
/// Custom `Debug` (via [`StoreConfig`] and [`AuthConfig`]) redacts secrets.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API listener address.
    pub server_addr: String,
    /// Metrics listener address.
    pub metrics_addr: String,
    /// Bucket connection settings and root prefix.
    pub store: StoreConfig,
    /// Basic auth credentials; disabled when both are empty.
    pub auth: AuthConfig,
    /// Checksum scan period; `None` disables the scanner.
    pub scan_interval: Option<Duration>,
    /// Prefix the checksum scanner walks.
    pub scan_prefix: String,
    /// Timeout for every upstream request.
    pub upstream_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            metrics_addr: DEFAULT_METRICS_ADDR.to_string(),
            store: StoreConfig {
                region: DEFAULT_REGION.to_string(),
                ..StoreConfig::default()
            },
            auth: AuthConfig::default(),
            scan_interval: None,
            scan_prefix: String::new(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `SERVER_ADDR` (default: `0.0.0.0:8080`, `:8080` shorthand accepted)
    /// - `METRICS_ADDR` (default: `0.0.0.0:9090`)
    /// - `S3_BUCKET` (required)
    /// - `S3_REGION` (default: `us-east-1`)
    /// - `S3_ENDPOINT`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`
    /// - `S3_USE_PATH_STYLE` (default: `false`)
    /// - `S3_PREFIX` (surrounding slashes trimmed)
    /// - `AUTH_USERNAME`, `AUTH_PASSWORD`
    /// - `CHECKSUM_SCAN_INTERVAL` (e.g. `10m`; unset or zero disables)
    /// - `CHECKSUM_SCAN_PREFIX`
    /// - `UPSTREAM_TIMEOUT_SECS` (default: 60)
    /// - `LOG_FORMAT` (`text` or `json`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bucket = var("S3_BUCKET").ok_or(ConfigError::MissingBucket)?;
        let use_path_style = match var("S3_USE_PATH_STYLE") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidBool {
                var: "S3_USE_PATH_STYLE",
                value: raw,
            })?,
            None => false,
        };

        let store = StoreConfig {
            bucket,
            region: var("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: var("S3_ENDPOINT"),
            access_key: var("S3_ACCESS_KEY"),
            secret_key: var("S3_SECRET_KEY"),
            use_path_style,
            prefix: var("S3_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_default(),
        };

        Ok(Self {
            server_addr: listen_addr(var("SERVER_ADDR"), DEFAULT_SERVER_ADDR),
            metrics_addr: listen_addr(var("METRICS_ADDR"), DEFAULT_METRICS_ADDR),
            store,
            auth: AuthConfig::new(
                var("AUTH_USERNAME").unwrap_or_default(),
                var("AUTH_PASSWORD").unwrap_or_default(),
            ),
            scan_interval: var("CHECKSUM_SCAN_INTERVAL").and_then(|raw| scan_interval(&raw)),
            scan_prefix: var("CHECKSUM_SCAN_PREFIX").unwrap_or_default(),
            upstream_timeout: Duration::from_secs(
                var("UPSTREAM_TIMEOUT_SECS")
                    .and_then(|s| s.trim().parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            ),
        })
    }
}

/// Expand the `:port` shorthand to all interfaces.
fn listen_addr(raw: Option<String>, default: &str) -> String {
    match raw {
        Some(addr) if addr.starts_with(':') => format!("0.0.0.0{addr}"),
        Some(addr) => addr,
        None => default.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn scan_interval(raw: &str) -> Option<Duration> {
    match humantime::parse_duration(raw.trim()) {
        Ok(d) if d.is_zero() => None,
        Ok(d) => Some(d),
        Err(err) => {
            tracing::warn!(value = %raw, error = %err, "invalid CHECKSUM_SCAN_INTERVAL, checksum scanner disabled");
            None
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("S3_BUCKET environment variable is required")]
    MissingBucket,
    #[error("invalid boolean for {var}: {value:?}")]
    InvalidBool { var: &'static str, value: String },
}
