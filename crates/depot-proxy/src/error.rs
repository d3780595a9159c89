//! Proxy subsystem error types.

use depot_core::ValidationError;
use depot_store::StoreError;

/// Errors from the proxy registry and fetcher.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Bad proxy name, URL, or artifact key.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Upstream answered with a non-success, non-404 status.
    #[error("upstream returned status {code}")]
    UpstreamStatus {
        /// Status code received from the upstream.
        code: u16,
    },

    /// The upstream could not be reached or the body could not be read.
    #[error("upstream request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A proxy record could not be encoded.
    #[error("proxy record encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl ProxyError {
    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            source,
        }
    }

    /// Status code carried by an [`ProxyError::UpstreamStatus`].
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamStatus { code } => Some(*code),
            _ => None,
        }
    }
}
