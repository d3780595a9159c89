//! # depot-proxy: Upstream Repositories
//!
//! A proxy is a named upstream Maven-style repository. This crate keeps the
//! set of proxies ([`ProxyRegistry`]), pulls artifacts from them into the
//! local store ([`ProxyFetcher`]), and turns their HTML index pages into
//! catalog entries ([`listing`]).
//!
//! Proxy-qualified keys have the form `<proxy>/<artifact path>`; the cached
//! copy of an artifact lives under exactly that key.
//!
//! ## Failure model
//!
//! Upstream 404 is never an error: it is reported as "not found" so that
//! callers can fall back to the next source. Every other non-success status
//! is preserved as [`ProxyError::UpstreamStatus`] and eventually becomes the
//! client-facing status code. Upstream calls carry a client-side timeout and
//! are not retried.

pub mod error;
pub mod fetcher;
pub mod listing;
pub mod registry;

pub use error::ProxyError;
pub use fetcher::{FetchOutcome, ProxyFetcher, UpstreamHead, DEFAULT_UPSTREAM_TIMEOUT};
pub use registry::ProxyRegistry;
