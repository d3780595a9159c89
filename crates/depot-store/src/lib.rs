//! # depot-store: Object Storage for Depot
//!
//! Everything Depot persists lives in one S3-compatible bucket: artifacts,
//! their checksum sidecars, and proxy configuration records. This crate
//! puts a narrow seam in front of that bucket.
//!
//! - [`ObjectBackend`] is the raw object API (get/head/put/delete and one
//!   page of list-v2). [`S3Backend`] implements it over `aws-sdk-s3`;
//!   [`MemoryBackend`] implements it over a sorted map for tests.
//! - [`KeyStore`] sits on top of a backend. It normalizes logical paths into
//!   [`depot_core::ArtifactKey`]s, applies the configured root prefix,
//!   emulates directory listings, and reports every backend's notion of a
//!   missing object as [`StoreError::NotFound`].
//! - [`Spool`] copies a body into an anonymous temporary file while
//!   computing SHA-1 and MD5 in the same pass, producing a seekable upload
//!   body.

pub mod backend;
pub mod config;
pub mod error;
pub mod keystore;
pub mod memory;
pub mod s3;
pub mod spool;

pub use backend::{
    ListPage, ListedObject, ObjectBackend, ObjectMeta, ObjectReader, SeekableBody, StoredObject,
};
pub use config::StoreConfig;
pub use error::StoreError;
pub use keystore::{KeyStore, ScanPage, DEFAULT_LIST_LIMIT};
pub use memory::{CallCounters, MemoryBackend};
pub use s3::S3Backend;
pub use spool::{Spool, SpooledBody};
