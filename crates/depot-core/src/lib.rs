#![deny(missing_docs)]

//! # depot-core: Foundational Types for Depot
//!
//! This crate defines the types that every other crate in the workspace
//! depends on. It has no internal crate dependencies, only `serde`,
//! `serde_json`, `thiserror`, and the RustCrypto `sha1`/`md-5` hashers.
//!
//! ## Design Principles
//!
//! 1. **Keys are normalized once.** An [`ArtifactKey`] can only be built
//!    through [`ArtifactKey::parse`], which cleans the raw path so that
//!    traversal segments can never escape the store root.
//!
//! 2. **One listing shape.** Every catalog source (local storage, upstream
//!    HTML index pages, synthetic groups) produces the same [`Entry`].
//!
//! 3. **Checksums are computed in one pass.** [`ChecksumAccumulator`] feeds
//!    SHA-1 and MD5 from the same bytes so that no body is read twice.

pub mod checksum;
pub mod entry;
pub mod error;
pub mod key;
pub mod proxy;

pub use checksum::{
    has_checksum_suffix, is_compound_checksum, ChecksumAccumulator, Checksums, MD5_SUFFIX,
    SHA1_SUFFIX,
};
pub use entry::{Entry, EntryType};
pub use error::ValidationError;
pub use key::{clean_path, join_path, ArtifactKey};
pub use proxy::{is_reserved, ProxyDefinition, ProxyName, RESERVED_PREFIX};
