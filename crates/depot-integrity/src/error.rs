//! Integrity scan error types.

use depot_store::StoreError;

/// Errors that abort a scan.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// Listing or deleting in the store failed.
    #[error("checksum scan store failure: {0}")]
    Store(#[from] StoreError),
}
