//! Store error types.

use depot_core::ValidationError;

/// Longest upload error body kept in [`StoreError::UploadFailed`].
const UPLOAD_BODY_LIMIT: usize = 512;

/// Errors from the object store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The raw path could not be normalized into a key.
    #[error(transparent)]
    InvalidKey(#[from] ValidationError),

    /// The object does not exist. Every backend-specific shape of "missing"
    /// is reported as this variant.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The presigned upload returned a non-2xx status.
    #[error("upload failed with status {status}: {body}")]
    UploadFailed {
        /// HTTP status of the upload response.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// Local I/O failed (spool file, body rewind).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Build an [`StoreError::UploadFailed`], truncating the body excerpt.
    pub fn upload_failed(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(UPLOAD_BODY_LIMIT) {
            Some((idx, _)) => format!("{}...", &body[..idx]),
            None => body.to_string(),
        };
        Self::UploadFailed { status, body }
    }
}
