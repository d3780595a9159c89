//! # Checksums
//!
//! Single-pass SHA-1 and MD5 computation for artifact sidecars.
//!
//! Every byte that reaches the store passes through a
//! [`ChecksumAccumulator`] exactly once; both digests are finalized together
//! and rendered as lowercase hex, the format Maven clients expect in
//! `<artifact>.sha1` and `<artifact>.md5`.

use md5::Md5;
use sha1::{Digest, Sha1};

/// Suffix of SHA-1 sidecar objects.
pub const SHA1_SUFFIX: &str = ".sha1";

/// Suffix of MD5 sidecar objects.
pub const MD5_SUFFIX: &str = ".md5";

/// Whether the path names a checksum sidecar (case-insensitive).
pub fn has_checksum_suffix(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(SHA1_SUFFIX) || lower.ends_with(MD5_SUFFIX)
}

/// Whether the key is a checksum of a checksum (`.sha1.sha1`, `.sha1.md5`,
/// `.md5.sha1`, `.md5.md5`), ignoring ASCII case.
pub fn is_compound_checksum(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    [SHA1_SUFFIX, MD5_SUFFIX].iter().any(|outer| {
        lower
            .strip_suffix(outer)
            .is_some_and(has_checksum_suffix)
    })
}

/// Hex digests of one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    /// Lowercase hex SHA-1.
    pub sha1: String,
    /// Lowercase hex MD5.
    pub md5: String,
}

impl Checksums {
    /// Digests of an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        let mut acc = ChecksumAccumulator::new();
        acc.update(data);
        acc.finalize()
    }
}

/// Streaming SHA-1 + MD5 hasher.
///
/// ```
/// use depot_core::ChecksumAccumulator;
///
/// let mut acc = ChecksumAccumulator::new();
/// acc.update(b"hello ");
/// acc.update(b"world");
/// let sums = acc.finalize();
/// assert_eq!(sums.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
/// ```
#[derive(Clone, Default)]
pub struct ChecksumAccumulator {
    sha1: Sha1,
    md5: Md5,
}

impl ChecksumAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk into both hashers.
    pub fn update(&mut self, data: &[u8]) {
        self.sha1.update(data);
        self.md5.update(data);
    }

    /// Consume the accumulator and return both digests.
    pub fn finalize(self) -> Checksums {
        Checksums {
            sha1: hex::encode(self.sha1.finalize()),
            md5: hex::encode(self.md5.finalize()),
        }
    }
}

impl std::fmt::Debug for ChecksumAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumAccumulator").finish_non_exhaustive()
    }
}
