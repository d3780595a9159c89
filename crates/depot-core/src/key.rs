//! # Artifact Keys
//!
//! Normalization of logical artifact paths into storage keys.
//!
//! Raw paths arrive from URLs, query strings, proxy listings, and JSON
//! bodies. They are cleaned lexically the same way a rooted filesystem path
//! is: empty and `.` segments are dropped and `..` pops the previous segment,
//! never climbing above the root. The cleaned result carries no leading or
//! trailing slash. Traversal is neutralized rather than rejected, so
//! `"../x"` becomes `"x"`.

use serde::{Deserialize, Serialize};

use crate::checksum::{MD5_SUFFIX, SHA1_SUFFIX};
use crate::error::ValidationError;

/// Lexically clean a slash-separated path as if it were rooted at `/`.
///
/// The result has no leading or trailing slash and no `.`/`..` segments.
/// An input that cleans down to the root yields the empty string.
pub fn clean_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Join two path fragments and clean the result.
///
/// Trailing slashes on either fragment are not preserved; callers that need
/// directory-shaped output add the slash back.
pub fn join_path(base: &str, child: &str) -> String {
    clean_path(&format!("{base}/{child}"))
}

/// A normalized, non-empty artifact key relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Normalize a raw path into a key.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyKey`] for an empty input and
    /// [`ValidationError::InvalidKey`] when the input cleans down to nothing.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        let cleaned = clean_path(raw);
        if cleaned.is_empty() || cleaned == "." {
            return Err(ValidationError::InvalidKey(raw.to_string()));
        }
        Ok(Self(cleaned))
    }

    /// Access the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Split off the first path segment.
    ///
    /// Returns `None` when the key has a single segment. Used to separate a
    /// proxy name from the artifact path in proxy-qualified keys.
    pub fn split_first(&self) -> Option<(&str, &str)> {
        self.0.split_once('/')
    }

    /// Key of the sibling sidecar with the given suffix (e.g. `".sha1"`).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }

    /// Key of the SHA-1 sidecar.
    pub fn sha1_sidecar(&self) -> Self {
        self.with_suffix(SHA1_SUFFIX)
    }

    /// Key of the MD5 sidecar.
    pub fn md5_sidecar(&self) -> Self {
        self.with_suffix(MD5_SUFFIX)
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_strips_leading_slash() {
        let key = ArtifactKey::parse("/com/acme/app-1.0.jar").unwrap();
        assert_eq!(key.as_str(), "com/acme/app-1.0.jar");
    }

    #[test]
    fn parse_rejects_empty_and_degenerate() {
        assert_eq!(ArtifactKey::parse(""), Err(ValidationError::EmptyKey));
        assert!(matches!(
            ArtifactKey::parse("/"),
            Err(ValidationError::InvalidKey(_))
        ));
        assert!(matches!(
            ArtifactKey::parse("."),
            Err(ValidationError::InvalidKey(_))
        ));
        assert!(matches!(
            ArtifactKey::parse("a/.."),
            Err(ValidationError::InvalidKey(_))
        ));
    }

    #[test]
    fn traversal_is_neutralized() {
        assert_eq!(ArtifactKey::parse("../x").unwrap().as_str(), "x");
        assert_eq!(
            ArtifactKey::parse("a/../../../etc/passwd").unwrap().as_str(),
            "etc/passwd"
        );
        assert_eq!(ArtifactKey::parse("a//b/./c/").unwrap().as_str(), "a/b/c");
    }

    #[test]
    fn split_first_separates_proxy_name() {
        let key = ArtifactKey::parse("central/com/acme/app.jar").unwrap();
        assert_eq!(key.split_first(), Some(("central", "com/acme/app.jar")));
        assert_eq!(ArtifactKey::parse("central").unwrap().split_first(), None);
    }

    #[test]
    fn sidecar_keys() {
        let key = ArtifactKey::parse("com/acme/app.jar").unwrap();
        assert_eq!(key.sha1_sidecar().as_str(), "com/acme/app.jar.sha1");
        assert_eq!(key.md5_sidecar().as_str(), "com/acme/app.jar.md5");
    }

    #[test]
    fn join_path_cleans() {
        assert_eq!(join_path("packages", "com/"), "packages/com");
        assert_eq!(join_path("", "central"), "central");
    }

    #[test]
    fn deserialize_normalizes() {
        let key: ArtifactKey = serde_json::from_str("\"/a/./b\"").unwrap();
        assert_eq!(key.as_str(), "a/b");
        assert!(serde_json::from_str::<ArtifactKey>("\"\"").is_err());
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[a-z./]{1,40}") {
            if let Ok(key) = ArtifactKey::parse(&raw) {
                let again = ArtifactKey::parse(key.as_str()).unwrap();
                prop_assert_eq!(again, key);
            }
        }

        #[test]
        fn traversal_never_survives(raw in "(\\.\\./|[a-z]{1,3}/|\\./){0,8}[a-z]{1,5}") {
            let key = ArtifactKey::parse(&raw).unwrap();
            prop_assert!(!key.as_str().starts_with('/'));
            prop_assert!(key.as_str().split('/').all(|s| s != ".." && s != "." && !s.is_empty()));
        }
    }
}
