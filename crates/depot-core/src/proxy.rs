//! # Proxy Definitions
//!
//! A proxy is a named upstream artifact repository. Definitions are stored
//! as one JSON record each under [`RESERVED_PREFIX`], which is never visible
//! through listings or resolution.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Namespace holding proxy configuration records.
pub const RESERVED_PREFIX: &str = "__proxycfg__/";

/// Whether a logical path falls inside the reserved namespace.
///
/// Accepts paths with or without a leading slash and matches the bare
/// directory name too (`"__proxycfg__"`).
pub fn is_reserved(path: &str) -> bool {
    let path = path.trim_start_matches('/');
    let dir = RESERVED_PREFIX.trim_end_matches('/');
    path == dir || path.starts_with(RESERVED_PREFIX)
}

/// A validated proxy name: one or more of `[A-Za-z0-9._-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProxyName(String);

impl ProxyName {
    /// Validate a proxy name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ValidationError::InvalidProxyName(name));
        }
        Ok(Self(name))
    }

    /// Access the name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key of this proxy's configuration record.
    pub fn record_key(&self) -> String {
        format!("{RESERVED_PREFIX}{}.json", self.0)
    }
}

impl TryFrom<String> for ProxyName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProxyName> for String {
    fn from(name: ProxyName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ProxyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named upstream repository, as persisted and as accepted over the API.
///
/// Fields are raw strings so that malformed request bodies can still be
/// deserialized and then rejected by [`ProxyDefinition::normalized`] with a
/// precise message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDefinition {
    /// Proxy name, `[A-Za-z0-9._-]+`.
    #[serde(default)]
    pub name: String,
    /// Upstream base URL.
    #[serde(default)]
    pub url: String,
}

impl ProxyDefinition {
    /// Construct a definition without validating it.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Trim both fields and validate them.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidProxyName`] when the trimmed name is not
    /// `[A-Za-z0-9._-]+`, [`ValidationError::MissingProxyUrl`] when the
    /// trimmed URL is empty.
    pub fn normalized(&self) -> Result<(ProxyName, Self), ValidationError> {
        let name = ProxyName::new(self.name.trim())?;
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingProxyUrl);
        }
        let def = Self::new(name.as_str(), url);
        Ok((name, def))
    }

    /// Upstream base URL with trailing slashes stripped.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    /// Upstream URL for an artifact path below this proxy.
    pub fn upstream_url(&self, artifact_path: &str) -> String {
        format!("{}/{}", self.base_url(), artifact_path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["central", "my-repo_1.2", "A", "..."] {
            assert!(ProxyName::new(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "bad name", "a/b", "ümlaut", "x?y"] {
            assert_eq!(
                ProxyName::new(name),
                Err(ValidationError::InvalidProxyName(name.to_string()))
            );
        }
    }

    #[test]
    fn record_key_is_under_reserved_namespace() {
        let name = ProxyName::new("central").unwrap();
        assert_eq!(name.record_key(), "__proxycfg__/central.json");
        assert!(is_reserved(&name.record_key()));
    }

    #[test]
    fn normalized_trims_and_validates() {
        let def = ProxyDefinition::new("  central ", " https://repo1.maven.org/maven2/ ");
        let (name, def) = def.normalized().unwrap();
        assert_eq!(name.as_str(), "central");
        assert_eq!(def.url, "https://repo1.maven.org/maven2/");
        assert_eq!(def.base_url(), "https://repo1.maven.org/maven2");
    }

    #[test]
    fn normalized_requires_url() {
        let def = ProxyDefinition::new("central", "   ");
        assert_eq!(def.normalized(), Err(ValidationError::MissingProxyUrl));
    }

    #[test]
    fn upstream_url_joins_with_single_slash() {
        let def = ProxyDefinition::new("c", "http://up///");
        assert_eq!(def.upstream_url("/a/b.jar"), "http://up/a/b.jar");
    }

    #[test]
    fn reserved_detection() {
        assert!(is_reserved("__proxycfg__"));
        assert!(is_reserved("/__proxycfg__/x.json"));
        assert!(!is_reserved("__proxycfg__x"));
        assert!(!is_reserved("com/acme"));
    }

    #[test]
    fn definition_json_shape() {
        let def: ProxyDefinition =
            serde_json::from_str(r#"{"name":"central","url":"http://u"}"#).unwrap();
        assert_eq!(def, ProxyDefinition::new("central", "http://u"));
        let partial: ProxyDefinition = serde_json::from_str(r#"{"url":"http://u"}"#).unwrap();
        assert!(partial.normalized().is_err());
    }
}
