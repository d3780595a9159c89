//! # Validation Errors
//!
//! Structured validation failures for the domain-primitive types, built with
//! `thiserror`. Each variant carries the rejected input so that operators can
//! see exactly what was refused.

use thiserror::Error;

/// Validation errors for domain primitive types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The raw artifact path was empty.
    #[error("empty key")]
    EmptyKey,

    /// The raw artifact path cleaned down to nothing (e.g. `"/"`, `"."`, `"a/.."`).
    #[error("invalid key: \"{0}\"")]
    InvalidKey(String),

    /// Proxy name does not match `[A-Za-z0-9._-]+`.
    #[error("invalid name \"{0}\"; only letters, digits, dot, underscore, dash")]
    InvalidProxyName(String),

    /// Proxy URL is empty after trimming.
    #[error("url is required")]
    MissingProxyUrl,

    /// The key falls inside the reserved configuration namespace.
    #[error("key \"{0}\" is inside a reserved namespace")]
    ReservedKey(String),
}
