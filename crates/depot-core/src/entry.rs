//! # Catalog Entries
//!
//! The single listing shape shared by local storage, upstream index pages,
//! and the synthetic `packages/` group.

use serde::{Deserialize, Serialize};

/// Kind of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// A stored object.
    File,
    /// A directory emulated over the flat key space.
    Dir,
    /// A synthetic view merging several sources (`packages/`).
    Group,
    /// A registered upstream proxy.
    Proxy,
}

impl EntryType {
    /// Whether entries of this kind are directory-shaped (trailing slash).
    pub fn is_container(self) -> bool {
        !matches!(self, Self::File)
    }
}

/// One row of a non-recursive listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Last path segment; directory-shaped entries end in `/`.
    pub name: String,
    /// Path relative to the API root; directory-shaped entries end in `/`.
    pub path: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: EntryType,
    /// Object size in bytes, files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Entry {
    /// A stored file.
    pub fn file(name: impl Into<String>, path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryType::File,
            size,
        }
    }

    /// A directory entry; trailing slashes are added when missing.
    pub fn dir(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::container(EntryType::Dir, name, path)
    }

    /// A synthetic group entry.
    pub fn group(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::container(EntryType::Group, name.clone(), name)
    }

    /// A registered-proxy entry.
    pub fn proxy(name: &str) -> Self {
        Self::container(EntryType::Proxy, name, name)
    }

    fn container(kind: EntryType, name: impl Into<String>, path: impl Into<String>) -> Self {
        let mut entry = Self {
            name: name.into(),
            path: path.into(),
            kind,
            size: None,
        };
        entry.normalize_slashes();
        entry
    }

    /// Ensure directory-shaped entries carry a trailing slash on both
    /// `name` and `path`. Files are left untouched.
    pub fn normalize_slashes(&mut self) {
        if !self.kind.is_container() {
            return;
        }
        if !self.name.ends_with('/') {
            self.name.push('/');
        }
        if !self.path.ends_with('/') {
            self.path.push('/');
        }
    }
}
