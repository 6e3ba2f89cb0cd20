//! The `Edge` value type: a named data artifact addressed by URI.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::uri;

/// Whether an [`Edge`]'s URI shape makes it resolvable on the local
/// filesystem. Derived from the URI on every call, never stored: a
/// `Generic` edge and a `Local` edge with the same URI string compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Generic,
    Local,
}

/// A data artifact addressed by a templated URI.
///
/// Equality and ordering are both on the URI string alone, regardless of
/// kind: see [`EdgeKind`].
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    uri: String,
}

impl Edge {
    /// General constructor: validates only that a scheme is present. Use
    /// this for edges whose locality is incidental to the pipeline author's
    /// intent (the edge's `kind()` is still derived correctly).
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        uri::has_scheme(&uri)?;
        Ok(Self { uri })
    }

    /// Constructor for an edge the caller explicitly intends to be local:
    /// additionally validates `{version}` and the `file://` scheme.
    pub fn local(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        uri::has_scheme(&uri)?;
        uri::has_version(&uri)?;
        uri::is_file_scheme(&uri)?;
        Ok(Self { uri })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn kind(&self) -> EdgeKind {
        if self.uri.starts_with("file://") && self.uri.contains("{version}") {
            EdgeKind::Local
        } else {
            EdgeKind::Generic
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind() == EdgeKind::Local
    }

    /// Expand `{version}`; any other template token passes through
    /// untouched.
    pub fn build_uri(&self, version: &str) -> String {
        self.uri.replace("{version}", version)
    }

    /// `true` on any non-local edge (the remote store is assumed to
    /// materialize on demand). On a local edge, strips `file://`, expands
    /// `{version}`, and stats the resulting path.
    pub fn exists(&self, version: &str) -> bool {
        if !self.is_local() {
            return true;
        }
        let expanded = self.build_uri(version);
        let path = expanded.strip_prefix("file://").unwrap_or(&expanded);
        std::path::Path::new(path).exists()
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}
impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Edge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri.cmp(&other.uri)
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl<'de> Deserialize<'de> for Edge {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            uri: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        Edge::new(raw.uri).map_err(serde::de::Error::custom)
    }
}
