//! The `Node` value type: an external command and its metadata.

use std::cmp::Ordering;

use harmonia_telemetry::LogProviderFactory;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// An external command plus the factory that will build its per-run log
/// sink. Spawning the command and supervising it is `harmonia-runner`'s
/// concern (§4.6); this type only carries the data.
///
/// Like every other value type with a constructor invariant in this crate,
/// deserialization funnels through [`Node::new`] (see the custom
/// [`Deserialize`](trait@serde::Deserialize) impl below) so a persisted
/// document with an empty node name is rejected as `Incompatible` rather
/// than silently accepted.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    name: String,
    cmd: Vec<String>,
    log_provider_factory: LogProviderFactory,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        cmd: Vec<String>,
        log_provider_factory: LogProviderFactory,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(GraphError::InvalidNode {
                reason: "node name must not be empty",
            });
        }
        Ok(Self {
            name,
            cmd,
            log_provider_factory,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    pub fn log_provider_factory(&self) -> &LogProviderFactory {
        &self.log_provider_factory
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.name, self.cmd)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            cmd: Vec<String>,
            log_provider_factory: LogProviderFactory,
        }
        let raw = Raw::deserialize(deserializer)?;
        Node::new(raw.name, raw.cmd, raw.log_provider_factory).map_err(serde::de::Error::custom)
    }
}
