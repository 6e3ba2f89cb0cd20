//! The three-tier filesystem catalog: declared graphs, compiled plans, and
//! running instances, indexed by (graph-name, compiled-name, version).

use std::path::{Path, PathBuf};

use harmonia_core::uri;
use harmonia_core::{CompiledGraph, Graph};

use crate::atomic::write_atomic;
use crate::error::{Result, StateError};

/// A `file://` root plus the three catalog directories it anchors. Matches
/// the on-disk layout in §4.5 of the specification:
///
/// ```text
/// <graph_root>/<graph-name>.json
/// <compiled_root>/<graph-name>/<compiled-name>.json
/// <running_root>/<graph-name>/<compiled-name>/<version>.json
/// ```
#[derive(Debug, Clone)]
pub struct StateProvider {
    graph_root: PathBuf,
    compiled_root: PathBuf,
    running_root: PathBuf,
}

impl Default for StateProvider {
    fn default() -> Self {
        Self::new(
            "file://./state/graph/",
            "file://./state/compiled/",
            "file://./state/run/",
        )
        .expect("default roots are well-formed file:// URIs")
    }
}

impl StateProvider {
    /// Build a provider from three `file://` root URIs. Only the local
    /// filesystem transport is implemented here; any other scheme is
    /// rejected at construction rather than silently misbehaving (the
    /// opaque remote store spec.md carves out of scope is an external
    /// collaborator's concern, not this provider's).
    pub fn new(
        graph_root: impl AsRef<str>,
        compiled_root: impl AsRef<str>,
        running_root: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            graph_root: file_root(graph_root.as_ref())?,
            compiled_root: file_root(compiled_root.as_ref())?,
            running_root: file_root(running_root.as_ref())?,
        })
    }

    pub fn list_graphs(&self) -> Result<Vec<String>> {
        list_json_stems(&self.graph_root)
    }

    pub fn list_compiled(&self, graph: &str) -> Result<Vec<String>> {
        list_json_stems(&self.compiled_root.join(graph))
    }

    pub fn list_versions(&self, graph: &str, compiled: &str) -> Result<Vec<String>> {
        list_json_stems(&self.running_root.join(graph).join(compiled))
    }

    pub fn read_graph(&self, name: &str) -> Result<Graph> {
        let path = self.graph_root.join(format!("{name}.json"));
        read_validated_raw(&path)
    }

    pub fn write_graph(&self, graph: &Graph) -> Result<()> {
        let path = self.graph_root.join(format!("{}.json", graph.name()));
        write_pretty(&path, graph)
    }

    pub fn read_compiled(&self, graph: &str, compiled: &str) -> Result<CompiledGraph> {
        let path = self.compiled_root.join(graph).join(format!("{compiled}.json"));
        let plan: CompiledGraph = read_validated_raw(&path)?;
        plan.validate().map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "compiled plan failed layering invariant check");
            StateError::Incompatible {
                json: format!("{}\n\n(failed invariant check: {e})", pretty(&plan)),
            }
        })?;
        Ok(plan)
    }

    pub fn write_compiled(&self, graph: &str, compiled: &CompiledGraph) -> Result<()> {
        let path = self
            .compiled_root
            .join(graph)
            .join(format!("{}.json", compiled.name()));
        write_pretty(&path, compiled)
    }

    pub fn read_running(&self, graph: &str, compiled: &str, version: &str) -> Result<CompiledGraph> {
        let path = self
            .running_root
            .join(graph)
            .join(compiled)
            .join(format!("{version}.json"));
        let plan: CompiledGraph = read_validated_raw(&path)?;
        plan.validate().map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "running-instance record failed layering invariant check");
            StateError::Incompatible {
                json: format!("{}\n\n(failed invariant check: {e})", pretty(&plan)),
            }
        })?;
        Ok(plan)
    }

    pub fn write_running(
        &self,
        graph: &str,
        compiled: &str,
        version: &str,
        running: &CompiledGraph,
    ) -> Result<()> {
        let path = self
            .running_root
            .join(graph)
            .join(compiled)
            .join(format!("{version}.json"));
        write_pretty(&path, running)
    }
}

fn file_root(root: &str) -> Result<PathBuf> {
    uri::is_file_scheme(root)?;
    let stripped = root.strip_prefix("file://").unwrap_or(root);
    Ok(PathBuf::from(stripped))
}

fn list_json_stems(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            } else {
                None
            }
        })
        .collect();
    names.sort();
    Ok(names)
}

fn read_validated_raw<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let contents = std::fs::read_to_string(path).map_err(|_| {
        tracing::warn!(path = %path.display(), "state file missing or unreadable");
        StateError::Unreadable {
            path: path.to_path_buf(),
        }
    })?;
    let value: serde_json::Value = serde_json::from_str(&contents).map_err(|_| {
        tracing::warn!(path = %path.display(), "state file is not valid JSON");
        StateError::Unreadable {
            path: path.to_path_buf(),
        }
    })?;
    let parsed = serde_json::from_value(value.clone()).map_err(|_| {
        tracing::warn!(path = %path.display(), "state file parsed but failed schema validation");
        StateError::Incompatible {
            json: serde_json::to_string_pretty(&value).unwrap_or_else(|_| contents.clone()),
        }
    })?;
    tracing::debug!(path = %path.display(), "read state file");
    Ok(parsed)
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn write_pretty<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value).expect("Graph/CompiledGraph always serialize");
    write_atomic(path, &body)?;
    tracing::debug!(path = %path.display(), bytes = body.len(), "wrote state file");
    Ok(())
}
