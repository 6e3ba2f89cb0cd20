//! The `Process` value type: a `Node` bound to its I/O edges and options.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::node::Node;

/// An option value: either a literal string or an [`Edge`] reference. Edge
/// values participate in graph edge-membership validation exactly like
/// explicit input/output edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Edge(Edge),
    String(String),
}

impl PartialEq for OptionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OptionValue::Edge(a), OptionValue::Edge(b)) => a == b,
            (OptionValue::String(a), OptionValue::String(b)) => a == b,
            _ => false,
        }
    }
}

/// A `Node` bound to its input and output edges, flags, and options.
///
/// Invariant: `output_edges` is non-empty; enforced at construction and at
/// deserialization (both funnel through [`Process::new`]).
#[derive(Debug, Clone, Serialize)]
pub struct Process {
    node: Node,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    options: Vec<(String, OptionValue)>,
    #[serde(default)]
    input_edges: Vec<Edge>,
    output_edges: Vec<Edge>,
}

impl Process {
    pub fn new(
        node: Node,
        flags: Vec<String>,
        options: Vec<(String, OptionValue)>,
        input_edges: Vec<Edge>,
        output_edges: Vec<Edge>,
    ) -> Result<Self> {
        if output_edges.is_empty() {
            return Err(GraphError::NoOutputs {
                node: node.name().to_string(),
            });
        }
        Ok(Self {
            node,
            flags,
            options,
            input_edges,
            output_edges,
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn options(&self) -> &[(String, OptionValue)] {
        &self.options
    }

    pub fn input_edges(&self) -> &[Edge] {
        &self.input_edges
    }

    pub fn output_edges(&self) -> &[Edge] {
        &self.output_edges
    }

    /// Every edge this process references: inputs, outputs, and any
    /// edge-typed option value. Used by [`crate::graph::Graph`] validation.
    pub fn referenced_edges(&self) -> impl Iterator<Item = &Edge> {
        self.input_edges.iter().chain(self.output_edges.iter()).chain(
            self.options
                .iter()
                .filter_map(|(_, v)| match v {
                    OptionValue::Edge(e) => Some(e),
                    OptionValue::String(_) => None,
                }),
        )
    }
}

impl PartialEq for Process {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}
impl Eq for Process {}

impl PartialOrd for Process {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Process {
    fn cmp(&self, other: &Self) -> Ordering {
        self.node.cmp(&other.node)
    }
}

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.node)
    }
}

impl<'de> Deserialize<'de> for Process {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            node: Node,
            #[serde(default)]
            flags: Vec<String>,
            #[serde(default)]
            options: Vec<(String, OptionValue)>,
            #[serde(default)]
            input_edges: Vec<Edge>,
            output_edges: Vec<Edge>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Process::new(raw.node, raw.flags, raw.options, raw.input_edges, raw.output_edges)
            .map_err(serde::de::Error::custom)
    }
}
