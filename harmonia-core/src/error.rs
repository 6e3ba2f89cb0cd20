//! Error types for graph construction, validation and compilation.
//!
//! All errors here are raised at constructor-time or compile-time; none are
//! retried internally. See the crate-level docs for the four-kind taxonomy
//! shared across the Harmonia workspace (`harmonia-state` and
//! `harmonia-runner` define their own enums for the other two kinds).

use thiserror::Error;

/// Errors raised while validating a URI, or constructing an `Edge`, `Node`,
/// `Process` or `Graph`.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A URI failed one of the shape predicates in [`crate::uri`].
    ///
    /// Raised at constructor time; never recovered internally.
    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: &'static str },

    /// A sequence that is required to contain unique elements held a
    /// duplicate.
    #[error("duplicate element in {context}: {element}")]
    DuplicateElement { context: &'static str, element: String },

    /// A `Process` was constructed with no output edges.
    #[error("process '{node}' has no output edges")]
    NoOutputs { node: String },

    /// An edge referenced by a process (input, output, or an edge-typed
    /// option value) is not a member of the graph's edge set.
    #[error("edge '{edge}' referenced by process '{process}' is not a member of the graph")]
    DanglingEdge { process: String, edge: String },

    /// An edge is a member of the graph's edge set but is not referenced by
    /// any process.
    #[error("edge '{edge}' is not referenced by any process")]
    UnreferencedEdge { edge: String },

    /// Two or more processes claim the same edge as an output.
    #[error("edge '{edge}' is produced by more than one process: {processes:?}")]
    MultiWriter { edge: String, processes: Vec<String> },

    /// The processes in a graph do not form a single connected component.
    #[error("graph is disconnected: process '{left}' shares no edge with process '{right}'")]
    Disconnected { left: String, right: String },

    /// `full_io` found no edges with no producer, or no edges with no
    /// consumer.
    #[error("graph has no {0}")]
    MissingBoundary(&'static str),

    /// `compile_graph` could not make progress: the supplied boundary does
    /// not correspond to a realizable cut of the graph (dangling outputs,
    /// unreachable processes, or an incoherent `inputs`/`outputs` split).
    #[error("compilation stalled with {remaining} process(es) unreachable from the given inputs")]
    Disjoint { remaining: usize },

    /// A `Node` was constructed with an empty name.
    #[error("node has an invalid name: {reason}")]
    InvalidNode { reason: &'static str },

    /// A `CompiledGraph` layer orders a process before an input edge it
    /// depends on is satisfied — either by the plan's declared inputs or by
    /// an earlier layer's outputs.
    #[error("process '{node}' in layer {layer} has unsatisfied input edge '{edge}'")]
    UnsatisfiedInput {
        layer: usize,
        node: String,
        edge: String,
    },
}

pub type Result<T> = std::result::Result<T, GraphError>;
