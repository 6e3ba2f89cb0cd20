//! Graph validation, topological compilation, and the value types
//! (`Edge`/`Node`/`Process`/`Graph`/`CompiledGraph`) that make up a Harmonia
//! pipeline's declared and compiled representations.
//!
//! This crate is pure and non-blocking except for [`uri::makedirs`] and
//! [`edge::Edge::exists`], both of which are plain filesystem stats/creates,
//! never network I/O. Spawning and supervising the processes a compiled
//! graph names lives in `harmonia-runner`; persisting graphs and compiled
//! plans lives in `harmonia-state`.

pub mod edge;
pub mod error;
pub mod graph;
pub mod node;
pub mod process;
pub mod uri;

pub use edge::{Edge, EdgeKind};
pub use error::{GraphError, Result};
pub use graph::{CompiledGraph, Graph};
pub use node::Node;
pub use process::{OptionValue, Process};
