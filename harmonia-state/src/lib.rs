//! The three-tier persisted-state catalog: declared graphs, compiled plans,
//! and running instances, indexed by (graph-name, compiled-name, version).
//!
//! Reads and writes are plain synchronous filesystem operations — the only
//! suspension points the concurrency model (§5) grants this layer. Writes
//! go through [`atomic::write_atomic`] so a crash mid-write never corrupts
//! an existing file; reads distinguish an `Unreadable` document (missing or
//! unparseable JSON) from an `Incompatible` one (parseable JSON that fails
//! `Graph`/`CompiledGraph` validation), per §4.5 and §7 of the
//! specification.

pub mod atomic;
pub mod error;
pub mod provider;

pub use error::{Result, StateError};
pub use provider::StateProvider;
