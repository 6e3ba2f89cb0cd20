//! The supervisor: spawns the processes of a [`harmonia_core::CompiledGraph`]
//! as OS children, layer by layer, polling each with a bounded-timeout
//! heartbeat rather than blocking, and routes their merged stdout/stderr to
//! per-node logs via `harmonia-telemetry`.
//!
//! Only three things in this crate may suspend: the heartbeat poll (bounded
//! by [`supervisor::HEARTBEAT_TIMEOUT`]), the child-spawn syscall, and the
//! log sink's filesystem I/O — everything upstream in `harmonia-core` is
//! pure and non-blocking.

pub mod error;
pub mod executor;
pub mod supervisor;

pub use error::{Result, RunError};
pub use executor::{new_version, run, run_in_background, CompiledGraphRun};
pub use supervisor::{heartbeat, spawn_node, Heartbeat, NodeHandle, HEARTBEAT_TIMEOUT};
