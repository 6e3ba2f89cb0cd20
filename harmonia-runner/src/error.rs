//! Errors raised spawning or supervising a compiled graph's processes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    /// A `Node`'s `cmd` was empty; there is nothing to exec.
    #[error("node '{node}' has an empty command")]
    EmptyCommand { node: String },

    /// The child-process spawn syscall failed.
    #[error("failed to spawn node '{node}': {source}")]
    Spawn {
        node: String,
        #[source]
        source: std::io::Error,
    },

    /// A node in a layer exited with a non-zero (or signal-terminated)
    /// status; the layer, and the run, are aborted. The supervisor reports
    /// the exit code verbatim, per §7 of the specification.
    #[error("node '{node}' exited with status {code:?}")]
    ExitFailure { node: String, code: Option<i32> },

    /// The run was cancelled before all layers completed.
    #[error("run was cancelled")]
    Cancelled,

    #[error(transparent)]
    Telemetry(#[from] harmonia_telemetry::TelemetryError),

    #[error("I/O error supervising a child: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunError>;
