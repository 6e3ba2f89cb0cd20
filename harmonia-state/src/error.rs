//! Errors raised loading or storing persisted Harmonia state.

use std::path::PathBuf;

use thiserror::Error;

/// The two failure kinds §4.5/§7 of the specification carve out for
/// persisted state, plus the I/O errors that arise wiring them up.
#[derive(Debug, Error)]
pub enum StateError {
    /// The file is missing or its contents are not valid JSON. Carries the
    /// path that was attempted.
    #[error("unreadable state file: {path}")]
    Unreadable { path: PathBuf },

    /// The file parsed as JSON but failed `Graph`/`CompiledGraph` schema or
    /// invariant validation. Carries the pretty-printed JSON for
    /// diagnostics.
    #[error("incompatible state document:\n{json}")]
    Incompatible { json: String },

    /// A root URI was not `file://`; this provider only implements the
    /// local filesystem transport spec.md carves out of scope for other
    /// schemes.
    #[error(transparent)]
    InvalidRoot(#[from] harmonia_core::GraphError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
