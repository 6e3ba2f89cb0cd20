//! Errors raised building or writing through a log or metric sink.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A templated URI failed one of the shape predicates in [`crate::uri`].
    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: &'static str },

    /// A sink URI names a scheme this crate has no transport for. Only
    /// `file://` and the literal `"-"` (stdout) sinks are handled locally;
    /// any other scheme is the opaque, externally-provided store spec.md
    /// carves out of scope.
    #[error("no local transport for scheme in URI '{0}'; plug in a remote store")]
    UnsupportedScheme(String),

    #[error("I/O error writing to sink: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
