//! Per-run, per-node write-only log sinks.

use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};
use crate::uri;

enum Sink {
    Stdout(std::io::Stdout),
    File(File),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Stdout(s) => s.write(buf),
            Sink::File(f) => f.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Stdout(s) => s.flush(),
            Sink::File(f) => f.flush(),
        }
    }
}

/// A single write-only sink, one line per call, each line timestamped.
///
/// A `LogProvider` built for `"-"` writes to the process's standard output.
/// Every other URI opens (and, for `file://`, creates the parent directories
/// of) a dedicated file.
pub struct LogProvider {
    handle: Mutex<Sink>,
}

impl LogProvider {
    /// The `"-"` sink: the process's own stdout.
    pub fn stdout() -> Self {
        Self {
            handle: Mutex::new(Sink::Stdout(std::io::stdout())),
        }
    }

    /// Open a sink at `uri`. `"-"` is special-cased to stdout; `file://`
    /// URIs are created (parents included) on the local filesystem. Any
    /// other scheme is out of this crate's scope — a caller integrating a
    /// remote store plugs in its own transport ahead of this call.
    pub fn open(uri: &str) -> Result<Self> {
        if uri == "-" {
            return Ok(Self::stdout());
        }
        uri::has_scheme(uri)?;
        uri::makedirs(uri)?;
        let path = uri.strip_prefix("file://").ok_or_else(|| {
            tracing::warn!(uri, "log sink URI names an unsupported scheme");
            TelemetryError::UnsupportedScheme(uri.to_string())
        })?;
        let file = File::create(path)?;
        tracing::debug!(path, "opened log sink");
        Ok(Self {
            handle: Mutex::new(Sink::File(file)),
        })
    }

    /// Write one line, prefixed with an ISO-8601 UTC timestamp and `" | "`.
    pub fn msg(&self, msg: &str) -> Result<()> {
        let line = format!("{} | {}\n", Utc::now().to_rfc3339(), msg);
        let mut handle = self.handle.lock().expect("log provider mutex poisoned");
        handle.write_all(line.as_bytes())?;
        handle.flush()?;
        Ok(())
    }

    /// Flush and release the underlying handle. Idempotent: calling it more
    /// than once (including via `Drop`) is a no-op on the second call
    /// onward because flushing an already-flushed handle is harmless.
    pub fn close(&self) -> Result<()> {
        let mut handle = self.handle.lock().expect("log provider mutex poisoned");
        handle.flush()?;
        Ok(())
    }
}

impl Drop for LogProvider {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A templated URI containing both `{name}` and `{version}`; a factory for
/// building the [`LogProvider`] a given node/run pair writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogProviderFactory {
    uri: String,
}

impl LogProviderFactory {
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        uri::has_name(&uri)?;
        uri::has_version(&uri)?;
        uri::has_scheme(&uri)?;
        Ok(Self { uri })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Expand `{version}` and `{name}`, ensure parent directories, and open
    /// the resulting [`LogProvider`].
    ///
    /// The supervisor (`harmonia-runner`) is the only caller that builds a
    /// provider to capture a spawned child's output: it pipes the child's
    /// merged stdout/stderr straight into the handle returned here rather
    /// than reassigning the whole process's global stdout, which has no
    /// safe equivalent in an async Rust binary with multiple nodes running
    /// concurrently. See `DESIGN.md`.
    pub fn build(&self, version: &str, name: &str) -> Result<LogProvider> {
        let expanded = self.uri.replace("{version}", version).replace("{name}", name);
        LogProvider::open(&expanded)
    }
}

impl<'de> Deserialize<'de> for LogProviderFactory {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            uri: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        LogProviderFactory::new(raw.uri).map_err(serde::de::Error::custom)
    }
}
