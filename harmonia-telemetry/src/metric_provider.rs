//! Scalar param / vectorized metric accumulation with flush-on-close.

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};
use crate::log_provider::LogProvider;
use crate::uri;

/// Accumulates params (string -> string) and metrics (string -> ordered
/// floats) in insertion order, and flushes them to a backing URI exactly
/// once, on close.
pub struct MetricProvider {
    handle: Option<File>,
    closed: bool,
    params: Vec<(String, String)>,
    metrics: Vec<(String, Vec<f64>)>,
    log_provider: Option<Arc<LogProvider>>,
}

impl MetricProvider {
    /// `"-"` accumulates in memory only (no backing file); any other URI
    /// opens a `file://` sink the same way [`LogProvider::open`] does.
    pub fn new(uri: &str, log_provider: Option<Arc<LogProvider>>) -> Result<Self> {
        let handle = if uri == "-" {
            None
        } else {
            uri::has_scheme(uri)?;
            uri::makedirs(uri)?;
            let path = uri.strip_prefix("file://").ok_or_else(|| {
                tracing::warn!(uri, "metric sink URI names an unsupported scheme");
                TelemetryError::UnsupportedScheme(uri.to_string())
            })?;
            tracing::debug!(path, "opened metric sink");
            Some(File::create(path)?)
        };
        Ok(Self {
            handle,
            closed: false,
            params: Vec::new(),
            metrics: Vec::new(),
            log_provider,
        })
    }

    pub fn log_param(&mut self, param: impl Into<String>, value: impl Into<String>) {
        let (param, value) = (param.into(), value.into());
        if let Some(lp) = &self.log_provider {
            let _ = lp.msg(&format!("param: {} = {}", param, value));
        }
        match self.params.iter_mut().find(|(k, _)| *k == param) {
            Some(entry) => entry.1 = value,
            None => self.params.push((param, value)),
        }
    }

    pub fn get_param(&self, param: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == param)
            .map(|(_, v)| v.as_str())
    }

    pub fn log_metric(&mut self, metric: impl Into<String>, value: f64) {
        let metric = metric.into();
        if let Some(lp) = &self.log_provider {
            let _ = lp.msg(&format!("metric: {} = {:.4}", metric, value));
        }
        match self.metrics.iter_mut().find(|(k, _)| *k == metric) {
            Some(entry) => entry.1.push(value),
            None => self.metrics.push((metric, vec![value])),
        }
    }

    pub fn get_metric(&self, metric: &str) -> &[f64] {
        self.metrics
            .iter()
            .find(|(k, _)| k == metric)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// Flush every param as `"<k>: <v>\n"`, then every metric as
    /// `"<k>: <v0>,<v1>,...\n"` with four decimal digits per value, in
    /// insertion order. Idempotent: a second call (or the implicit one via
    /// `Drop`) is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut file) = self.handle.take() {
            for (k, v) in &self.params {
                writeln!(file, "{}: {}", k, v)?;
            }
            for (k, values) in &self.metrics {
                let rendered: Vec<String> = values.iter().map(|v| format!("{:.4}", v)).collect();
                writeln!(file, "{}: {}", k, rendered.join(","))?;
            }
            tracing::debug!(
                params = self.params.len(),
                metrics = self.metrics.len(),
                "flushed metric provider"
            );
        }
        Ok(())
    }
}

impl Drop for MetricProvider {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A templated URI factory for [`MetricProvider`], mirroring
/// [`crate::LogProviderFactory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricFactory {
    uri: String,
}

impl MetricFactory {
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

    pub fn build(
        &self,
        version: &str,
        name: &str,
        log_provider: Option<Arc<LogProvider>>,
    ) -> Result<MetricProvider> {
        let expanded = self.uri.replace("{version}", version).replace("{name}", name);
        MetricProvider::new(&expanded, log_provider)
    }
}

impl<'de> Deserialize<'de> for MetricFactory {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            uri: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        MetricFactory::new(raw.uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn flush_writes_params_then_metrics_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.metrics");
        let uri = format!("file://{}", path.display());

        let mut provider = MetricProvider::new(&uri, None).unwrap();
        provider.log_param("momentum", "adaptive");
        provider.log_metric("loss", 0.1);
        provider.log_metric("loss", 0.07);
        provider.close().unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "momentum: adaptive\nloss: 0.1000,0.0700\n");
    }

    #[test]
    fn double_close_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.metrics");
        let uri = format!("file://{}", path.display());

        let mut provider = MetricProvider::new(&uri, None).unwrap();
        provider.log_param("k", "v");
        provider.close().unwrap();
        provider.close().unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "k: v\n");
    }

    #[test]
    fn memory_only_sink_never_touches_disk() {
        let mut provider = MetricProvider::new("-", None).unwrap();
        provider.log_metric("accuracy", 0.9);
        assert_eq!(provider.get_metric("accuracy"), &[0.9]);
        provider.close().unwrap();
    }

    #[test]
    fn factory_rejects_uri_missing_placeholders() {
        assert!(MetricFactory::new("file://./logs/{name}.metrics").is_err());
        assert!(MetricFactory::new("file://./logs/{version}.metrics").is_err());
        assert!(MetricFactory::new("./logs/{version}/{name}.metrics").is_err());
    }
}
