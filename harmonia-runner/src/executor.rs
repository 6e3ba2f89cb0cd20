//! Layered execution of a [`CompiledGraph`]: every process in a layer is
//! launched before any blocking wait begins; the supervisor blocks on full
//! completion of layer `L_k` before launching any process in `L_{k+1}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use harmonia_core::CompiledGraph;
use tokio::sync::Mutex;

use crate::error::{Result, RunError};
use crate::supervisor::{heartbeat, spawn_node, Heartbeat, NodeHandle};

/// Mint a sortable run identifier for callers with no versioning scheme of
/// their own. Any caller-supplied version string is equally valid and is
/// never generated or mutated by this crate.
pub fn new_version() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// A handle to an in-flight [`run`], returned by [`run_in_background`].
/// Cancelling terminates every process in the currently running layer and
/// prevents subsequent layers from launching.
pub struct CompiledGraphRun {
    cancelled: Arc<AtomicBool>,
    join: tokio::task::JoinHandle<Result<()>>,
}

impl CompiledGraphRun {
    /// Request cancellation. Non-blocking: the in-flight layer's children
    /// are killed the next time the supervisor's poll loop observes the
    /// flag, which happens at least once every [`crate::supervisor::HEARTBEAT_TIMEOUT`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Wait for the run to finish (successfully, with a node failure, or
    /// because it was cancelled).
    pub async fn join(self) -> Result<()> {
        self.join.await.expect("supervisor task panicked")
    }
}

/// Spawn the layered executor as a background task and return a handle that
/// can be cancelled or joined. This is the non-blocking entry point §4.6's
/// cancellation semantics (supplemented in `SPEC_FULL.md`) require.
pub fn run_in_background(compiled: CompiledGraph, version: String) -> CompiledGraphRun {
    let cancelled = Arc::new(AtomicBool::new(false));
    let join = tokio::spawn(run_layers(compiled, version, cancelled.clone()));
    CompiledGraphRun { cancelled, join }
}

/// Run a compiled graph to completion, blocking until every layer has
/// finished or a node fails. Equivalent to
/// `run_in_background(compiled, version).join().await` with no way to
/// cancel; use [`run_in_background`] when cancellation matters.
pub async fn run(compiled: &CompiledGraph, version: &str) -> Result<()> {
    run_layers(compiled.clone(), version.to_string(), Arc::new(AtomicBool::new(false))).await
}

async fn run_layers(compiled: CompiledGraph, version: String, cancelled: Arc<AtomicBool>) -> Result<()> {
    for (layer_index, layer) in compiled.order().iter().enumerate() {
        if cancelled.load(Ordering::SeqCst) {
            return Err(RunError::Cancelled);
        }

        tracing::info!(layer = layer_index, size = layer.len(), "launching layer");

        // Launch every process in the layer before blocking on any of them.
        let mut handles = Vec::with_capacity(layer.len());
        for process in layer {
            let args: Vec<String> = process
                .input_edges()
                .iter()
                .chain(process.output_edges().iter())
                .map(|edge| edge.build_uri(&version))
                .collect();
            let handle = spawn_node(process.node(), &version, args).await?;
            handles.push(handle);
        }

        run_layer_to_completion(handles, &cancelled).await?;
        tracing::info!(layer = layer_index, "layer complete");
    }
    Ok(())
}

/// Round-robin heartbeat polling of every handle in a layer until all have
/// exited successfully, one exits non-zero (failing the layer and the
/// run), or cancellation is observed.
async fn run_layer_to_completion(
    mut handles: Vec<NodeHandle>,
    cancelled: &Arc<AtomicBool>,
) -> Result<()> {
    while !handles.is_empty() {
        if cancelled.load(Ordering::SeqCst) {
            for handle in handles.iter_mut() {
                handle.kill();
            }
            return Err(RunError::Cancelled);
        }

        let mut still_running = Vec::with_capacity(handles.len());
        let mut iter = handles.into_iter();
        while let Some(mut handle) = iter.next() {
            match heartbeat(&mut handle).await {
                Heartbeat::Exited(Some(0)) => {
                    tracing::debug!(node = handle.name(), "node exited successfully");
                }
                Heartbeat::Exited(code) => {
                    tracing::error!(node = handle.name(), code = ?code, "node failed");
                    for mut remaining in still_running {
                        remaining.kill();
                    }
                    for mut remaining in iter {
                        remaining.kill();
                    }
                    return Err(RunError::ExitFailure {
                        node: handle.name().to_string(),
                        code,
                    });
                }
                Heartbeat::StillRunning => still_running.push(handle),
            }
        }
        handles = still_running;
    }
    Ok(())
}
