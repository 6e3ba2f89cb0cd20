//! Spawning a [`Node`] as a child process and supervising it with
//! non-blocking, bounded-timeout heartbeat polling.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use harmonia_core::Node;
use harmonia_telemetry::LogProvider;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::error::{Result, RunError};

/// §4.6: `heartbeat` polls with a small bounded timeout rather than
/// blocking indefinitely on the child's exit.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(100);

/// The outcome of one [`heartbeat`] poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    /// The child exited; carries its exit code (`None` if it was killed by
    /// a signal rather than exiting normally).
    Exited(Option<i32>),
    StillRunning,
}

/// A spawned [`Node`]'s child process plus the background tasks piping its
/// merged stdout/stderr into the per-run [`LogProvider`], and the provider
/// itself (kept alive so its lines are flushed before it drops).
pub struct NodeHandle {
    name: String,
    child: Child,
    logger: Arc<LogProvider>,
    pumps: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logger(&self) -> &Arc<LogProvider> {
        &self.logger
    }

    /// Send a kill signal to the child. Used by cancellation; never fails
    /// the caller even if the child has already exited.
    pub fn kill(&mut self) {
        let _ = self.child.start_kill();
    }

    /// Wait for the pumps piping stdout/stderr to the log to finish, so
    /// every line the child wrote before exiting is flushed before this
    /// handle is dropped.
    async fn drain(&mut self) {
        for pump in self.pumps.drain(..) {
            let _ = pump.await;
        }
    }
}

/// Spawn `node.cmd() ++ args` as a child process. Its stdout and stderr are
/// piped independently and both pumped, line by line, into the log sink
/// `node.log_provider_factory()` builds for (`version`, `node.name()`) — the
/// closest approximation of the source's `subprocess.STDOUT` merge available
/// without per-platform fd plumbing, and indistinguishable in the resulting
/// log file.
pub async fn spawn_node(node: &Node, version: &str, args: Vec<String>) -> Result<NodeHandle> {
    let mut full_args = node.cmd().to_vec();
    full_args.extend(args);
    let (program, rest) = full_args
        .split_first()
        .ok_or_else(|| RunError::EmptyCommand {
            node: node.name().to_string(),
        })?;

    let logger = Arc::new(node.log_provider_factory().build(version, node.name())?);

    let mut command = tokio::process::Command::new(program);
    command.args(rest).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| RunError::Spawn {
        node: node.name().to_string(),
        source,
    })?;

    let stdout = child.stdout.take().expect("stdout was piped at spawn");
    let stderr = child.stderr.take().expect("stderr was piped at spawn");

    let pumps = vec![
        tokio::spawn(pump_lines(stdout, logger.clone())),
        tokio::spawn(pump_lines(stderr, logger.clone())),
    ];

    Ok(NodeHandle {
        name: node.name().to_string(),
        child,
        logger,
        pumps,
    })
}

async fn pump_lines<R: AsyncRead + Unpin>(stream: R, logger: Arc<LogProvider>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let _ = logger.msg(&line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "error reading child output");
                break;
            }
        }
    }
}

/// Non-blockingly poll `handle`'s child for up to [`HEARTBEAT_TIMEOUT`]. If
/// it has exited within that window, drains its output pumps and returns
/// its exit code; otherwise returns [`Heartbeat::StillRunning`]. Never
/// fails: a wait error is logged and treated as still-running so the
/// supervisor keeps polling rather than wedging.
pub async fn heartbeat(handle: &mut NodeHandle) -> Heartbeat {
    match tokio::time::timeout(HEARTBEAT_TIMEOUT, handle.child.wait()).await {
        Ok(Ok(status)) => {
            handle.drain().await;
            Heartbeat::Exited(status.code())
        }
        Ok(Err(e)) => {
            tracing::warn!(node = handle.name(), error = %e, "error polling child status");
            Heartbeat::StillRunning
        }
        Err(_elapsed) => Heartbeat::StillRunning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmonia_telemetry::LogProviderFactory;

    fn node(name: &str, cmd: Vec<&str>, log_dir: &std::path::Path) -> Node {
        let factory = LogProviderFactory::new(format!(
            "file://{}/{{version}}/{{name}}.log",
            log_dir.display()
        ))
        .unwrap();
        Node::new(name, cmd.into_iter().map(String::from).collect(), factory).unwrap()
    }

    /// Scenario 6: sleep-then-exit. `heartbeat` returns `StillRunning`
    /// before the sleep elapses and `Exited(Some(0))` afterward.
    #[tokio::test]
    async fn heartbeat_transitions_from_still_running_to_exited() {
        let dir = tempfile::tempdir().unwrap();
        let node = node("sleeper", vec!["sh", "-c", "sleep 0.3 && exit 0"], dir.path());
        let mut handle = spawn_node(&node, "v1", vec![]).await.unwrap();

        assert_eq!(heartbeat(&mut handle).await, Heartbeat::StillRunning);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(heartbeat(&mut handle).await, Heartbeat::Exited(Some(0)));
    }

    #[tokio::test]
    async fn stdout_lines_are_timestamped_in_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let node = node("echoer", vec!["sh", "-c", "echo hello"], dir.path());
        let mut handle = spawn_node(&node, "v1", vec![]).await.unwrap();

        loop {
            if let Heartbeat::Exited(_) = heartbeat(&mut handle).await {
                break;
            }
        }

        let contents = std::fs::read_to_string(dir.path().join("v1/echoer.log")).unwrap();
        assert!(contents.contains(" | hello\n"));
        assert!(contents.contains('T'));
    }

    #[tokio::test]
    async fn empty_command_is_rejected_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let node = node("noop", vec![], dir.path());
        let result = spawn_node(&node, "v1", vec![]).await;
        assert!(matches!(result, Err(RunError::EmptyCommand { .. })));
    }
}
