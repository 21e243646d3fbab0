//! One isolated worker process
//!
//! Lifecycle: spawn into a private temp dir, feed the payload on stdin,
//! race exit against the deadline, kill and reap on expiry, then drain the
//! output readers. The temp dir and the child go away on every path.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ExecutorConfig;
use crate::error::{ProbeError, Result};

const SCRIPT_FILE: &str = "verify.py";

pub struct Worker {
    child: Child,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
    writer: Option<JoinHandle<std::io::Result<()>>>,
    started: Instant,
    grace: Duration,
    _workdir: TempDir,
}

/// How a worker ended
#[derive(Debug)]
pub enum WorkerExit {
    Finished { status: ExitStatus, stdout: String, stderr: String, elapsed: Duration },
    TimedOut { stderr: String, elapsed: Duration },
}

fn spawn_error(message: String) -> ProbeError {
    ProbeError::Execution { message, stderr_tail: String::new() }
}

fn read_all<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!("Worker output stream closed early: {}", e);
        }
        buf
    })
}

impl Worker {
    /// Write the script into a fresh temp dir and start the interpreter on it
    pub async fn spawn(config: &ExecutorConfig, script: &str, env: &[(String, String)]) -> Result<Self> {
        let workdir = TempDir::new()
            .map_err(|e| spawn_error(format!("Failed to create worker dir: {}", e)))?;
        let script_path = workdir.path().join(SCRIPT_FILE);
        tokio::fs::write(&script_path, script)
            .await
            .map_err(|e| spawn_error(format!("Failed to write worker script: {}", e)))?;

        let mut child = Command::new(&config.interpreter)
            .arg(&script_path)
            .current_dir(workdir.path())
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(format!("Failed to spawn {}: {}", config.interpreter, e)))?;

        debug!("Spawned worker pid {:?} in {:?}", child.id(), workdir.path());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("Worker stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("Worker stderr was not captured".to_string()))?;

        Ok(Self {
            stdout: read_all(stdout),
            stderr: read_all(stderr),
            child,
            writer: None,
            started: Instant::now(),
            grace: Duration::from_millis(config.kill_grace_ms),
            _workdir: workdir,
        })
    }

    /// Feed the payload and close stdin. Runs in the background so a worker
    /// that never reads cannot stall the deadline.
    pub fn write_payload(&mut self, payload: Vec<u8>) -> Result<()> {
        let mut stdin = self
            .child
            .stdin
            .take()
            .ok_or_else(|| spawn_error("Worker stdin is already closed".to_string()))?;

        self.writer = Some(tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        }));
        Ok(())
    }

    /// Wait for exit or kill the worker once `deadline` has passed since spawn
    pub async fn finish(mut self, deadline: Duration) -> Result<WorkerExit> {
        let expires = self.started + deadline;

        let status = tokio::select! {
            biased;
            status = self.child.wait() => Some(status),
            _ = tokio::time::sleep_until(expires) => None,
        };

        let Some(status) = status else {
            warn!("Worker exceeded {} ms deadline; killing", deadline.as_millis());
            // kill() sends SIGKILL and reaps the child
            if let Err(e) = self.child.kill().await {
                warn!("Failed to kill worker: {}", e);
            }
            self.settle_writer().await;
            let stderr = drain(self.stderr, self.grace).await;
            self.stdout.abort();
            return Ok(WorkerExit::TimedOut { stderr, elapsed: self.started.elapsed() });
        };

        let status = status.map_err(|e| spawn_error(format!("Failed to wait for worker: {}", e)))?;
        self.settle_writer().await;
        let stdout = drain(self.stdout, self.grace).await;
        let stderr = drain(self.stderr, self.grace).await;
        let elapsed = self.started.elapsed();

        debug!("Worker exited with {} after {} ms", status, elapsed.as_millis());
        Ok(WorkerExit::Finished { status, stdout, stderr, elapsed })
    }

    async fn settle_writer(&mut self) {
        let Some(writer) = self.writer.take() else { return };
        match tokio::time::timeout(self.grace, writer).await {
            Ok(Ok(Ok(()))) => {}
            // An early-exiting worker closes its end first
            Ok(Ok(Err(e))) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("Worker closed stdin before reading the whole payload");
            }
            Ok(Ok(Err(e))) => warn!("Failed to write worker payload: {}", e),
            Ok(Err(e)) => warn!("Payload writer task failed: {}", e),
            Err(_) => debug!("Payload writer still blocked after worker exit"),
        }
    }
}

async fn drain(handle: JoinHandle<Vec<u8>>, grace: Duration) -> String {
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            // A grandchild may still hold the pipe open
            abort.abort();
            String::new()
        }
    }
}
