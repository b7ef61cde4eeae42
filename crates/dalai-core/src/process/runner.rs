//! Supervised execution of external commands.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::command::{CommandSpec, RunOutcome};
use super::observer::{ObserverAction, OutputObserver, OutputStream};
use crate::{DalaiError, Result};

/// Runs external commands to completion, one at a time.
///
/// The stager and builders only talk to this trait so the pipeline can be
/// driven without spawning real tools.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command`, feeding every output line to `observer`, and wait until
    /// it exits or the observer stops it.
    async fn run(
        &self,
        command: &CommandSpec,
        observer: &mut dyn OutputObserver,
    ) -> Result<RunOutcome>;

    /// Like [`run`](Self::run) but an unsuccessful outcome is an error.
    async fn run_checked(
        &self,
        command: &CommandSpec,
        observer: &mut dyn OutputObserver,
    ) -> Result<RunOutcome> {
        let outcome = self.run(command, observer).await?;
        if !outcome.success() {
            return Err(DalaiError::ProcessFailed {
                command: command.to_string(),
                code: outcome.exit_code,
            });
        }
        Ok(outcome)
    }
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any command still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn timeout_error(&self, command: &CommandSpec) -> DalaiError {
        DalaiError::Timeout {
            command: command.to_string(),
            after: self.timeout.unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        observer: &mut dyn OutputObserver,
    ) -> Result<RunOutcome> {
        info!("Running '{}' in {}", command, command.current_dir.display());

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DalaiError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let tag = command.program_name();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DalaiError::Other("stdout was not piped".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DalaiError::Other("stderr was not piped".into()))?;
        // Split on raw bytes: tools may print in a non-UTF-8 codepage and the
        // pipes must be drained regardless.
        let mut out_lines = BufReader::new(stdout).split(b'\n');
        let mut err_lines = BufReader::new(stderr).split(b'\n');
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            let received = tokio::select! {
                res = out_lines.next_segment(), if out_open => {
                    next_line(res, OutputStream::Stdout, &mut out_open)
                }
                res = err_lines.next_segment(), if err_open => {
                    next_line(res, OutputStream::Stderr, &mut err_open)
                }
                _ = sleep_until(deadline) => {
                    stop(&mut child, &tag).await;
                    return Err(self.timeout_error(command));
                }
            };

            let Some((stream, line)) = received else {
                continue;
            };
            debug!("[{}] {}: {}", tag, stream, line);

            if observer.on_line(stream, &line) == ObserverAction::Terminate {
                info!("Stopping '{}' at observer request", command);
                stop(&mut child, &tag).await;
                return Ok(RunOutcome::terminated());
            }
        }

        let status = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    stop(&mut child, &tag).await;
                    return Err(self.timeout_error(command));
                }
            },
            None => child.wait().await,
        }
        .map_err(|e| DalaiError::io("waiting for process", &command.current_dir, e))?;

        if !status.success() {
            warn!("'{}' exited with status {}", command, status);
        }
        Ok(RunOutcome::exited(status.code()))
    }
}

/// Decode one raw line, closing the stream only on EOF or a read error.
fn next_line(
    res: std::io::Result<Option<Vec<u8>>>,
    stream: OutputStream,
    open: &mut bool,
) -> Option<(OutputStream, String)> {
    match res {
        Ok(Some(mut raw)) => {
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            Some((stream, String::from_utf8_lossy(&raw).into_owned()))
        }
        Ok(None) => {
            *open = false;
            None
        }
        Err(e) => {
            warn!("Error reading subprocess {}: {}", stream, e);
            *open = false;
            None
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Kill and reap the child so no process outlives the call.
async fn stop(child: &mut Child, tag: &str) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill {}: {}", tag, e);
    }
}
