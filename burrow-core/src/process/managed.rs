//! A detached child process and its captured output

use super::status::SignalOutcome;
use crate::error::{BurrowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Where a detached process writes its stdout/stderr
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Pipe both streams into a bounded in-memory tail
    Capture,
    /// Redirect both streams into a file
    LogFile(PathBuf),
}

/// Bounded buffer of the most recent output lines
#[derive(Debug, Clone)]
pub struct LogTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogTail {
    /// Create a tail keeping at most `capacity` lines
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    /// Append a line, evicting the oldest when full
    pub async fn push(&self, line: String) {
        let mut lines = self.lines.lock().await;
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Copy of the retained lines, oldest first
    pub async fn snapshot(&self) -> Vec<String> {
        self.lines.lock().await.iter().cloned().collect()
    }
}

/// Captured output of a managed process
#[derive(Debug, Clone)]
pub enum ProcessOutput {
    /// In-memory tail of both streams
    Captured(LogTail),
    /// Streams were redirected to this file
    LogFile(PathBuf),
}

/// Identity of a registered process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// OS process id
    pub pid: u32,
    /// Registry-assigned generation, unique per registration
    pub generation: u64,
    /// Command line that started it
    pub label: String,
    /// When it was started
    pub started_at: DateTime<Utc>,
}

/// How an explicit stop request ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StopOutcome {
    /// SIGTERM (or the platform equivalent) was sent
    Terminated,
    /// The process had already exited; nothing was signalled
    AlreadyExited {
        /// Exit description, e.g. `0` or `signal 15`
        exit: String,
    },
}

/// A detached child owned by the registry
#[derive(Debug)]
pub struct ManagedProcess {
    info: ProcessInfo,
    child: Child,
    output: ProcessOutput,
    exit: Option<ExitStatus>,
}

impl ManagedProcess {
    /// Spawn `command` detached, wiring its output per `mode`
    pub fn spawn(
        mut command: Command,
        label: impl Into<String>,
        generation: u64,
        mode: OutputMode,
        tail_lines: usize,
    ) -> Result<Self> {
        let label = label.into();
        command.stdin(Stdio::null()).kill_on_drop(false);

        let output = match &mode {
            OutputMode::Capture => {
                command.stdout(Stdio::piped()).stderr(Stdio::piped());
                ProcessOutput::Captured(LogTail::new(tail_lines))
            }
            OutputMode::LogFile(path) => {
                let file = std::fs::File::create(path)?;
                let err_file = file.try_clone()?;
                command.stdout(Stdio::from(file)).stderr(Stdio::from(err_file));
                ProcessOutput::LogFile(path.clone())
            }
        };

        let mut child = command
            .spawn()
            .map_err(|e| BurrowError::Execution(format!("Failed to start `{}`: {}", label, e)))?;

        let pid = child.id().ok_or_else(|| {
            BurrowError::Execution(format!("`{}` exited before its pid was read", label))
        })?;

        if let ProcessOutput::Captured(tail) = &output {
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(drain(stdout, tail.clone(), None));
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(drain(stderr, tail.clone(), Some("[stderr] ")));
            }
        }

        info!("Started process {} (PID: {}, generation: {})", label, pid, generation);

        Ok(Self {
            info: ProcessInfo {
                pid,
                generation,
                label,
                started_at: Utc::now(),
            },
            child,
            output,
            exit: None,
        })
    }

    /// Registry identity
    pub fn info(&self) -> &ProcessInfo {
        &self.info
    }

    /// Captured output handle
    pub fn output(&self) -> &ProcessOutput {
        &self.output
    }

    /// Check for exit without blocking; the status is cached once seen
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.exit.is_none() {
            match self.child.try_wait() {
                Ok(status) => self.exit = status,
                Err(e) => warn!("Failed to poll process {}: {}", self.info.pid, e),
            }
        }
        self.exit
    }

    /// Request termination through `send`.
    ///
    /// A process already observed as exited is never signalled, since its
    /// pid may now belong to an unrelated process. On error the handle is
    /// left intact so the caller can keep tracking it.
    pub fn signal(&mut self, send: impl FnOnce(u32) -> SignalOutcome) -> Result<StopOutcome> {
        let pid = self.info.pid;

        if let Some(status) = self.poll_exit() {
            return Ok(StopOutcome::AlreadyExited {
                exit: describe_exit(&status),
            });
        }

        match send(pid) {
            SignalOutcome::Delivered => Ok(StopOutcome::Terminated),
            SignalOutcome::Unsupported => {
                self.child.start_kill()?;
                Ok(StopOutcome::Terminated)
            }
            SignalOutcome::Gone => match self.poll_exit() {
                Some(status) => Ok(StopOutcome::AlreadyExited {
                    exit: describe_exit(&status),
                }),
                None => Ok(StopOutcome::Terminated),
            },
            SignalOutcome::Failed => Err(BurrowError::Execution(format!(
                "Failed to send SIGTERM to process {}",
                pid
            ))),
        }
    }

    /// Hand the child to a background task that waits for its exit
    pub fn reap(self) {
        let pid = self.info.pid;
        let mut child = self.child;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("Process {} exited ({})", pid, describe_exit(&status)),
                Err(e) => warn!("Error waiting for process {}: {}", pid, e),
            }
        });
    }
}

async fn drain<R>(reader: R, tail: LogTail, prefix: Option<&'static str>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match prefix {
                Some(prefix) => tail.push(format!("{}{}", prefix, line)).await,
                None => tail.push(line).await,
            },
            Ok(None) => break,
            Err(e) => {
                debug!("Output stream closed with error: {}", e);
                break;
            }
        }
    }
}

/// Render an exit status as `0`, `signal 15`, or `unknown`
pub fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return code.to_string();
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {}", signal);
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod managed_tests {
    use super::*;

    #[tokio::test]
    async fn test_log_tail_evicts_oldest() {
        let tail = LogTail::new(2);
        tail.push("a".into()).await;
        tail.push("b".into()).await;
        tail.push("c".into()).await;
        assert_eq!(tail.snapshot().await, vec!["b".to_string(), "c".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_both_streams() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo out; echo err >&2");

        let mut process = ManagedProcess::spawn(command, "sh", 1, OutputMode::Capture, 10).unwrap();

        for _ in 0..100 {
            if process.poll_exit().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        // let the drain tasks catch up with the closed pipes
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let ProcessOutput::Captured(tail) = process.output() else {
            panic!("expected captured output");
        };
        let lines = tail.snapshot().await;
        assert!(lines.contains(&"out".to_string()));
        assert!(lines.contains(&"[stderr] err".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_describe_exit_code() {
        let status = Command::new("sh").arg("-c").arg("exit 3").status().await.unwrap();
        assert_eq!(describe_exit(&status), "3");
    }
}
