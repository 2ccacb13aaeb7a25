//! Detached process tracking
//!
//! The [`ProcessRegistry`] maps OS pids to the live [`ManagedProcess`]
//! handles it exclusively owns. Entries are added when the runner launches
//! something detached and removed only by an explicit stop; a process that
//! exits on its own keeps its entry, and its exit status is cached the
//! first time it is observed.
//!
//! Until that observation the child stays unreaped, so the OS cannot hand
//! its pid to another process while the entry still names it.

mod managed;
mod status;

pub use managed::{
    LogTail, ManagedProcess, OutputMode, ProcessInfo, ProcessOutput, StopOutcome, describe_exit,
};
pub use status::{OsProcessState, SignalOutcome, probe};

use crate::error::{BurrowError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Registry-side view of one process, taken without removing it
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    /// Registry identity
    pub info: ProcessInfo,
    /// Exit description if the process has finished
    pub exit: Option<String>,
    /// Captured output handle
    pub output: ProcessOutput,
}

/// In-memory table of detached processes keyed by pid
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    entries: Arc<RwLock<HashMap<u32, ManagedProcess>>>,
    next_generation: Arc<AtomicU64>,
    tail_lines: usize,
}

impl ProcessRegistry {
    /// Create a registry keeping `tail_lines` of output per captured process
    pub fn new(tail_lines: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
            tail_lines,
        }
    }

    /// Launch `command` detached and register it
    pub async fn spawn(
        &self,
        command: Command,
        label: impl Into<String>,
        mode: OutputMode,
    ) -> Result<ProcessInfo> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let process = ManagedProcess::spawn(command, label, generation, mode, self.tail_lines)?;
        Ok(self.register(process).await)
    }

    /// Register an already spawned process
    pub async fn register(&self, process: ManagedProcess) -> ProcessInfo {
        let info = process.info().clone();
        let mut entries = self.entries.write().await;

        if let Some(previous) = entries.insert(info.pid, process) {
            warn!(
                "PID {} reused; replacing stale entry from generation {}",
                info.pid,
                previous.info().generation
            );
        }

        info
    }

    /// Remove and terminate a registered process
    ///
    /// A process whose signal could not be delivered stays registered.
    pub async fn stop(&self, pid: u32) -> Result<StopOutcome> {
        self.stop_with(pid, status::terminate).await
    }

    async fn stop_with(
        &self,
        pid: u32,
        send: impl FnOnce(u32) -> SignalOutcome,
    ) -> Result<StopOutcome> {
        let mut entries = self.entries.write().await;
        let Some(process) = entries.get_mut(&pid) else {
            return Err(BurrowError::ProcessNotFound(pid));
        };

        let outcome = process.signal(send)?;
        if let Some(process) = entries.remove(&pid) {
            process.reap();
        }
        info!("Stopped process {}: {:?}", pid, outcome);
        Ok(outcome)
    }

    /// Current registry view of a pid, refreshing its exit status
    pub async fn inspect(&self, pid: u32) -> Option<ProcessSnapshot> {
        let mut entries = self.entries.write().await;
        let process = entries.get_mut(&pid)?;
        let exit = process.poll_exit().map(|s| describe_exit(&s));

        Some(ProcessSnapshot {
            info: process.info().clone(),
            exit,
            output: process.output().clone(),
        })
    }

    /// Human-readable status for a pid.
    ///
    /// The OS is consulted regardless of registration, so this also works
    /// for pids this server never started. Registered processes add their
    /// exit code and recent output.
    pub async fn report(&self, pid: u32) -> String {
        let snapshot = self.inspect(pid).await;
        let os_state = probe(pid);

        let mut report = match (&snapshot, os_state) {
            (Some(ProcessSnapshot { exit: Some(exit), .. }), _) => {
                format!("Process {} finished. Exit code: {}", pid, exit)
            }
            (_, OsProcessState::Running(state)) => {
                format!("Process {} is running ({})", pid, state)
            }
            (_, OsProcessState::Exited) => {
                format!("Process {} finished. Exit code: unknown", pid)
            }
            (_, OsProcessState::Missing) => {
                format!("No accessible process found with PID {}", pid)
            }
        };

        if let Some(snapshot) = snapshot {
            match snapshot.output {
                ProcessOutput::Captured(tail) => {
                    let lines = tail.snapshot().await;
                    if !lines.is_empty() {
                        report.push_str("\n--- recent output ---\n");
                        report.push_str(&lines.join("\n"));
                    }
                }
                ProcessOutput::LogFile(path) => {
                    report.push_str(&format!("\nOutput is written to {}", path.display()));
                }
            }
        }

        report
    }

    /// Whether a pid is registered
    pub async fn contains(&self, pid: u32) -> bool {
        self.entries.read().await.contains_key(&pid)
    }

    /// Identities of all registered processes
    pub async fn list(&self) -> Vec<ProcessInfo> {
        let entries = self.entries.read().await;
        let mut infos: Vec<ProcessInfo> = entries.values().map(|p| p.info().clone()).collect();
        infos.sort_by_key(|info| info.generation);
        infos
    }

    /// Number of registered processes
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new(200)
    }
}
