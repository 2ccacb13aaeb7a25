//! OS-level process probing and signalling

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, Signal, System};

/// What the operating system reports for a pid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsProcessState {
    /// Alive, with the OS scheduler state (`Sleep`, `Run`, ...)
    Running(String),
    /// Exited but not yet reaped by its parent
    Exited,
    /// No such process, or not visible to us
    Missing,
}

/// Outcome of asking the OS to terminate a pid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// SIGTERM delivered
    Delivered,
    /// The platform has no SIGTERM equivalent
    Unsupported,
    /// The signal could not be delivered
    Failed,
    /// The pid was not found
    Gone,
}

fn refreshed(pid: Pid) -> System {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys
}

/// Look up a pid without touching any registry
pub fn probe(pid: u32) -> OsProcessState {
    let pid = Pid::from_u32(pid);
    let sys = refreshed(pid);

    match sys.process(pid) {
        Some(process) => match process.status() {
            ProcessStatus::Zombie | ProcessStatus::Dead => OsProcessState::Exited,
            status => OsProcessState::Running(status.to_string()),
        },
        None => OsProcessState::Missing,
    }
}

/// Send SIGTERM to a pid
pub fn terminate(pid: u32) -> SignalOutcome {
    let pid = Pid::from_u32(pid);
    let sys = refreshed(pid);

    match sys.process(pid) {
        Some(process) => match process.kill_with(Signal::Term) {
            Some(true) => SignalOutcome::Delivered,
            Some(false) => SignalOutcome::Failed,
            None => SignalOutcome::Unsupported,
        },
        None => SignalOutcome::Gone,
    }
}
