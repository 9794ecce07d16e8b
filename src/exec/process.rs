// src/exec/process.rs

//! OS process table access: liveness checks and process-group signals.

use std::fmt::Debug;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use tracing::debug;

use crate::errors::{Result, WorkerError};

/// Result of signalling a process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Delivered,
    /// No such process group; the worker was already gone.
    AlreadyExited,
}

/// Trait abstracting the OS process table.
///
/// Production code uses [`RealProcessTable`]; tests provide a fake that keeps
/// a set of "alive" pids.
pub trait ProcessTable: Send + Sync + Debug {
    /// Whether `pid` still names a live (non-zombie) process.
    fn is_alive(&self, pid: u32) -> bool;

    /// Send SIGTERM to the process group led by `pid`.
    fn terminate_group(&self, pid: u32) -> Result<SignalOutcome>;

    /// Send SIGKILL to the process group led by `pid`.
    fn kill_group(&self, pid: u32) -> Result<SignalOutcome>;
}

/// Process table backed by `kill(2)` / `killpg(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealProcessTable;

impl RealProcessTable {
    fn signal_group(&self, pid: u32, signal: Signal) -> Result<SignalOutcome> {
        let Some(pgid) = to_pid(pid) else {
            return Ok(SignalOutcome::AlreadyExited);
        };
        match killpg(pgid, signal) {
            Ok(()) => {
                debug!(pid, ?signal, "signalled process group");
                Ok(SignalOutcome::Delivered)
            }
            Err(Errno::ESRCH) => Ok(SignalOutcome::AlreadyExited),
            Err(e) => Err(WorkerError::IoError(std::io::Error::from(e))),
        }
    }
}

impl ProcessTable for RealProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        let Some(p) = to_pid(pid) else {
            return false;
        };
        match kill(p, None::<Signal>) {
            Ok(()) => !is_zombie(pid),
            // Exists, but owned by someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn terminate_group(&self, pid: u32) -> Result<SignalOutcome> {
        self.signal_group(pid, Signal::SIGTERM)
    }

    fn kill_group(&self, pid: u32) -> Result<SignalOutcome> {
        self.signal_group(pid, Signal::SIGKILL)
    }
}

/// pid 0 and values past `i32::MAX` would address groups or every process.
fn to_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

/// An exited child nobody has reaped yet still answers `kill(pid, 0)`.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // Format: "<pid> (<comm>) <state> ...". comm may itself contain ')'.
    stat.rfind(')')
        .and_then(|idx| stat[idx + 1..].trim_start().chars().next())
        .is_some_and(|state| state == 'Z' || state == 'X')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}
