use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bgworker::errors::{Result, WorkerError};
use bgworker::exec::{LaunchRequest, LaunchedProcess, ProcessLauncher, ProcessTable, SignalOutcome};
use bgworker::notify::Notifier;

#[derive(Debug, Default)]
struct TableState {
    alive: HashSet<u32>,
    /// pids that survive SIGTERM.
    stubborn: HashSet<u32>,
    signals: Vec<(u32, &'static str)>,
}

/// A process table where "alive" is just membership in a set.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessTable {
    state: Arc<Mutex<TableState>>,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, pid: u32) {
        self.state.lock().unwrap().alive.insert(pid);
    }

    /// Simulate the process exiting on its own.
    pub fn exit(&self, pid: u32) {
        self.state.lock().unwrap().alive.remove(&pid);
    }

    /// Make `pid` ignore SIGTERM.
    pub fn ignore_sigterm(&self, pid: u32) {
        self.state.lock().unwrap().stubborn.insert(pid);
    }

    /// Signals sent so far, as `(pid, "SIGTERM" | "SIGKILL")`.
    pub fn signals(&self) -> Vec<(u32, &'static str)> {
        self.state.lock().unwrap().signals.clone()
    }
}

impl ProcessTable for FakeProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().unwrap().alive.contains(&pid)
    }

    fn terminate_group(&self, pid: u32) -> Result<SignalOutcome> {
        let mut state = self.state.lock().unwrap();
        if !state.alive.contains(&pid) {
            return Ok(SignalOutcome::AlreadyExited);
        }
        state.signals.push((pid, "SIGTERM"));
        if !state.stubborn.contains(&pid) {
            state.alive.remove(&pid);
        }
        Ok(SignalOutcome::Delivered)
    }

    fn kill_group(&self, pid: u32) -> Result<SignalOutcome> {
        let mut state = self.state.lock().unwrap();
        if !state.alive.remove(&pid) {
            return Ok(SignalOutcome::AlreadyExited);
        }
        state.signals.push((pid, "SIGKILL"));
        Ok(SignalOutcome::Delivered)
    }
}

/// A launcher that:
/// - records every request
/// - optionally blocks for a while, like a slow `spawn(2)`
/// - creates the (empty) log file
/// - hands out increasing fake pids and marks them alive in the table.
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    processes: FakeProcessTable,
    requests: Arc<Mutex<Vec<LaunchRequest>>>,
    next_pid: Arc<AtomicU32>,
    fail: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
}

impl FakeLauncher {
    pub fn new(processes: FakeProcessTable) -> Self {
        Self {
            processes,
            requests: Arc::new(Mutex::new(Vec::new())),
            next_pid: Arc::new(AtomicU32::new(4000)),
            fail: Arc::new(AtomicBool::new(false)),
            delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make subsequent launches fail with `SpawnFailed`.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Block the calling thread for `delay` inside every launch.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchedProcess> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(WorkerError::SpawnFailed {
                name: request.name.clone(),
                reason: format!("'{}' not found on PATH", request.program),
            });
        }

        if let Some(parent) = request.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&request.log_path, b"")?;

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.processes.start(pid);
        Ok(LaunchedProcess { pid, child: None })
    }
}

/// A notifier that records `(target, message)` pairs.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with `NotifyFailed` (still recorded).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(
        &'a self,
        target: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        let sent = Arc::clone(&self.sent);
        let fail = self.fail.load(Ordering::SeqCst);

        Box::pin(async move {
            sent.lock()
                .unwrap()
                .push((target.to_string(), message.to_string()));
            if fail {
                return Err(WorkerError::NotifyFailed {
                    target: target.to_string(),
                    reason: "unreachable target".to_string(),
                });
            }
            Ok(())
        })
    }
}
