// src/manager.rs

//! Worker operations: spawn, list, kill, cleanup, status.
//!
//! `WorkerManager` composes the record store, launcher, process table,
//! notifier and monitor. It owns no worker state of its own; every call goes
//! back to the store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConfigFile, validate_budget};
use crate::errors::{Result, WorkerError};
use crate::exec::{
    DetachedLauncher, LaunchRequest, ProcessLauncher, ProcessTable, RealProcessTable,
    SignalOutcome, assistant_args, discard_log,
};
use crate::monitor::{Monitor, Transition};
use crate::notify::{CommandNotifier, Notifier, TEST_MESSAGE};
use crate::store::{JsonFileStore, WorkerMap, WorkerRecord, WorkerStore};
use crate::types::{Model, WorkerStatus};

const MAX_NAME_LEN: usize = 64;
const FOREGROUND_POLL: Duration = Duration::from_millis(200);
const KILL_POLL: Duration = Duration::from_millis(100);

/// Inputs to [`WorkerManager::spawn`]. `None` fields take config defaults.
#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    pub name: String,
    pub prompt: String,
    pub model: Option<Model>,
    pub budget: Option<f64>,
    pub notify_target: Option<String>,
    pub foreground: bool,
}

impl SpawnRequest {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub record: WorkerRecord,
    /// Transitions seen after a foreground worker exited.
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KillOutcome {
    pub name: String,
    pub pid: Option<u32>,
    pub signal: SignalOutcome,
    /// SIGKILL was needed after the grace period.
    pub escalated: bool,
    /// Status stored after the kill (normally `Killed`).
    pub status: WorkerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub killed: usize,
    pub total: usize,
    pub store: String,
    pub logs_dir: PathBuf,
}

pub struct WorkerManager {
    config: ConfigFile,
    store: Arc<dyn WorkerStore>,
    launcher: Arc<dyn ProcessLauncher>,
    processes: Arc<dyn ProcessTable>,
    notifier: Arc<dyn Notifier>,
    monitor: Monitor,
}

impl WorkerManager {
    pub fn new(
        config: ConfigFile,
        store: Arc<dyn WorkerStore>,
        launcher: Arc<dyn ProcessLauncher>,
        processes: Arc<dyn ProcessTable>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let monitor = Monitor::new(
            Arc::clone(&store),
            Arc::clone(&processes),
            Arc::clone(&notifier),
            config.rules.clone(),
            config.monitor.tail_bytes,
        );
        Self {
            config,
            store,
            launcher,
            processes,
            notifier,
            monitor,
        }
    }

    /// Manager wired to the JSON state file, real processes and the
    /// configured notification command.
    pub fn from_config(config: ConfigFile) -> Self {
        let store = Arc::new(JsonFileStore::new(config.paths.state_file.clone()));
        let notifier = Arc::new(CommandNotifier::from_config(&config.notify));
        Self::new(
            config,
            store,
            Arc::new(DetachedLauncher),
            Arc::new(RealProcessTable),
            notifier,
        )
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// One lazy monitor pass. Store errors are logged, not returned.
    pub async fn refresh(&self) -> Vec<Transition> {
        match self.monitor.pass().await {
            Ok(transitions) => transitions,
            Err(e) => {
                warn!(error = %e, "skipping status refresh");
                Vec::new()
            }
        }
    }

    /// Start a new worker.
    ///
    /// Fails with `DuplicateWorker` if a record with this name is still
    /// running. A terminal record with the same name is replaced. Nothing is
    /// persisted when the launch fails.
    ///
    /// The name is checked again inside the store update that saves the new
    /// record. If a concurrent spawn won, the process just started is sent
    /// SIGTERM and its log removed.
    pub async fn spawn(&self, request: SpawnRequest) -> Result<SpawnOutcome> {
        validate_name(&request.name)?;
        let budget = request.budget.unwrap_or(self.config.defaults.budget);
        validate_budget(budget).map_err(|_| WorkerError::InvalidBudget(budget))?;
        let model = request.model.unwrap_or(self.config.defaults.model);
        let notify_target = request
            .notify_target
            .clone()
            .unwrap_or_else(|| self.config.notify.default_target.clone());

        self.refresh().await;

        let workers = self.store.load()?;
        if workers.get(&request.name).is_some_and(WorkerRecord::is_running) {
            return Err(WorkerError::DuplicateWorker(request.name));
        }

        let session_id = Uuid::new_v4().to_string();
        let log_path = self
            .config
            .paths
            .logs_dir
            .join(format!("{}-{}.log", request.name, session_id));

        let launch = LaunchRequest {
            name: request.name.clone(),
            program: self.config.assistant.program.clone(),
            args: assistant_args(
                &self.config.assistant,
                &session_id,
                model,
                budget,
                &request.prompt,
            ),
            log_path: log_path.clone(),
        };
        let launched = self.launcher.launch(&launch)?;

        let record = WorkerRecord {
            name: request.name.clone(),
            prompt: request.prompt.clone(),
            model,
            budget,
            notify_target,
            pid: Some(launched.pid),
            session_id,
            status: WorkerStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            log_path,
            notified: false,
            summary: None,
            extra: Default::default(),
        };

        // Another spawn may have claimed the name while we were launching.
        let claimed = self.store.update(&mut |workers: &mut WorkerMap| {
            if workers.get(&record.name).is_some_and(WorkerRecord::is_running) {
                return Err(WorkerError::DuplicateWorker(record.name.clone()));
            }
            workers.insert(record.name.clone(), record.clone());
            Ok(())
        });
        if let Err(e) = claimed {
            self.abandon(&record, launched.pid, &e);
            return Err(e);
        }
        info!(worker = %record.name, pid = launched.pid, "worker spawned");

        if !request.foreground {
            return Ok(SpawnOutcome {
                record,
                transitions: Vec::new(),
            });
        }

        match launched.child {
            Some(mut child) => {
                let status = child.wait().await?;
                debug!(worker = %record.name, ?status, "foreground worker exited");
            }
            None => {
                while self.processes.is_alive(launched.pid) {
                    tokio::time::sleep(FOREGROUND_POLL).await;
                }
            }
        }

        let transitions = self.monitor.pass().await?;
        let record = self
            .store
            .load()?
            .remove(&record.name)
            .ok_or_else(|| WorkerError::UnknownWorker(record.name.clone()))?;

        Ok(SpawnOutcome {
            record,
            transitions,
        })
    }

    /// All records, ordered by name, after a lazy refresh.
    ///
    /// A corrupt state file reads as empty.
    pub async fn list(&self) -> Vec<WorkerRecord> {
        self.refresh().await;
        self.snapshot()
    }

    /// All records as stored, without a refresh.
    pub fn snapshot(&self) -> Vec<WorkerRecord> {
        self.store.load_or_empty().into_values().collect()
    }

    /// Terminate a running worker's process group and mark it `killed`.
    ///
    /// Killed workers are not notified.
    pub async fn kill(&self, name: &str) -> Result<KillOutcome> {
        self.refresh().await;

        let workers = self.store.load()?;
        let record = workers
            .get(name)
            .ok_or_else(|| WorkerError::UnknownWorker(name.to_string()))?;
        if !record.is_running() {
            return Err(WorkerError::NotRunning {
                name: name.to_string(),
                status: record.status,
            });
        }

        let pid = record.live_pid();
        let (signal, escalated) = match pid {
            Some(pid) => self.terminate(name, pid).await?,
            None => (SignalOutcome::AlreadyExited, false),
        };

        let now = Utc::now();
        let mut status = WorkerStatus::Killed;
        self.store.update(&mut |workers: &mut WorkerMap| {
            match workers.get_mut(name) {
                Some(r) => {
                    // The monitor may have classified it while we waited.
                    r.finish(WorkerStatus::Killed, now);
                    status = r.status;
                    Ok(())
                }
                None => Err(WorkerError::UnknownWorker(name.to_string())),
            }
        })?;

        info!(worker = %name, ?pid, ?signal, escalated, "worker killed");
        Ok(KillOutcome {
            name: name.to_string(),
            pid,
            signal,
            escalated,
            status,
        })
    }

    /// Stop a freshly launched process whose record could not be stored.
    fn abandon(&self, record: &WorkerRecord, pid: u32, cause: &WorkerError) {
        match cause {
            WorkerError::DuplicateWorker(_) => warn!(
                worker = %record.name,
                pid,
                "name taken by a concurrent spawn; stopping new process"
            ),
            _ => error!(
                worker = %record.name,
                pid,
                error = %cause,
                "worker started but its record could not be saved; stopping it"
            ),
        }
        if let Err(e) = self.processes.terminate_group(pid) {
            warn!(worker = %record.name, pid, error = %e, "could not stop abandoned worker");
        }
        discard_log(&record.log_path);
    }

    async fn terminate(&self, name: &str, pid: u32) -> Result<(SignalOutcome, bool)> {
        let signal = self.processes.terminate_group(pid)?;
        if signal == SignalOutcome::AlreadyExited || self.config.monitor.kill_grace_secs == 0 {
            return Ok((signal, false));
        }

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.monitor.kill_grace_secs);
        while tokio::time::Instant::now() < deadline {
            if !self.processes.is_alive(pid) {
                return Ok((signal, false));
            }
            tokio::time::sleep(KILL_POLL).await;
        }

        if !self.processes.is_alive(pid) {
            return Ok((signal, false));
        }
        warn!(worker = %name, pid, "worker ignored SIGTERM; sending SIGKILL");
        self.processes.kill_group(pid)?;
        Ok((signal, true))
    }

    /// Remove every terminal record; running records are left alone.
    ///
    /// Returns the removed records, ordered by name.
    pub fn cleanup(&self) -> Result<Vec<WorkerRecord>> {
        let mut removed = Vec::new();
        self.store.update(&mut |workers| {
            let terminal: Vec<String> = workers
                .values()
                .filter(|r| r.status.is_terminal())
                .map(|r| r.name.clone())
                .collect();
            for name in terminal {
                if let Some(r) = workers.remove(&name) {
                    removed.push(r);
                }
            }
            Ok(())
        })?;
        debug!(removed = removed.len(), "cleanup finished");
        Ok(removed)
    }

    /// Counts per status after a lazy refresh.
    pub async fn status(&self) -> StatusSummary {
        self.summarize(&self.list().await)
    }

    /// Counts per status over `workers`.
    pub fn summarize(&self, workers: &[WorkerRecord]) -> StatusSummary {
        let count = |s: WorkerStatus| workers.iter().filter(|w| w.status == s).count();
        StatusSummary {
            running: count(WorkerStatus::Running),
            completed: count(WorkerStatus::Completed),
            failed: count(WorkerStatus::Failed),
            killed: count(WorkerStatus::Killed),
            total: workers.len(),
            store: self.store.location(),
            logs_dir: self.config.paths.logs_dir.clone(),
        }
    }

    /// Send a fixed test message. Returns the target used.
    pub async fn test_notify(&self, target: Option<&str>) -> Result<String> {
        let target = target
            .map(str::to_string)
            .unwrap_or_else(|| self.config.notify.default_target.clone());
        self.notifier.send(&target, TEST_MESSAGE).await?;
        Ok(target)
    }
}

/// Worker names end up in log file names, so keep them path-safe.
pub fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with(['.', '-'])
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(WorkerError::InvalidName(name.to_string()))
    }
}
