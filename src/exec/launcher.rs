// src/exec/launcher.rs

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::AssistantSection;
use crate::errors::{Result, WorkerError};
use crate::types::Model;

/// Everything needed to start one worker process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub log_path: PathBuf,
}

/// A started worker.
///
/// `child` is only present for real processes; foreground spawns await it,
/// background spawns drop it and leave the process running.
#[derive(Debug)]
pub struct LaunchedProcess {
    pub pid: u32,
    pub child: Option<Child>,
}

/// Trait abstracting how worker processes are started.
///
/// Production code uses [`DetachedLauncher`]; tests can provide their own
/// implementation that hands out fake pids without spawning anything.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchedProcess>;
}

/// Launches workers in their own process group with stdout and stderr
/// redirected into a freshly created per-worker log file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLauncher;

impl ProcessLauncher for DetachedLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchedProcess> {
        let spawn_failed = |reason: String| WorkerError::SpawnFailed {
            name: request.name.clone(),
            reason,
        };

        if let Some(parent) = request.log_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| spawn_failed(format!("creating log dir {parent:?}: {e}")))?;
        }

        let stdout = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&request.log_path)
            .map_err(|e| spawn_failed(format!("creating log file {:?}: {e}", request.log_path)))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| spawn_failed(format!("duplicating log handle: {e}")))?;

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            // New process group so the worker outlives us and `kill` can
            // signal the whole tree.
            .process_group(0)
            .kill_on_drop(false);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                discard_log(&request.log_path);
                let reason = if e.kind() == ErrorKind::NotFound {
                    format!("'{}' not found on PATH", request.program)
                } else {
                    format!("spawning '{}': {e}", request.program)
                };
                return Err(spawn_failed(reason));
            }
        };

        let Some(pid) = child.id() else {
            discard_log(&request.log_path);
            return Err(spawn_failed("process exited before its pid was read".to_string()));
        };

        info!(worker = %request.name, pid, program = %request.program, "worker process started");
        Ok(LaunchedProcess {
            pid,
            child: Some(child),
        })
    }
}

/// Remove the log of a worker that never got going.
pub fn discard_log(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = ?path, error = %e, "could not remove log of failed launch");
        }
    }
}

/// Build the assistant CLI argument list for one worker.
///
/// `<program> --print --session-id <id> --model <m> --max-budget-usd <b>
/// --output-format json [extra_args...] <prompt>`
pub fn assistant_args(
    assistant: &AssistantSection,
    session_id: &str,
    model: Model,
    budget: f64,
    prompt: &str,
) -> Vec<String> {
    let mut args = vec![
        "--print".to_string(),
        "--session-id".to_string(),
        session_id.to_string(),
        "--model".to_string(),
        model.to_string(),
        "--max-budget-usd".to_string(),
        budget.to_string(),
        "--output-format".to_string(),
        "json".to_string(),
    ];
    args.extend(assistant.extra_args.iter().cloned());
    args.push(prompt.to_string());

    debug!(session_id, %model, budget, "assistant arguments built");
    args
}
