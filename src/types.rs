use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a worker record.
///
/// - `Running`: spawned and not yet observed to exit.
/// - `Completed` / `Failed`: the monitor saw the process exit and classified
///   its log tail.
/// - `Killed`: terminated by the operator via `kill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Running,
    Completed,
    Failed,
    Killed,
}

impl WorkerStatus {
    /// Any status other than `Running`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkerStatus::Running)
    }

    /// Terminal states that trigger a completion notification.
    ///
    /// Killed workers were stopped by the operator, so nobody is told.
    pub fn notifies(self) -> bool {
        matches!(self, WorkerStatus::Completed | WorkerStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Running => "running",
            WorkerStatus::Completed => "completed",
            WorkerStatus::Failed => "failed",
            WorkerStatus::Killed => "killed",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(WorkerStatus::Running),
            "completed" => Ok(WorkerStatus::Completed),
            "failed" => Ok(WorkerStatus::Failed),
            "killed" => Ok(WorkerStatus::Killed),
            other => Err(format!(
                "invalid worker status: {other} (expected running, completed, failed or killed)"
            )),
        }
    }
}

/// Model passed to the assistant CLI via `--model`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    #[default]
    Haiku,
    Sonnet,
    Opus,
}

impl Model {
    pub fn as_str(self) -> &'static str {
        match self {
            Model::Haiku => "haiku",
            Model::Sonnet => "sonnet",
            Model::Opus => "opus",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "haiku" => Ok(Model::Haiku),
            "sonnet" => Ok(Model::Sonnet),
            "opus" => Ok(Model::Opus),
            other => Err(format!(
                "invalid model: {other} (expected \"haiku\", \"sonnet\" or \"opus\")"
            )),
        }
    }
}
