// src/errors.rs

//! Crate-wide error taxonomy and `Result` alias.
//!
//! Every failure the operator can see maps to one of the kinds below; the
//! binary prints [`WorkerError::kind`] next to the message and exits non-zero.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::WorkerStatus;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker '{0}' is already running")]
    DuplicateWorker(String),

    #[error("no worker named '{0}'")]
    UnknownWorker(String),

    #[error("worker '{name}' is not running (status: {status})")]
    NotRunning { name: String, status: WorkerStatus },

    #[error("failed to launch worker '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },

    #[error("worker state file {path:?} is unreadable: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("notification to '{target}' failed: {reason}")]
    NotifyFailed { target: String, reason: String },

    #[error("invalid worker name '{0}' (use letters, digits, '.', '_' or '-', max 64 chars)")]
    InvalidName(String),

    #[error("invalid budget {0} (must be a positive number)")]
    InvalidBudget(f64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkerError {
    /// Stable label for the failure kind, printed by the command surface.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::DuplicateWorker(_) => "DuplicateWorker",
            WorkerError::UnknownWorker(_) => "UnknownWorker",
            WorkerError::NotRunning { .. } => "NotRunning",
            WorkerError::SpawnFailed { .. } => "SpawnFailed",
            WorkerError::CorruptState { .. } => "CorruptState",
            WorkerError::NotifyFailed { .. } => "NotifyFailed",
            WorkerError::InvalidName(_) => "InvalidName",
            WorkerError::InvalidBudget(_) => "InvalidBudget",
            WorkerError::ConfigError(_) | WorkerError::TomlError(_) => "ConfigError",
            WorkerError::IoError(_) => "IoError",
            WorkerError::JsonError(_) => "JsonError",
            WorkerError::Other(_) => "Error",
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkerError>;
