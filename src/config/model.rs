// src/config/model.rs

use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;

use crate::types::Model;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [paths]
/// state_file = "/tmp/bgworker/workers.json"
/// logs_dir = "/tmp/bgworker/logs"
///
/// [assistant]
/// program = "claude"
///
/// [notify]
/// program = "openclaw"
/// args = ["agent", "--agent", "{target}", "-m", "{message}"]
/// default_target = "main"
///
/// [defaults]
/// model = "haiku"
/// budget = 2.0
///
/// [monitor]
/// poll_interval_secs = 5
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub assistant: AssistantSection,

    #[serde(default)]
    pub notify: NotifySection,

    #[serde(default)]
    pub defaults: DefaultsSection,

    #[serde(default)]
    pub monitor: MonitorSection,
}

/// `[paths]` section: where state and logs live.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

fn default_base_dir() -> PathBuf {
    std::env::temp_dir().join("bgworker")
}

fn default_state_file() -> PathBuf {
    default_base_dir().join("workers.json")
}

fn default_logs_dir() -> PathBuf {
    default_base_dir().join("logs")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// `[assistant]` section: the external AI CLI each worker runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantSection {
    #[serde(default = "default_assistant_program")]
    pub program: String,

    /// Extra arguments inserted before the prompt.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_assistant_program() -> String {
    "claude".to_string()
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            program: default_assistant_program(),
            extra_args: Vec::new(),
        }
    }
}

/// `[notify]` section: the external messaging command.
///
/// `{target}` and `{message}` placeholders in `args` are substituted per
/// notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifySection {
    #[serde(default = "default_notify_program")]
    pub program: String,

    #[serde(default = "default_notify_args")]
    pub args: Vec<String>,

    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_notify_target")]
    pub default_target: String,
}

fn default_notify_program() -> String {
    "openclaw".to_string()
}

fn default_notify_args() -> Vec<String> {
    ["agent", "--agent", "{target}", "-m", "{message}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_notify_timeout_secs() -> u64 {
    30
}

fn default_notify_target() -> String {
    "main".to_string()
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            program: default_notify_program(),
            args: default_notify_args(),
            timeout_secs: default_notify_timeout_secs(),
            default_target: default_notify_target(),
        }
    }
}

/// `[defaults]` section: values used when `spawn` flags are omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsSection {
    #[serde(default)]
    pub model: Model,

    #[serde(default = "default_budget")]
    pub budget: f64,
}

fn default_budget() -> f64 {
    2.0
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            model: Model::default(),
            budget: default_budget(),
        }
    }
}

/// `[monitor]` section: poll cadence, kill escalation and log classification.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSection {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds to wait after SIGTERM before SIGKILL. `0` disables escalation.
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,

    /// How many bytes from the end of a log the classifier reads.
    #[serde(default = "default_tail_bytes")]
    pub tail_bytes: u64,

    /// Regexes that mark a finished worker as failed.
    #[serde(default = "default_failure_patterns")]
    pub failure_patterns: Vec<String>,

    /// Regexes that mark a finished worker as completed.
    #[serde(default)]
    pub success_patterns: Vec<String>,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_kill_grace_secs() -> u64 {
    5
}

fn default_tail_bytes() -> u64 {
    16 * 1024
}

fn default_failure_patterns() -> Vec<String> {
    vec![
        r"(?i)^error[: ]".to_string(),
        r"(?i)traceback \(most recent call last\)".to_string(),
        r"(?i)\bapi error\b".to_string(),
    ]
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            kill_grace_secs: default_kill_grace_secs(),
            tail_bytes: default_tail_bytes(),
            failure_patterns: default_failure_patterns(),
            success_patterns: Vec::new(),
        }
    }
}

/// Compiled marker patterns used by the log classifier.
#[derive(Debug, Clone, Default)]
pub struct ClassifyRules {
    pub failure: Vec<Regex>,
    pub success: Vec<Regex>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on budgets being positive and patterns compiling.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub assistant: AssistantSection,
    pub notify: NotifySection,
    pub defaults: DefaultsSection,
    pub monitor: MonitorSection,
    pub rules: ClassifyRules,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, rules: ClassifyRules) -> Self {
        Self {
            paths: raw.paths,
            assistant: raw.assistant,
            notify: raw.notify,
            defaults: raw.defaults,
            monitor: raw.monitor,
            rules,
        }
    }

    /// Replace the state file / logs dir, e.g. from CLI overrides.
    pub fn with_paths(mut self, state_file: Option<PathBuf>, logs_dir: Option<PathBuf>) -> Self {
        if let Some(p) = state_file {
            self.paths.state_file = p;
        }
        if let Some(p) = logs_dir {
            self.paths.logs_dir = p;
        }
        self
    }
}
