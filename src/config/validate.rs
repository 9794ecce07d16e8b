// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ClassifyRules, ConfigFile, RawConfigFile};
use crate::errors::{Result, WorkerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WorkerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let rules = compile_rules(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, rules))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_programs(cfg)?;
    validate_defaults(cfg)?;
    validate_monitor(cfg)?;
    Ok(())
}

fn validate_programs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.assistant.program.trim().is_empty() {
        return Err(WorkerError::ConfigError(
            "[assistant].program must not be empty".to_string(),
        ));
    }
    if cfg.notify.program.trim().is_empty() {
        return Err(WorkerError::ConfigError(
            "[notify].program must not be empty".to_string(),
        ));
    }
    if !cfg.notify.args.iter().any(|a| a.contains("{message}")) {
        return Err(WorkerError::ConfigError(
            "[notify].args must contain a \"{message}\" placeholder".to_string(),
        ));
    }
    if cfg.notify.timeout_secs == 0 {
        return Err(WorkerError::ConfigError(
            "[notify].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.notify.default_target.trim().is_empty() {
        return Err(WorkerError::ConfigError(
            "[notify].default_target must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_defaults(cfg: &RawConfigFile) -> Result<()> {
    validate_budget(cfg.defaults.budget)
        .map_err(|e| WorkerError::ConfigError(format!("[defaults].budget: {e}")))
}

fn validate_monitor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.monitor.poll_interval_secs == 0 {
        return Err(WorkerError::ConfigError(
            "[monitor].poll_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.monitor.tail_bytes < 256 {
        return Err(WorkerError::ConfigError(format!(
            "[monitor].tail_bytes must be >= 256 (got {})",
            cfg.monitor.tail_bytes
        )));
    }
    Ok(())
}

fn compile_rules(cfg: &RawConfigFile) -> Result<ClassifyRules> {
    Ok(ClassifyRules {
        failure: compile_patterns("failure_patterns", &cfg.monitor.failure_patterns)?,
        success: compile_patterns("success_patterns", &cfg.monitor.success_patterns)?,
    })
}

fn compile_patterns(field: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                WorkerError::ConfigError(format!(
                    "[monitor].{field}: invalid regex '{p}': {e}"
                ))
            })
        })
        .collect()
}

/// Check a spend ceiling: finite and strictly positive.
///
/// Shared by config validation and the `spawn --budget` flag.
pub fn validate_budget(budget: f64) -> std::result::Result<(), String> {
    if !budget.is_finite() || budget <= 0.0 {
        return Err(format!("budget must be a positive number (got {budget})"));
    }
    Ok(())
}
