// src/config/mod.rs

//! Configuration loading and validation for bgworker.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or fall back to defaults (`loader.rs`).
//! - Validate budgets, timeouts and classifier patterns (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_effective, load_from_path};
pub use model::{
    AssistantSection, ClassifyRules, ConfigFile, DefaultsSection, MonitorSection, NotifySection,
    PathsSection, RawConfigFile,
};
pub use validate::validate_budget;
