// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`launcher`] starts worker processes detached from the caller, with
//!   output redirected to a per-worker log file. The `ProcessLauncher` trait
//!   lets tests swap in a fake.
//! - [`process`] queries the OS process table and signals process groups via
//!   the `ProcessTable` trait.

pub mod launcher;
pub mod process;

pub use launcher::{
    DetachedLauncher, LaunchRequest, LaunchedProcess, ProcessLauncher, assistant_args, discard_log,
};
pub use process::{ProcessTable, RealProcessTable, SignalOutcome};
