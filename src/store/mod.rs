// src/store/mod.rs

//! Worker Record Store.
//!
//! The store is a mapping from worker name to [`WorkerRecord`], persisted as
//! one JSON document. Every mutation is a full load → mutate → save cycle;
//! nothing caches the mapping between operations.
//!
//! - [`json_file`] is the production store (advisory lock + atomic rename).
//! - [`memory`] is an in-process store for tests.

pub mod json_file;
pub mod memory;
pub mod record;

use std::collections::BTreeMap;
use std::fmt::Debug;

use tracing::warn;

use crate::errors::Result;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use record::WorkerRecord;

/// All records, keyed (and listed) by worker name.
pub type WorkerMap = BTreeMap<String, WorkerRecord>;

/// Abstract record store.
///
/// Implementations only need `load` and `save`; `update` should be
/// overridden when the backend can make the read-modify-write cycle
/// exclusive.
pub trait WorkerStore: Send + Sync + Debug {
    /// Read the whole mapping. A store that was never written is empty.
    fn load(&self) -> Result<WorkerMap>;

    /// Replace the whole persisted mapping.
    fn save(&self, workers: &WorkerMap) -> Result<()>;

    /// Human-readable location, shown by `status`.
    fn location(&self) -> String;

    /// Load, apply `mutate`, save. Nothing is written if `mutate` fails or
    /// leaves the mapping unchanged.
    fn update(&self, mutate: &mut dyn FnMut(&mut WorkerMap) -> Result<()>) -> Result<()> {
        let mut workers = self.load()?;
        let before = workers.clone();
        mutate(&mut workers)?;
        if workers == before {
            return Ok(());
        }
        self.save(&workers)
    }

    /// Insert or replace the record under `record.name`.
    fn upsert(&self, record: WorkerRecord) -> Result<()> {
        let mut record = Some(record);
        self.update(&mut |workers| {
            if let Some(r) = record.take() {
                workers.insert(r.name.clone(), r);
            }
            Ok(())
        })
    }

    /// Delete the record named `name`, returning it if it existed.
    fn remove(&self, name: &str) -> Result<Option<WorkerRecord>> {
        let mut removed = None;
        self.update(&mut |workers| {
            removed = workers.remove(name);
            Ok(())
        })?;
        Ok(removed)
    }

    /// Like `load`, but a corrupt or unreadable store reads as empty.
    ///
    /// Used by read-only paths (`list`, `status`) so a damaged state file
    /// never hides the tool behind an error.
    fn load_or_empty(&self) -> WorkerMap {
        match self.load() {
            Ok(workers) => workers,
            Err(e) => {
                warn!(store = %self.location(), error = %e, "ignoring unreadable worker state");
                WorkerMap::new()
            }
        }
    }
}
