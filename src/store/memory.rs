// src/store/memory.rs

use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{Result, WorkerError};
use crate::store::{WorkerMap, WorkerStore};

/// In-memory record store.
///
/// Clones share the same mapping. `set_corrupt(true)` makes every `load`
/// fail with `CorruptState`, which is how tests exercise damaged state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    workers: WorkerMap,
    corrupt: bool,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_corrupt(&self, corrupt: bool) {
        self.inner().corrupt = corrupt;
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.inner().saves
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WorkerStore for MemoryStore {
    fn load(&self) -> Result<WorkerMap> {
        let inner = self.inner();
        if inner.corrupt {
            return Err(WorkerError::CorruptState {
                path: "<memory>".into(),
                reason: "marked corrupt".to_string(),
            });
        }
        Ok(inner.workers.clone())
    }

    fn save(&self, workers: &WorkerMap) -> Result<()> {
        let mut inner = self.inner();
        inner.workers = workers.clone();
        inner.corrupt = false;
        inner.saves += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}
