// src/store/json_file.rs

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::errors::{Result, WorkerError};
use crate::store::{WorkerMap, WorkerStore};

/// Record store backed by a single pretty-printed JSON document.
///
/// - Reads tolerate a missing or empty file (empty mapping).
/// - Writes go to a sibling temp file which is then renamed over the
///   document, so a reader never sees half a write.
/// - `save` and `update` hold an exclusive advisory lock on
///   `<state_file>.lock` while they run. Plain `load` does not lock.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling_with_suffix(&path, ".lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn read_unlocked(&self) -> Result<WorkerMap> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(WorkerMap::new()),
            Err(e) => {
                return Err(WorkerError::CorruptState {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(WorkerMap::new());
        }

        let mut workers: WorkerMap =
            serde_json::from_str(&contents).map_err(|e| WorkerError::CorruptState {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        // The key is authoritative; hand-edited files may disagree.
        for (key, record) in workers.iter_mut() {
            if record.name != *key {
                record.name = key.clone();
            }
        }

        Ok(workers)
    }

    fn write_unlocked(&self, workers: &WorkerMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(workers)?;
        let tmp = sibling_with_suffix(&self.path, &format!(".tmp-{}", std::process::id()));

        {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = ?self.path, records = workers.len(), "worker state saved");
        Ok(())
    }
}

impl WorkerStore for JsonFileStore {
    fn load(&self) -> Result<WorkerMap> {
        self.read_unlocked()
    }

    fn save(&self, workers: &WorkerMap) -> Result<()> {
        let _guard = self.lock()?;
        self.write_unlocked(workers)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut WorkerMap) -> Result<()>) -> Result<()> {
        let guard = self.lock()?;
        let mut workers = self.read_unlocked()?;
        let before = workers.clone();
        mutate(&mut workers)?;
        if workers != before {
            self.write_unlocked(&workers)?;
        }
        drop(guard);
        Ok(())
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "workers.json".into());
    name.push(suffix);
    path.with_file_name(name)
}
