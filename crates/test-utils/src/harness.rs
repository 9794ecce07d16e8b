use std::path::Path;
use std::sync::Arc;

use bgworker::config::ConfigFile;
use bgworker::manager::WorkerManager;
use bgworker::store::{JsonFileStore, MemoryStore, WorkerRecord, WorkerStore};
use tempfile::TempDir;

use crate::builders::ConfigBuilder;
use crate::fakes::{FakeLauncher, FakeProcessTable, RecordingNotifier};

/// A `WorkerManager` wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<dyn WorkerStore>,
    pub processes: FakeProcessTable,
    pub launcher: FakeLauncher,
    pub notifier: RecordingNotifier,
    pub manager: WorkerManager,
}

impl Harness {
    /// In-memory store, default config rooted in a temp dir.
    pub fn new() -> Self {
        Self::build(|root| ConfigBuilder::new(root).build(), |_| {
            Arc::new(MemoryStore::new())
        })
    }

    /// Same as [`Harness::new`] but backed by the real JSON state file.
    pub fn with_json_store() -> Self {
        Self::build(
            |root| ConfigBuilder::new(root).build(),
            |cfg| Arc::new(JsonFileStore::new(cfg.paths.state_file.clone())),
        )
    }

    /// In-memory store with a customised config.
    pub fn with_config(make: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        Self::build(|root| make(ConfigBuilder::new(root)).build(), |_| {
            Arc::new(MemoryStore::new())
        })
    }

    /// Wrap an existing store (e.g. a `MemoryStore` the test keeps a handle on).
    pub fn with_store(store: Arc<dyn WorkerStore>) -> Self {
        Self::build(|root| ConfigBuilder::new(root).build(), move |_| store)
    }

    fn build(
        make_config: impl FnOnce(&Path) -> ConfigFile,
        make_store: impl FnOnce(&ConfigFile) -> Arc<dyn WorkerStore>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = make_config(dir.path());
        let store = make_store(&config);
        let processes = FakeProcessTable::new();
        let launcher = FakeLauncher::new(processes.clone());
        let notifier = RecordingNotifier::new();

        let manager = WorkerManager::new(
            config,
            Arc::clone(&store),
            Arc::new(launcher.clone()),
            Arc::new(processes.clone()),
            Arc::new(notifier.clone()),
        );

        Self {
            dir,
            store,
            processes,
            launcher,
            notifier,
            manager,
        }
    }

    /// Current record for `name`, straight from the store.
    pub fn record(&self, name: &str) -> Option<WorkerRecord> {
        self.store.load().expect("load store").remove(name)
    }

    /// Simulate the worker writing `log` and exiting.
    pub fn finish(&self, record: &WorkerRecord, log: &str) {
        std::fs::write(&record.log_path, log).expect("write worker log");
        if let Some(pid) = record.pid {
            self.processes.exit(pid);
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
