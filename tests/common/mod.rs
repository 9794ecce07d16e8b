#![allow(dead_code, unused_imports)]

pub use bgworker_test_utils::builders::{ConfigBuilder, RecordBuilder, fixed_time};
pub use bgworker_test_utils::{
    FakeLauncher, FakeProcessTable, Harness, RecordingNotifier, error_envelope, init_tracing,
    success_envelope, with_timeout,
};

use std::path::Path;

/// Write `contents` to `path` and mark it executable.
pub fn write_script(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, contents).expect("write script");
    let mut perms = std::fs::metadata(path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod script");
}
