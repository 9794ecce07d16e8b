// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use bgworker::config::{ConfigFile, RawConfigFile, load_and_validate, load_effective};
use bgworker::errors::WorkerError;
use bgworker::types::Model;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file.flush().unwrap();
    file
}

fn expect_config_error(contents: &str, needle: &str) {
    let file = config_file(contents);
    match load_and_validate(file.path()) {
        Err(WorkerError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}")
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn defaults_without_any_file() {
    let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();

    assert_eq!(cfg.assistant.program, "claude");
    assert_eq!(cfg.notify.program, "openclaw");
    assert_eq!(
        cfg.notify.args,
        vec!["agent", "--agent", "{target}", "-m", "{message}"]
    );
    assert_eq!(cfg.notify.timeout_secs, 30);
    assert_eq!(cfg.notify.default_target, "main");
    assert_eq!(cfg.defaults.model, Model::Haiku);
    assert_eq!(cfg.defaults.budget, 2.0);
    assert_eq!(cfg.monitor.poll_interval_secs, 5);
    assert_eq!(cfg.rules.failure.len(), 3);
    assert!(cfg.rules.success.is_empty());
    assert!(cfg.paths.state_file.ends_with("bgworker/workers.json"));
}

#[test]
fn explicit_file_overrides_sections() {
    let file = config_file(
        r#"
[paths]
state_file = "/var/tmp/bg/state.json"

[assistant]
program = "/opt/bin/claude"
extra_args = ["--verbose"]

[notify]
default_target = "ops"

[defaults]
model = "opus"
budget = 0.5

[monitor]
poll_interval_secs = 2
success_patterns = ["^DONE$"]
"#,
    );

    let cfg = load_effective(Some(file.path())).unwrap();

    assert_eq!(cfg.paths.state_file, PathBuf::from("/var/tmp/bg/state.json"));
    assert!(cfg.paths.logs_dir.ends_with("bgworker/logs"));
    assert_eq!(cfg.assistant.program, "/opt/bin/claude");
    assert_eq!(cfg.assistant.extra_args, vec!["--verbose"]);
    assert_eq!(cfg.notify.default_target, "ops");
    assert_eq!(cfg.notify.program, "openclaw");
    assert_eq!(cfg.defaults.model, Model::Opus);
    assert_eq!(cfg.defaults.budget, 0.5);
    assert_eq!(cfg.monitor.poll_interval_secs, 2);
    assert_eq!(cfg.rules.success.len(), 1);
}

#[test]
fn cli_paths_override_config() {
    let cfg = ConfigFile::try_from(RawConfigFile::default())
        .unwrap()
        .with_paths(Some("/x/state.json".into()), None);

    assert_eq!(cfg.paths.state_file, PathBuf::from("/x/state.json"));
    assert!(cfg.paths.logs_dir.ends_with("bgworker/logs"));
}

#[test]
fn missing_explicit_file_is_an_io_error() {
    let err = load_effective(Some(std::path::Path::new("/definitely/not/here.toml"))).unwrap_err();
    assert!(matches!(err, WorkerError::IoError(_)));
}

#[test]
fn unknown_keys_are_rejected() {
    let file = config_file("[monitor]\npoll_every = 3\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, WorkerError::TomlError(_)));
    assert_eq!(err.kind(), "ConfigError");
}

#[test]
fn bad_model_name_is_rejected() {
    let file = config_file("[defaults]\nmodel = \"gpt\"\n");
    assert!(load_and_validate(file.path()).is_err());
}

#[test]
fn non_positive_budget_is_rejected() {
    expect_config_error("[defaults]\nbudget = 0.0\n", "[defaults].budget");
    expect_config_error("[defaults]\nbudget = -3.0\n", "[defaults].budget");
}

#[test]
fn zero_poll_interval_is_rejected() {
    expect_config_error("[monitor]\npoll_interval_secs = 0\n", "poll_interval_secs");
}

#[test]
fn tiny_tail_is_rejected() {
    expect_config_error("[monitor]\ntail_bytes = 10\n", "tail_bytes");
}

#[test]
fn invalid_regex_is_rejected() {
    expect_config_error(
        "[monitor]\nfailure_patterns = [\"(unclosed\"]\n",
        "[monitor].failure_patterns: invalid regex",
    );
}

#[test]
fn notify_args_need_message_placeholder() {
    expect_config_error(
        "[notify]\nargs = [\"send\", \"{target}\"]\n",
        "{message}",
    );
}

#[test]
fn empty_programs_are_rejected() {
    expect_config_error("[assistant]\nprogram = \"  \"\n", "[assistant].program");
    expect_config_error("[notify]\nprogram = \"\"\n", "[notify].program");
}

#[test]
fn zero_notify_timeout_is_rejected() {
    expect_config_error("[notify]\ntimeout_secs = 0\n", "timeout_secs");
}
