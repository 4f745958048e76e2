use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cligate() -> Command {
    let mut cmd = Command::cargo_bin("cligate").unwrap();
    for key in [
        "DEFAULT_TTL_HOURS",
        "CLEANUP_INTERVAL_MINUTES",
        "MAX_SESSIONS",
        "MAX_MESSAGE_HISTORY",
        "TRACK_ACCESS_COUNT",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_version_command() {
    cligate()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "cligate {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_flag_long() {
    cligate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_flag_short() {
    cligate()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains("cligate"));
}

#[test]
fn test_no_args_shows_help() {
    cligate()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_unknown_command_exit_code() {
    cligate().arg("frobnicate").assert().code(2);
}

#[test]
fn test_config_prints_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("config.json");

    let output = cligate()
        .args(["config", "--config"])
        .arg(&missing)
        .output()
        .unwrap();

    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["default_ttl_hours"], 1);
    assert_eq!(config["cleanup_interval_minutes"], 5);
}

#[test]
fn test_config_env_override() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("config.json");

    let output = cligate()
        .env("MAX_SESSIONS", "42")
        .args(["config", "--config"])
        .arg(&missing)
        .output()
        .unwrap();

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["max_sessions"], 42);
}

#[test]
fn test_config_init_writes_file_once() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    cligate()
        .args(["config", "--init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    cligate()
        .args(["config", "--init", "--config"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_invalid_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, r#"{ "max_sessions": 0 }"#).unwrap();

    cligate()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("max_sessions"));
}
