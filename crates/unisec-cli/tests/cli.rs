//! Integration tests for the unisec CLI.
//!
//! Each test writes a policy (and, where needed, an engine config and a
//! stand-in adapter script) into a temporary directory, invokes the `unisec`
//! binary via `assert_cmd`, and checks outputs and exit codes. Per-user
//! config and data directories are redirected into the temp dir.

#![allow(deprecated)] // Command::cargo_bin

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const SCENARIO_A: &str = r"
global:
  ike_version: ikev2
  auth_method: psk
  psk: s3cr3t
  encryption: aes256
  integrity: sha256
  dh_group: 14
tunnels:
  - name: t1
    mode: tunnel
    protocol: esp
    peer_ip: 203.0.113.10
    local_subnet: 10.0.0.0/24
    remote_subnet: 192.168.1.0/24
";

/// A `unisec` command isolated from the invoking user's config and logs.
fn unisec(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("unisec").expect("unisec binary not found");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG")
        .arg("--log-file")
        .arg(home.join("unisec.log"));
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

/// Engine config running `script_body` as the macOS adapter under `sh`.
fn sh_adapter_config(dir: &Path, script_body: &str) -> PathBuf {
    let script = write(dir, "adapter.sh", script_body);
    write(
        dir,
        "config.toml",
        &format!(
            "artifact_dir = '{}'\n\n[macos]\nscript = '{}'\ninterpreter = \"sh\"\n",
            dir.display(),
            script.display()
        ),
    )
}

// ─── scenarios ──────────────────────────────────────────────

#[cfg(unix)]
#[test]
fn scenario_a_valid_policy_is_applied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);
    let config = sh_adapter_config(
        dir.path(),
        "grep -q '\"dh_group\": 14' \"$1\" || exit 7\necho tunnels configured\n",
    );

    unisec(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--platform", "macos"])
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("tunnels configured"));

    // Only fixtures remain: the handoff file was removed.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("unisec-policy-"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[cfg(unix)]
#[test]
fn scenario_b_bad_dh_group_fails_before_dispatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(
        dir.path(),
        "policy.yaml",
        &SCENARIO_A.replace("dh_group: 14", "dh_group: 99"),
    );
    let marker = dir.path().join("adapter-ran");
    let config = sh_adapter_config(dir.path(), &format!("touch '{}'\n", marker.display()));

    unisec(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--platform", "macos"])
        .arg(&policy)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid dh_group"));

    assert!(!marker.exists(), "adapter must not be invoked");
}

#[test]
fn scenario_c_missing_remote_subnet_names_tunnel_and_field() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(
        dir.path(),
        "policy.yaml",
        &SCENARIO_A.replace("    remote_subnet: 192.168.1.0/24\n", ""),
    );

    unisec(dir.path())
        .args(["--platform", "macos"])
        .arg(&policy)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("t1").and(predicate::str::contains("remote_subnet")));
}

#[test]
fn scenario_d_unknown_platform_is_unsupported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);

    unisec(dir.path())
        .args(["--platform", "unknown"])
        .arg(&policy)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no adapter for platform"));
}

// ─── other behaviour ────────────────────────────────────────

#[test]
fn check_mode_validates_without_an_adapter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);

    // No adapter exists for `unknown`; check mode never gets that far.
    unisec(dir.path())
        .args(["--check", "--platform", "unknown"])
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("policy is valid"));
}

#[test]
fn missing_policy_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");

    unisec(dir.path())
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("absent.yaml"));
}

#[test]
fn malformed_yaml_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", "global: [unclosed\n");

    unisec(dir.path())
        .arg("--check")
        .arg(&policy)
        .assert()
        .code(1);
}

#[test]
fn missing_adapter_script_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);
    let config = write(
        dir.path(),
        "config.toml",
        "[windows]\nscript = '/nonexistent/unisec/windows_ipsec.ps1'\n",
    );

    unisec(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--platform", "windows"])
        .arg(&policy)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("windows adapter not found"));
}

#[test]
fn linux_adapter_writes_swanctl_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let conf_dir = dir.path().join("conf.d");
    std::fs::create_dir(&conf_dir).expect("mkdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);
    let config = write(
        dir.path(),
        "config.toml",
        &format!("[linux]\nconf_dir = '{}'\n", conf_dir.display()),
    );

    unisec(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--platform", "linux"])
        .arg(&policy)
        .assert()
        .success();

    let rendered = std::fs::read_to_string(conf_dir.join("unisec.conf")).expect("read conf");
    assert!(rendered.contains("remote_addrs = 203.0.113.10"), "{rendered}");
}

#[test]
fn policy_path_can_come_from_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);
    let config = write(
        dir.path(),
        "config.toml",
        &format!("policy_path = '{}'\n", policy.display()),
    );

    unisec(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--check")
        .assert()
        .success();
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");

    unisec(dir.path())
        .args(["--config", "/nonexistent/unisec/config.toml", "--check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn logs_are_written_to_the_log_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);

    unisec(dir.path())
        .arg("--check")
        .arg(&policy)
        .assert()
        .success();

    let log = std::fs::read_to_string(dir.path().join("unisec.log")).expect("read log");
    assert!(log.contains("stage transition"), "{log}");
    assert!(log.contains("run finished"), "{log}");
    assert!(log.contains("reached=policy-validated"), "{log}");
    assert!(!log.contains('\u{1b}'), "log file must not contain ANSI escapes");
}

#[test]
fn json_logs_are_machine_readable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = write(dir.path(), "policy.yaml", SCENARIO_A);

    let output = unisec(dir.path())
        .args(["--check", "--json-logs"])
        .arg(&policy)
        .output()
        .expect("run unisec");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let first = stdout.lines().next().expect("at least one log line");
    let value: serde_json::Value = serde_json::from_str(first).expect("json log line");
    assert!(value.get("level").is_some(), "{first}");
}
