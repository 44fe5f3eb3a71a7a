#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DESCRIPTOR: &str = r#"
project: demo
params:
  description: Demo service
  env:
    LOG_LEVEL: info
build:
  commands:
    - touch built-1
    - "false"
    - touch built-3
test:
  commands: ["echo tested"]
codestyle:
  commands: ["sleep 30"]
cleanup:
service:
  load:
    commands:
      - 'echo "$LOG_LEVEL {service} {config}" > loaded.txt'
  unload:
    commands: ["touch unloaded", "echo {NOPE}"]
  do:
    commands: ["{action_command} {args}"]
services:
  webapp:
    actions:
      greet: echo hello
    params:
      WSGI_MODULE: demo.wsgi
    configs:
      dev:
        params:
          env:
            LOG_LEVEL: debug
      prod:
  worker:
    configs: [dev]
"#;

const UNIT: &str = "\
[Unit]
Description={description}

[Service]
WorkingDirectory={HOME}
{#env}
Environment={key}={value}
{/env}
ExecStart=/usr/bin/gunicorn {WSGI_MODULE}
";

fn svcctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("svcctl").unwrap();
    cmd.current_dir(dir.path())
        .env("SVCCTL_ROOT", dir.path())
        .env_remove("SVCCTL_FILE");
    cmd
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("svcctl.yaml"), DESCRIPTOR).unwrap();
    std::fs::create_dir_all(dir.path().join("templates")).unwrap();
    std::fs::write(dir.path().join("templates/service.unit"), UNIT).unwrap();
    dir
}

// ---------------------------------------------------------------------------
// svcctl validate
// ---------------------------------------------------------------------------

#[test]
fn validate_lists_project_and_services() {
    let dir = project();
    svcctl(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Project: demo"))
        .stdout(predicate::str::contains("webapp"))
        .stdout(predicate::str::contains("service.load"));
}

#[test]
fn validate_fails_on_placeholder_in_global_phase() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("svcctl.yaml"),
        "project: p\nbuild:\n  commands: [\"make {service}\"]\n",
    )
    .unwrap();
    svcctl(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("validation found errors"));
}

#[test]
fn missing_descriptor_is_reported() {
    let dir = TempDir::new().unwrap();
    svcctl(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("descriptor not found"));
}

#[test]
fn file_flag_selects_descriptor() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("other.yaml"),
        "project: other\ntest:\n  commands: [\"true\"]\n",
    )
    .unwrap();
    svcctl(&dir)
        .args(["--file", "other.yaml", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Project: other"));
}

// ---------------------------------------------------------------------------
// svcctl run
// ---------------------------------------------------------------------------

#[test]
fn run_halts_at_first_failing_command() {
    let dir = project();
    svcctl(&dir)
        .args(["run", "build"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("command #1"));
    assert!(dir.path().join("built-1").exists());
    assert!(!dir.path().join("built-3").exists());
}

#[test]
fn run_succeeds_and_reports() {
    let dir = project();
    svcctl(&dir)
        .args(["run", "test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("succeeded"))
        .stdout(predicate::str::contains("echo tested"));
}

#[test]
fn run_empty_phase_is_success() {
    let dir = project();
    svcctl(&dir)
        .args(["run", "cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no commands"));
}

#[test]
fn run_undefined_phase_fails() {
    let dir = project();
    svcctl(&dir)
        .args(["run", "setup"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("phase not found: setup"));
}

#[test]
fn run_points_service_phases_at_service_command() {
    let dir = project();
    svcctl(&dir)
        .args(["run", "service.load"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("svcctl service load"));
}

#[test]
fn command_timeout_stops_long_command() {
    let dir = project();
    svcctl(&dir)
        .args(["--command-timeout", "1", "run", "codestyle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("command timeout after 1s"));
}

#[test]
fn json_report_carries_steps() {
    let dir = project();
    svcctl(&dir)
        .args(["--json", "run", "test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"run_id\""))
        .stdout(predicate::str::contains("\"output\": \"tested\""));
}

// ---------------------------------------------------------------------------
// svcctl service
// ---------------------------------------------------------------------------

#[test]
fn service_load_exports_env_and_substitutes() {
    let dir = project();
    svcctl(&dir)
        .args(["service", "load", "webapp", "dev"])
        .assert()
        .success();
    let written = std::fs::read_to_string(dir.path().join("loaded.txt")).unwrap();
    assert_eq!(written, "debug webapp dev\n");
}

#[test]
fn nested_svcctl_finds_descriptor_from_service_home() {
    let dir = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    let yaml = format!(
        "project: demo\nservice:\n  load:\n    commands: [\"svcctl params {{service}} {{config}} > params.txt\"]\n\
         services:\n  api:\n    params:\n      HOME: {}\n    configs: [dev]\n",
        home.path().display()
    );
    std::fs::write(dir.path().join("svcctl.yaml"), yaml).unwrap();
    let bin = assert_cmd::cargo::cargo_bin("svcctl");
    let path = format!(
        "{}:{}",
        bin.parent().unwrap().display(),
        std::env::var("PATH").unwrap_or_default()
    );
    svcctl(&dir)
        .env_remove("SVCCTL_ROOT")
        .env("PATH", path)
        .args(["service", "load", "api", "dev"])
        .assert()
        .success();
    let params = std::fs::read_to_string(home.path().join("params.txt")).unwrap();
    assert!(params.contains("demo.api.dev.service"));
}

#[test]
fn unresolved_placeholder_aborts_before_any_command() {
    let dir = project();
    svcctl(&dir)
        .args(["service", "unload", "webapp", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unresolved placeholder '{NOPE}'"));
    assert!(!dir.path().join("unloaded").exists());
}

#[test]
fn service_do_runs_declared_action_with_args() {
    let dir = project();
    svcctl(&dir)
        .args(["--json", "service", "do", "webapp", "dev", "greet", "world"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello world"));
}

#[test]
fn unknown_service_is_not_found() {
    let dir = project();
    svcctl(&dir)
        .args(["service", "load", "ghost", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("service not found: ghost"));
}

#[test]
fn service_list_shows_configs_and_actions() {
    let dir = project();
    svcctl(&dir)
        .args(["service", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dev, prod"))
        .stdout(predicate::str::contains("greet"));
}

// ---------------------------------------------------------------------------
// svcctl render / params / plan
// ---------------------------------------------------------------------------

#[test]
fn render_prints_unit() {
    let dir = project();
    svcctl(&dir)
        .args(["render", "webapp", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Description=Demo service"))
        .stdout(predicate::str::contains("Environment=LOG_LEVEL=debug"))
        .stdout(predicate::str::contains("ExecStart=/usr/bin/gunicorn demo.wsgi"));
}

#[test]
fn render_writes_unit_file() {
    let dir = project();
    svcctl(&dir)
        .args(["render", "webapp", "prod", "-o", "out/unit.service"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote demo.webapp.prod.service"));
    let text = std::fs::read_to_string(dir.path().join("out/unit.service")).unwrap();
    assert!(text.contains("Environment=LOG_LEVEL=info"));

    svcctl(&dir)
        .args(["render", "webapp", "prod", "-o", "out/unit.service"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn render_reports_missing_parameter() {
    let dir = project();
    svcctl(&dir)
        .args(["render", "worker", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing parameter 'WSGI_MODULE'"));
}

#[test]
fn params_json_includes_derived_values() {
    let dir = project();
    svcctl(&dir)
        .args(["--json", "params", "webapp", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"SOCKET_NAME\": \"webapp.dev.sock\""))
        .stdout(predicate::str::contains("\"UNIT_NAME\": \"demo.webapp.dev.service\""));
}

#[test]
fn plan_does_not_execute() {
    let dir = project();
    svcctl(&dir)
        .args(["plan", "build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("touch built-1"))
        .stdout(predicate::str::contains("touch built-3"));
    assert!(!dir.path().join("built-1").exists());
}

#[test]
fn plan_expands_action_arguments() {
    let dir = project();
    svcctl(&dir)
        .args([
            "plan", "service.do", "--service", "webapp", "--config", "dev", "--action", "greet",
            "--", "a", "b",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo hello a b"));
}
