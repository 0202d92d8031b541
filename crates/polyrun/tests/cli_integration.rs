//! CLI integration tests for the polyrun command-line interface.
//!
//! Every test points `POLYRUN_CONFIG_DIR` at a temporary directory and runs
//! from another one, so neither the user's config nor a stray
//! `polyrun.toml` is picked up. Tests that execute code skip when the
//! toolchain is not installed.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    config_dir: TempDir,
    work_dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            config_dir: TempDir::new().unwrap(),
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a command for the polyrun binary, isolated from the user environment.
    fn polyrun(&self) -> Command {
        let mut cmd = Command::cargo_bin("polyrun").unwrap();
        cmd.env("POLYRUN_CONFIG_DIR", self.config_dir.path())
            .env_remove("POLYRUN_IDLE_TIMEOUT")
            .env_remove("POLYRUN_COMPILE_TIMEOUT")
            .env_remove("RUST_LOG")
            .current_dir(self.work_dir.path());
        cmd
    }

    fn write(&self, name: &str, contents: &str) -> std::path::PathBuf {
        let path = self.work_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn work(&self) -> &Path {
        self.work_dir.path()
    }
}

fn has_python() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    Env::new()
        .polyrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("languages"))
        .stdout(predicate::str::contains("detect"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    Env::new()
        .polyrun()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("polyrun"));
}

#[test]
fn test_run_requires_file() {
    Env::new().polyrun().arg("run").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Languages and Detect
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_languages_lists_toolchains() {
    Env::new()
        .polyrun()
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Python"))
        .stdout(predicate::str::contains("Main.java"))
        .stdout(predicate::str::contains("gcc main.c"));
}

#[test]
fn test_languages_json_uses_configured_toolchain() {
    let env = Env::new();
    std::fs::write(
        env.config_dir.path().join("config.toml"),
        "[toolchains]\npython = \"pypy3\"\n",
    )
    .unwrap();

    let output = env.polyrun().args(["--json", "languages"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), 7);
    let python = entries
        .iter()
        .find(|e| e["language"] == "python")
        .unwrap();
    assert_eq!(python["run"][0], "pypy3");
}

#[test]
fn test_detect_markup_file() {
    let env = Env::new();
    env.write("page.html", "<!DOCTYPE html><p>hi</p>");
    env.polyrun()
        .args(["detect", "page.html"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("render"));
}

#[test]
fn test_detect_markup_under_code_label() {
    let env = Env::new();
    env.write("fake.py", "<div>hello</div>");
    env.polyrun()
        .args(["--json", "detect", "fake.py"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"action\":\"render\""));
}

#[test]
fn test_detect_source_file() {
    let env = Env::new();
    env.write("hello.py", "print('hi')\n");
    env.polyrun()
        .args(["detect", "hello.py"])
        .assert()
        .success()
        .stdout(predicate::str::contains("execute: Python"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_run_html_renders() {
    let env = Env::new();
    env.write("page.html", "<html><body>Hi</body></html>");
    env.polyrun()
        .args(["run", "page.html"])
        .assert()
        .success()
        .stdout("<html><body>Hi</body></html>\n");
}

#[test]
fn test_run_unsupported_language_fails() {
    let env = Env::new();
    env.write("prog.cob", "DISPLAY 'HI'.");
    env.polyrun()
        .args(["run", "prog.cob", "--language", "cobol"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Language 'cobol' is not supported yet."));
}

#[test]
fn test_run_unknown_extension_needs_language() {
    let env = Env::new();
    env.write("notes.txt", "hello");
    env.polyrun()
        .args(["run", "notes.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--language"));
}

#[test]
fn test_run_missing_file_fails() {
    Env::new()
        .polyrun()
        .args(["run", "nope.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_zero_idle_timeout_is_rejected() {
    let env = Env::new();
    env.write("hello.py", "print('hi')\n");
    env.polyrun()
        .args(["--idle-timeout", "0", "run", "hello.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("idle_timeout_secs"));
}

#[test]
fn test_run_python_hello() {
    if !has_python() {
        eprintln!("python3 not installed, skipping");
        return;
    }
    let env = Env::new();
    env.write("hello.py", "print('hi')\n");
    env.polyrun()
        .args(["run", "hello.py"])
        .assert()
        .success()
        .stdout("hi\n");
}

#[test]
fn test_run_python_forwards_stdin() {
    if !has_python() {
        eprintln!("python3 not installed, skipping");
        return;
    }
    let env = Env::new();
    env.write("greet.py", "name = input('Name: ')\nprint('Hi ' + name)\n");
    env.polyrun()
        .args(["run", "greet.py"])
        .write_stdin("Bob\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout("Name: Hi Bob\n");
}

#[test]
fn test_run_python_error_exit_code_and_hint() {
    if !has_python() {
        eprintln!("python3 not installed, skipping");
        return;
    }
    let env = Env::new();
    env.write("boom.py", "print(1 / 0)\n");
    env.polyrun()
        .args(["run", "boom.py"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ZeroDivisionError"))
        .stderr(predicate::str::contains("Error on line 1"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_run_json_events() {
    if !has_python() {
        eprintln!("python3 not installed, skipping");
        return;
    }
    let env = Env::new();
    env.write("hello.py", "print('hi')\n");
    let output = env
        .polyrun()
        .args(["--json", "run", "hello.py", "--session", "s-42"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let events: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(events.iter().all(|e| e["session_id"] == "s-42"));
    let last = events.last().unwrap();
    assert_eq!(last["type"], "completion");
    assert_eq!(last["status"], "success");
    assert_eq!(
        events.iter().filter(|e| e["type"] == "completion").count(),
        1
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_env() {
    let env = Env::new();
    env.polyrun()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            env.config_dir.path().join("config.toml").display().to_string(),
        ));
}

#[test]
fn test_config_init_local_then_refuses_overwrite() {
    let env = Env::new();
    env.polyrun()
        .args(["config", "init", "--local"])
        .assert()
        .success();

    let written = std::fs::read_to_string(env.work().join("polyrun.toml")).unwrap();
    assert!(written.contains("idle_timeout_secs = 150"));

    env.polyrun()
        .args(["config", "init", "--local"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    env.polyrun()
        .args(["config", "init", "--local", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_layers_and_overrides() {
    let env = Env::new();
    std::fs::write(
        env.config_dir.path().join("config.toml"),
        "[runner]\nidle_timeout_secs = 300\ncompile_timeout_secs = 9\n",
    )
    .unwrap();
    env.write("polyrun.toml", "[runner]\nidle_timeout_secs = 60\n");

    let output = env
        .polyrun()
        .args(["--json", "--compile-timeout", "4", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["runner"]["idle_timeout_secs"], 60);
    assert_eq!(value["runner"]["compile_timeout_secs"], 4);
    assert_eq!(value["toolchains"]["python"], "python3");
}

#[test]
fn test_config_show_reports_malformed_layer() {
    let env = Env::new();
    env.write("polyrun.toml", "[runner\nnot toml");
    env.polyrun()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warnings:"));
}
