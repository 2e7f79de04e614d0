use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn cargo_bin() -> Command {
    let mut cmd = Command::cargo_bin("bf").unwrap();
    cmd.env_remove("BF_CONFIG")
        .env_remove("BF_MAX_STEPS")
        .env_remove("BF_TIMEOUT_MS")
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("bfvm-tests-no-config"));
    cmd
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut tf = tempfile::NamedTempFile::new().expect("tempfile");
    write!(tf, "{}", content).unwrap();
    tf
}

#[test]
fn modulus_from_config_file() {
    let cfg = config_file("[machine]\nmodulus = 256\n");
    let code = format!("-{}.", "+".repeat(66));
    cargo_bin()
        .env("BF_CONFIG", cfg.path())
        .args(["run", "--", code.as_str()])
        .assert()
        .success()
        .stdout("A");
}

#[test]
fn flag_overrides_config_file() {
    let cfg = config_file("[machine]\nmemory_size = 1\n");
    cargo_bin()
        .env("BF_CONFIG", cfg.path())
        .args(["run", "--memory", "2", ">+++."])
        .assert()
        .success()
        .stdout("\u{3}");
}

#[test]
fn memory_size_from_config_file() {
    let cfg = config_file("[machine]\nmemory_size = 1\npointer = \"strict\"\n");
    cargo_bin()
        .env("BF_CONFIG", cfg.path())
        .args(["run", ">+"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tape index out of range (ptr=1)"));
}

#[test]
fn step_limit_from_config_file() {
    let cfg = config_file("[limits]\nmax_steps = 20\n");
    cargo_bin()
        .env("BF_CONFIG", cfg.path())
        .args(["run", "+[]"])
        .timeout(std::time::Duration::from_secs(2))
        .assert()
        .failure()
        .stderr(predicate::str::contains("step limit exceeded (20)"));
}

#[test]
fn eof_policy_from_config_file() {
    let cfg = config_file("[machine]\neof = \"zero\"\n");
    cargo_bin()
        .env("BF_CONFIG", cfg.path())
        .args(["run", "+,."])
        .write_stdin("")
        .assert()
        .success()
        .stdout("\u{0}");
}

#[test]
fn config_in_xdg_config_home_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bfvm.toml"), "[limits]\nmax_steps = 3\n").unwrap();
    cargo_bin()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["run", "+[]"])
        .timeout(std::time::Duration::from_secs(2))
        .assert()
        .failure()
        .stderr(predicate::str::contains("step limit exceeded (3)"));
}

#[test]
fn malformed_config_is_reported() {
    let cfg = config_file("[machine]\nmodulus = 100\n");
    cargo_bin()
        .env("BF_CONFIG", cfg.path())
        .args(["run", "+."])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn unknown_config_key_is_reported() {
    let cfg = config_file("[machine]\ncolor = \"red\"\n");
    cargo_bin()
        .env("BF_CONFIG", cfg.path())
        .args(["run", "+."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn missing_explicit_config_is_reported() {
    cargo_bin()
        .env("BF_CONFIG", std::env::temp_dir().join("bfvm-tests-missing").join("bfvm.toml"))
        .args(["run", "+."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}
