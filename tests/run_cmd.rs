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

const HELLO: &str = "++++++++++[>+++++++>++++++++++>+++>+<<<<-]>++.>+.+++++++..+++.>++.<<+++++++++++++++.>.+++.------.--------.>+.>.";

fn read_to_tempfile(content: &str) -> tempfile::NamedTempFile {
    let mut tf = tempfile::NamedTempFile::new().expect("tempfile");
    write!(tf, "{}", content).unwrap();
    tf
}

#[test]
fn test_run_positional_code() {
    cargo_bin()
        .args(["run", "++>+++++[<+>-]<."])
        .assert()
        .success()
        .stdout("\u{7}")
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_run_concatenates_code_parts() {
    cargo_bin()
        .args(["run", "++>+++++", "[<+>-]", "<."])
        .assert()
        .success()
        .stdout("\u{7}");
}

#[test]
fn test_run_hello_world_from_file_with_comments() {
    let tf = read_to_tempfile(&format!("hello world program\n{HELLO}\n"));
    cargo_bin()
        .arg("run").arg("--file").arg(tf.path())
        .assert()
        .success()
        .stdout("Hello World!\n");
}

#[test]
fn test_run_compiled_matches_interpreter() {
    cargo_bin()
        .args(["run", "--compiled", HELLO])
        .assert()
        .success()
        .stdout("Hello World!\n");
}

#[test]
fn test_echo_reads_stdin() {
    cargo_bin()
        .args(["run", ",."])
        .write_stdin("A")
        .assert()
        .success()
        .stdout("A");
}

#[test]
fn test_cat_with_zero_eof_policy() {
    cargo_bin()
        .args(["run", "--eof", "zero", ",[.,]"])
        .write_stdin("copy me")
        .assert()
        .success()
        .stdout("copy me");
}

#[test]
fn test_byte_modulus_wraps_below_zero() {
    // 0 - 1 = 255, then +66 = 321 mod 256 = 65 ('A')
    let code = format!("-{}.", "+".repeat(66));
    cargo_bin()
        .args(["run", "--modulus", "256", "--", code.as_str()])
        .assert()
        .success()
        .stdout("A");
}

#[test]
fn test_negative_pointer_aliases_end_of_tape() {
    // Write 'A' through cell -1 then read it back from the last cell.
    let code = format!("<{}>>>.", "+".repeat(65));
    cargo_bin()
        .args(["run", "--memory", "3", code.as_str()])
        .assert()
        .success()
        .stdout("A");
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    cargo_bin()
        .args(["run", "-v", "+++."])
        .assert()
        .success()
        .stdout("\u{3}")
        .stderr(predicate::str::contains("halted after 4 steps"));
}

#[test]
fn test_run_help() {
    cargo_bin()
        .args(["run", "--help"])
        .assert()
        .success()
        .stderr(predicate::str::contains("--compiled"));
}
