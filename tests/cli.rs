//! End-to-end tests of the `mixbool` binary.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

const PROGRAM: &str = "program @f(%0: i32, %1: i32) {
  %2 = sub %0, %1 : i32
  %3 = xor %2, %0 : i32
  %4 = mul %3, %1 : i32
  return %2, %4
}
";

fn program_file(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".mb").expect("Failed to create temp file");
    file.write_all(source.as_bytes())
        .expect("Failed to write program");
    file
}

fn mixbool(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mixbool"))
        .args(args)
        .output()
        .expect("Failed to execute mixbool")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn run_prints_outputs() {
    let file = program_file(PROGRAM);
    let path = file.path().to_str().unwrap();
    let output = mixbool(&["run", path, "5", "-3"]);
    assert!(output.status.success(), "{output:?}");
    // 5 - -3 = 8; (8 ^ 5) * -3 = -39
    assert_eq!(stdout(&output), "8, -39\n");
}

#[test]
fn mutated_program_runs_the_same() {
    let file = program_file(PROGRAM);
    let path = file.path().to_str().unwrap();
    let output = mixbool(&[
        "mutate", path, "--seed", "17", "--rounds", "3", "--check", "64", "--report",
    ]);
    assert!(output.status.success(), "{output:?}");
    let mutated = stdout(&output);
    assert!(mutated.starts_with("program @f(%0: i32, %1: i32) {"));
    assert_ne!(mutated, PROGRAM);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"mutator\": \"mba\""), "{stderr}");
    assert!(stderr.contains("equivalent on 64 random input(s)"), "{stderr}");

    let mutated_file = program_file(&mutated);
    let path = mutated_file.path().to_str().unwrap();
    let output = mixbool(&["run", path, "5", "-3"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output), "8, -39\n");
}

#[test]
fn same_seed_same_output() {
    let file = program_file(PROGRAM);
    let path = file.path().to_str().unwrap();
    let first = mixbool(&["mutate", path, "--seed", "3", "--rounds", "2"]);
    let second = mixbool(&["mutate", path, "--seed", "3", "--rounds", "2"]);
    assert!(first.status.success(), "{first:?}");
    assert_eq!(stdout(&first), stdout(&second));
}

#[test]
fn catalog_verifies_every_template() {
    let output = mixbool(&["catalog", "--verify"]);
    assert!(output.status.success(), "{output:?}");
    let listing = stdout(&output);
    assert_eq!(listing.lines().count(), 48);
    assert!(listing.lines().all(|line| line.ends_with("  ok")), "{listing}");
    assert!(listing.contains("x ^ y = (x | y) - y + (~x & y)"), "{listing}");
}

#[test]
fn reports_parse_errors() {
    let file = program_file("program @f(%0: i32) {\n  %1 = frob %0 : i32\n  return %1\n}\n");
    let path = file.path().to_str().unwrap();
    let output = mixbool(&["mutate", path]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: parse error at offset"), "{stderr}");
}
