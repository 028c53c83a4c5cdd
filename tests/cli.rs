//! End-to-end smoke test for the `packetmatch` binary: build an automaton
//! from a text pattern list, then scan a capture file built from it.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_capture(records: &[&[u8]]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for r in records {
        file.write_all(&(r.len() as u32).to_le_bytes()).unwrap();
        file.write_all(r).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn build_then_match_reports_a_match_count() {
    let mut pattern_file = NamedTempFile::new().unwrap();
    writeln!(pattern_file, "foo").unwrap();
    writeln!(pattern_file, "bar").unwrap();
    pattern_file.flush().unwrap();

    let automaton_file = NamedTempFile::new().unwrap();

    Command::cargo_bin("packetmatch")
        .unwrap()
        .args([
            "build",
            pattern_file.path().to_str().unwrap(),
            "-o",
            automaton_file.path().to_str().unwrap(),
        ])
        .assert()
        .success();

    let capture_file = write_capture(&[b"xxfooxx", b"yybaryy", b"nomatch"]);

    Command::cargo_bin("packetmatch")
        .unwrap()
        .args([
            "match",
            automaton_file.path().to_str().unwrap(),
            capture_file.path().to_str().unwrap(),
            "--format",
            "count",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2"));
}

#[test]
fn inspect_reports_state_count_as_json() {
    let mut pattern_file = NamedTempFile::new().unwrap();
    writeln!(pattern_file, "he").unwrap();
    writeln!(pattern_file, "she").unwrap();
    pattern_file.flush().unwrap();

    let automaton_file = NamedTempFile::new().unwrap();
    Command::cargo_bin("packetmatch")
        .unwrap()
        .args([
            "build",
            pattern_file.path().to_str().unwrap(),
            "-o",
            automaton_file.path().to_str().unwrap(),
        ])
        .assert()
        .success();

    Command::cargo_bin("packetmatch")
        .unwrap()
        .args(["inspect", automaton_file.path().to_str().unwrap(), "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("state_count"));
}
