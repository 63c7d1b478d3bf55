//! Integration tests for the ctsguard binary.
//!
//! These tests verify end-to-end behavior including:
//! - Replaying telemetry through the monitor
//! - Device command output
//! - Session artifacts (row log, summary, report, history)
//! - Point estimates and configuration display

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("ctsguard"))
}

/// Config file with a short sustained-feedback threshold
fn write_config(dir: &Path, duration: f64) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!("[classifier]\nbad_posture_duration_threshold = {:.1}\n", duration),
    )
    .expect("Failed to write config");
    path
}

fn write_telemetry(dir: &Path, lines: &[&str]) -> PathBuf {
    let path = dir.join("telemetry.txt");
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(&path, contents).expect("Failed to write telemetry");
    path
}

fn run_monitor(temp_dir: &TempDir, lines: &[&str], duration: f64) -> (PathBuf, PathBuf) {
    let data_dir = temp_dir.path().join("data");
    let config = write_config(temp_dir.path(), duration);
    let input = write_telemetry(temp_dir.path(), lines);
    let commands = temp_dir.path().join("commands.txt");

    cli()
        .arg("monitor")
        .arg("--input")
        .arg(&input)
        .arg("--dt")
        .arg("1")
        .arg("--commands-out")
        .arg(&commands)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("Session Summary"));

    (data_dir, commands)
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Wrist posture monitor for carpal tunnel prevention",
        ));
}

#[test]
fn test_sustained_red_starts_then_silences_feedback() {
    let temp_dir = setup_test_dir();
    let (_, commands) = run_monitor(&temp_dir, &["40,0"; 15], 10.0);

    let sent = fs::read_to_string(&commands).expect("Failed to read commands");
    let tokens: Vec<&str> = sent.lines().collect();

    // One pulse per second of Red until the sustained threshold
    assert_eq!(tokens.iter().filter(|t| **t == "VIB_PULSE").count(), 9);
    assert_eq!(tokens[9], "VIB_ON");
    assert_eq!(tokens.iter().filter(|t| **t == "VIB_ON").count(), 1);
    assert_eq!(tokens.last(), Some(&"VIB_OFF"));
}

#[test]
fn test_session_artifacts_written() {
    let temp_dir = setup_test_dir();
    let (data_dir, _) = run_monitor(&temp_dir, &["40,0"; 15], 10.0);

    let csv = fs::read_to_string(data_dir.join("cts_session.csv")).expect("Failed to read CSV");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,flexionExtension,radialUlnar,pressure,badPostureDuration,totalTime")
    );
    assert_eq!(lines.count(), 15);

    let summary = fs::read_to_string(data_dir.join("PostureSessionSummary.txt"))
        .expect("Failed to read summary");
    assert!(summary.contains("Total Time: 15.00 seconds"));
    assert!(summary.contains("Bad Posture Percentage: 100.0%"));
    assert!(summary.contains("Max Pressure: 3.91 kPa"));

    let html = fs::read_to_string(data_dir.join("CTS_Report.html")).expect("Failed to read report");
    assert_eq!(html.matches("<tr class='yellow'>").count(), 9);
    assert_eq!(html.matches("<tr class='red'>").count(), 6);

    let history = fs::read_to_string(data_dir.join("sessions.jsonl")).expect("Failed to read history");
    assert_eq!(history.lines().count(), 1);
    let record: serde_json::Value =
        serde_json::from_str(history.lines().next().unwrap()).expect("Invalid history JSON");
    assert_eq!(record["rows_logged"], 15);
}

#[test]
fn test_green_session_sends_nothing() {
    let temp_dir = setup_test_dir();
    let (data_dir, commands) = run_monitor(&temp_dir, &["0,0"; 5], 10.0);

    assert_eq!(fs::read_to_string(&commands).unwrap(), "");

    // No Red ticks means no rows, but the summary still exists
    let csv_path = data_dir.join("cts_session.csv");
    assert!(!csv_path.exists() || fs::read_to_string(&csv_path).unwrap().is_empty());
    let summary = fs::read_to_string(data_dir.join("PostureSessionSummary.txt")).unwrap();
    assert!(summary.contains("Bad Posture Percentage: 0.0%"));
    let html = fs::read_to_string(data_dir.join("CTS_Report.html")).unwrap();
    assert!(html.contains("No data recorded yet."));
}

#[test]
fn test_leaving_red_stops_feedback() {
    let temp_dir = setup_test_dir();
    let mut lines = vec!["40,0"; 3];
    lines.push("0,0");
    let (_, commands) = run_monitor(&temp_dir, &lines, 2.0);

    let sent = fs::read_to_string(&commands).unwrap();
    assert_eq!(sent, "VIB_PULSE\nVIB_ON\nVIB_OFF\n");
}

#[test]
fn test_commands_default_to_stdout() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), 2.0);

    cli()
        .arg("monitor")
        .arg("--dt")
        .arg("0.5")
        .arg("--calibrate")
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"))
        .arg("--config")
        .arg(&config)
        .write_stdin("40,0\nCALIBRATED\n40,0\n40,0\n40,0\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("CAL\nVIB_PULSE\n"))
        .stdout(predicate::str::contains("VIB_ON\n"));
}

#[test]
fn test_multiple_sessions_share_row_log() {
    let temp_dir = setup_test_dir();
    run_monitor(&temp_dir, &["40,0"; 3], 10.0);
    let (data_dir, _) = run_monitor(&temp_dir, &["40,0"; 2], 10.0);

    let csv = fs::read_to_string(data_dir.join("cts_session.csv")).unwrap();
    assert_eq!(csv.matches("timestamp,").count(), 1, "Header written once");
    assert_eq!(csv.lines().count(), 6);

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(temp_dir.path().join("config.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("rows 2"))
        .stdout(predicate::str::contains("rows 3"));
}

#[test]
fn test_report_regenerates_from_row_log() {
    let temp_dir = setup_test_dir();
    let (data_dir, _) = run_monitor(&temp_dir, &["40,0"; 15], 10.0);
    let report_path = data_dir.join("CTS_Report.html");
    fs::remove_file(&report_path).unwrap();

    // A longer threshold re-derives every row as Yellow
    let config = write_config(temp_dir.path(), 60.0);
    cli()
        .arg("report")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Report with 15 rows written"));

    let html = fs::read_to_string(&report_path).unwrap();
    assert_eq!(html.matches("<tr class='yellow'>").count(), 15);
}

#[test]
fn test_estimate_nearest_posture() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), 60.0);

    cli()
        .arg("estimate")
        .arg("--flexion-extension")
        .arg("44")
        .arg("--radial-ulnar")
        .arg("2")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("flexion_45_neutral: 3.91 kPa (Red)"));
}

#[test]
fn test_estimate_negative_angles_static() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), 60.0);

    cli()
        .arg("estimate")
        .arg("--flexion-extension")
        .arg("-31")
        .arg("--radial-ulnar")
        .arg("-9")
        .arg("--static")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("extension_30_ulnar_10:"));
}

#[test]
fn test_history_empty() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), 60.0);

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions recorded yet."));
}

#[test]
fn test_config_show_and_write() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), 12.0);

    cli()
        .arg("config")
        .arg("--config")
        .arg(&config)
        .arg("--write")
        .assert()
        .success()
        .stdout(predicate::str::contains("bad_posture_duration_threshold = 12.0"))
        .stdout(predicate::str::contains("report_log_interval = 0.3"));

    // Written file now carries every section
    let saved = fs::read_to_string(&config).unwrap();
    assert!(saved.contains("[transport]"));
    assert!(saved.contains("medium_threshold = 2.1"));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = setup_test_dir();
    let config = temp_dir.path().join("config.toml");
    fs::write(
        &config,
        "[classifier]\nmedium_threshold = 3.5\nhigh_threshold = 3.0\n",
    )
    .unwrap();

    cli()
        .arg("estimate")
        .arg("--flexion-extension")
        .arg("0")
        .arg("--radial-ulnar")
        .arg("0")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("medium_threshold"));
}
