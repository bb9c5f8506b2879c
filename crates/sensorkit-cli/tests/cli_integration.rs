//! CLI Integration Tests
//!
//! These tests run the `sensorkit` binary against its simulated host with a
//! throwaway anchor database and config file per test.
//!
//! ```
//! cargo test --package sensorkit-cli --test cli_integration
//! ```

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

/// Run sensorkit with an isolated database and config file
fn run_sensorkit(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sensorkit"))
        .arg("--db")
        .arg(dir.join("anchors.db"))
        .arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--no-color")
        .args(args)
        .env_remove("SENSORKIT_DB")
        .env_remove("SENSORKIT_CONFIG")
        .env_remove("SENSORKIT_SENSOR")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run sensorkit binary")
}

/// Run a command that must succeed and parse its JSON output
fn run_json(dir: &Path, args: &[&str]) -> Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = run_sensorkit(dir, &full);
    assert!(
        output.status.success(),
        "sensorkit {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

// =============================================================================
// Help and Catalog
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_sensorkit"))
        .arg("--help")
        .output()
        .expect("Failed to run sensorkit binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["sensors", "devices", "fetch", "sync", "anchors", "reset"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_sensors_json_lists_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let sensors = run_json(dir.path(), &["sensors"]);
    let sensors = sensors.as_array().unwrap();
    assert_eq!(sensors.len(), 10);
    assert_eq!(sensors[0]["id"], "ambientLightSensor");
    assert!(sensors.iter().all(|s| s["quarantine_hours"] == 24));
    let visits = sensors.iter().find(|s| s["id"] == "visits").unwrap();
    assert_eq!(visits["processing"], "PassThrough");
}

#[test]
fn test_sensors_text_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_sensorkit(dir.path(), &["sensors"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("heartRate"));
    assert!(stdout.contains("Electrocardiogram"));
}

#[test]
fn test_unknown_sensor_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_sensorkit(dir.path(), &["devices", "--sensor", "thermometer"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown sensor"), "stderr: {stderr}");
}

// =============================================================================
// Devices and Fetch
// =============================================================================

#[test]
fn test_devices_json() {
    let dir = tempfile::tempdir().unwrap();
    let devices = run_json(dir.path(), &["devices", "--sensor", "accelerometer"]);
    let product_types: Vec<&str> = devices
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["product_type"].as_str().unwrap())
        .collect();
    assert_eq!(product_types, vec!["Watch6,1", "iPhone14,2"]);
}

#[test]
fn test_fetch_most_recent_window() {
    let dir = tempfile::tempdir().unwrap();
    let fetched = run_json(
        dir.path(),
        &["fetch", "--sensor", "heartRate", "--last", "2"],
    );
    assert_eq!(fetched["device"], "Watch6,1");
    // Heart rate is simulated every 15 minutes.
    assert_eq!(fetched["results"], 8);
    assert_eq!(fetched["samples"].as_array().unwrap().len(), 8);
    assert_eq!(fetched["samples"][0]["sample"]["kind"], "HeartRate");
}

#[test]
fn test_fetch_unknown_device_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_sensorkit(
        dir.path(),
        &["fetch", "--sensor", "visits", "--device", "Watch6,1"],
    );
    assert!(!output.status.success());
}

// =============================================================================
// Sync, Anchors and Reset
// =============================================================================

#[test]
fn test_sync_resumes_from_stored_anchor() {
    let dir = tempfile::tempdir().unwrap();

    let first = run_json(dir.path(), &["sync", "--sensor", "visits"]);
    assert_eq!(first["policy"], "every 1d");
    // Two visits a day over the seven-day backfill. The cutoff keeps moving
    // while the pass runs, so a final sliver window may follow the seventh.
    assert_eq!(first["samples"], 14);
    let batches = first["batches"].as_array().unwrap();
    assert!((7..=8).contains(&batches.len()), "{} batches", batches.len());
    for pair in batches.windows(2) {
        assert_eq!(pair[0]["range"]["end"], pair[1]["range"]["start"]);
    }
    let checkpoint = first["checkpoints"]["iPhone14,2"].clone();
    assert_eq!(&checkpoint, &batches[batches.len() - 1]["range"]["end"]);

    let second = run_json(dir.path(), &["sync", "--sensor", "visits"]);
    assert_eq!(second["samples"], 0);
    if let Some(batch) = second["batches"].as_array().unwrap().first() {
        assert_eq!(batch["range"]["start"], checkpoint);
    }

    let anchors = run_json(dir.path(), &["anchors"]);
    let anchors = anchors.as_array().unwrap();
    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors[0]["key"], "sensorkit.anchor.visits.iPhone14,2");
}

#[test]
fn test_sync_by_count() {
    let dir = tempfile::tempdir().unwrap();
    let synced = run_json(
        dir.path(),
        &["sync", "--sensor", "visits", "--count", "5"],
    );
    assert_eq!(synced["policy"], "every 5 samples");
    let batches = synced["batches"].as_array().unwrap();
    assert!(batches.len() >= 3);
    assert!(synced["samples"].as_u64().unwrap() >= 14);
}

#[test]
fn test_sync_by_count_limit_releases_reader() {
    let dir = tempfile::tempdir().unwrap();
    let synced = run_json(
        dir.path(),
        &["sync", "--sensor", "visits", "--count", "2", "--limit", "1"],
    );
    let batches = synced["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(synced["samples"], 2);
    assert_eq!(
        synced["checkpoints"]["iPhone14,2"],
        batches[0]["range"]["end"]
    );
    assert_eq!(batches[0]["samples_span"]["latest"], batches[0]["range"]["end"]);

    let rest = run_json(dir.path(), &["sync", "--sensor", "visits", "--count", "2"]);
    let batches = rest["batches"].as_array().unwrap();
    assert_eq!(batches[0]["range"]["start"], synced["checkpoints"]["iPhone14,2"]);
    assert!(rest["samples"].as_u64().unwrap() >= 12);
}

#[test]
fn test_oversized_windows_cover_everything() {
    let dir = tempfile::tempdir().unwrap();
    let synced = run_json(
        dir.path(),
        &["sync", "--sensor", "visits", "--every-minutes", "4294967295"],
    );
    let batches = synced["batches"].as_array().unwrap().len();
    assert!((1..=2).contains(&batches), "{batches} batches");
    assert_eq!(synced["samples"], 14);

    let fetched = run_json(
        dir.path(),
        &["fetch", "--sensor", "visits", "--last", "4294967295"],
    );
    // Nine simulated days, two visits a day, minus the quarantined last day.
    let results = fetched["results"].as_u64().unwrap();
    assert!((16..=18).contains(&results), "{results} results");
}

#[test]
fn test_sync_limit_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    let synced = run_json(
        dir.path(),
        &["sync", "--sensor", "heartRate", "--limit", "2"],
    );
    let batches = synced["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 2);
    // Two two-hour windows of 15-minute samples.
    assert_eq!(synced["samples"], 16);
    assert_eq!(
        synced["checkpoints"]["Watch6,1"],
        batches[1]["range"]["end"]
    );
}

#[test]
fn test_reset_sensor_and_all() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["sync", "--sensor", "visits"]);
    run_json(dir.path(), &["sync", "--sensor", "pedometerData", "--limit", "1"]);

    let anchors = run_json(dir.path(), &["anchors"]);
    assert_eq!(anchors.as_array().unwrap().len(), 2);

    let reset = run_json(dir.path(), &["reset", "--sensor", "visits"]);
    assert_eq!(reset["removed"], 1);
    let anchors = run_json(dir.path(), &["anchors", "--sensor", "visits"]);
    assert!(anchors.as_array().unwrap().is_empty());

    let reset = run_json(dir.path(), &["reset", "--all"]);
    assert_eq!(reset["removed"], 1);
    let anchors = run_json(dir.path(), &["anchors"]);
    assert!(anchors.as_array().unwrap().is_empty());
}

#[test]
fn test_config_batch_override_and_denial() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[batch]\nvisits = { minutes = 720 }\n\n[demo]\ndenied = [\"heartRate\"]\n",
    )
    .unwrap();

    let synced = run_json(dir.path(), &["sync", "--sensor", "visits"]);
    let batches = synced["batches"].as_array().unwrap().len();
    assert!((14..=15).contains(&batches), "{batches} batches");
    assert_eq!(synced["samples"], 14);

    let output = run_sensorkit(dir.path(), &["sync", "--sensor", "heartRate"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Authorization denied"), "stderr: {stderr}");
}
