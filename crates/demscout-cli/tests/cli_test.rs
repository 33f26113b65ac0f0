//! Integration tests for the demscout binary
//!
//! These runs never reach the network: they either fail before discovery
//! or retrieve from a working directory without accepted tiles.

use std::process::Command;
use tempfile::TempDir;

fn demscout() -> Command {
    Command::new(env!("CARGO_BIN_EXE_demscout"))
}

#[test]
fn test_download_only_with_no_rows_creates_layout() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("project");

    let output = demscout()
        .args(["--path", work.to_str().unwrap(), "--aoi", "aoi.geojson", "--year", "2015", "--download", "--json"])
        .output()
        .expect("Failed to execute demscout");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("Output should be valid JSON");
    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["data"]["year_threshold"], 2015);
    assert_eq!(parsed["data"]["retrieval"]["total"], 0);
    assert!(parsed["data"].get("discovery").is_none());

    for sub in ["tmp/geoms", "tmp/csvs", "tmp/zips", "tmp/dems"] {
        assert!(work.join(sub).is_dir(), "{} should exist", sub);
    }
}

#[test]
fn test_missing_aoi_is_fatal() {
    let dir = TempDir::new().unwrap();

    let output = demscout()
        .args([
            "--path",
            dir.path().to_str().unwrap(),
            "--aoi",
            "/nonexistent/aoi.geojson",
            "--year",
            "2015",
            "--scrape",
            "--json",
        ])
        .output()
        .expect("Failed to execute demscout");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"status\": \"error\""));
    assert!(stderr.contains("area of interest"));
}

#[test]
fn test_invalid_config_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("demscout.toml"), "discovery_workers = 0\n").unwrap();

    let output = demscout()
        .args(["--path", dir.path().to_str().unwrap(), "--aoi", "aoi.geojson", "--year", "2015", "--download"])
        .output()
        .expect("Failed to execute demscout");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("discovery_workers"));
}

#[test]
fn test_rejects_malformed_year() {
    let output = demscout()
        .args(["--path", "/tmp", "--aoi", "aoi.geojson", "--year", "15"])
        .output()
        .expect("Failed to execute demscout");

    assert!(!output.status.success());
}
