use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};

fn job() -> Value {
    json!({
        "pages": [{
            "index": 0,
            "width": 612.0,
            "height": 792.0,
            "fragments": [
                { "text": "The", "rect": [200.0, 300.0, 228.0, 310.0], "line": 0 },
                { "text": "quick", "rect": [232.0, 300.0, 268.0, 310.0], "line": 0 },
                { "text": "brown", "rect": [272.0, 300.0, 314.0, 310.0], "line": 0 },
                { "text": "fox", "rect": [200.0, 314.0, 224.0, 324.0], "line": 1 }
            ]
        }],
        "annotations": [
            { "quote": "quick", "explanation": "fast" },
            { "query": "fox", "explanation": "an animal", "color": "#ff8800" },
            { "quote": "lazy dog", "explanation": "absent" },
            { "explanation": "no quote at all" }
        ]
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

#[test]
fn lays_out_job_and_prints_summary() {
    let temp = tempfile::tempdir().unwrap();
    let job_path = write_json(temp.path(), "job.json", &job());

    let assert = cargo_bin_cmd!("place-notes")
        .arg(&job_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("placed=2 unplaceable=0 skipped=2"));

    let value = stdout_json(&assert.get_output().stdout);
    let placements = value["pages"][0]["placements"].as_array().unwrap();
    assert_eq!(placements.len(), 2);
    assert_eq!(placements[0]["quote"], "quick");
    assert_eq!(placements[1]["quote"], "fox");
    assert_eq!(placements[1]["color"], "#ff8800");

    let kinds: Vec<&str> = value["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["quote_not_found", "malformed_annotation"]);
}

#[test]
fn writes_output_file_and_honours_flags() {
    let temp = tempfile::tempdir().unwrap();
    let job_path = write_json(temp.path(), "job.json", &job());
    let out = temp.path().join("layout.json");

    cargo_bin_cmd!("place-notes")
        .arg(&job_path)
        .args(["--side", "right", "--no-leader", "--threads", "1", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let value: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    for p in value["pages"][0]["placements"].as_array().unwrap() {
        assert_eq!(p["side"], "right");
        assert!(p["leader_points"].as_array().unwrap().is_empty());
    }
}

#[test]
fn separate_annotation_file_replaces_job_annotations() {
    let temp = tempfile::tempdir().unwrap();
    let job_path = write_json(temp.path(), "job.json", &job());
    let annotations = write_json(
        temp.path(),
        "notes.json",
        &json!({ "annotations": [{ "quote": "brown", "explanation": "a color" }] }),
    );

    let assert = cargo_bin_cmd!("place-notes")
        .arg(&job_path)
        .arg("--annotations")
        .arg(&annotations)
        .assert()
        .success()
        .stderr(predicate::str::contains("placed=1 unplaceable=0 skipped=0"));

    let value = stdout_json(&assert.get_output().stdout);
    assert_eq!(value["pages"][0]["placements"][0]["quote"], "brown");
}

#[test]
fn fails_for_missing_job_file() {
    cargo_bin_cmd!("place-notes")
        .arg("does-not-exist.json")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to read job file"));
}

#[test]
fn fails_for_invalid_config() {
    let temp = tempfile::tempdir().unwrap();
    let job_path = write_json(temp.path(), "job.json", &job());
    let config = write_json(
        temp.path(),
        "config.json",
        &json!({ "note_width": 40.0, "min_note_width": 56.0 }),
    );

    cargo_bin_cmd!("place-notes")
        .arg(&job_path)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_note_width"));
}

#[test]
fn rejects_unknown_side() {
    let temp = tempfile::tempdir().unwrap();
    let job_path = write_json(temp.path(), "job.json", &job());

    cargo_bin_cmd!("place-notes")
        .arg(&job_path)
        .args(["--side", "middle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown side preference"));
}
