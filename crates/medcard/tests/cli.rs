use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

fn medcard() -> Command {
    Command::cargo_bin("medcard").expect("binary")
}

fn write_payload(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("payload.json");
    let payload = json!({
        "id": "p-001",
        "name": "Asha K.",
        "bloodGroup": "O-",
        "allergies": ["penicillin"],
        "emergencyContact": { "name": "Ravi K.", "phone": "+91 98 0000 0000" }
    });
    std::fs::write(&path, payload.to_string()).expect("write payload");
    path
}

#[test]
fn decode_garbage_is_raw() {
    medcard()
        .args(["decode", "not json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"raw\"").and(predicate::str::contains("not json")));
}

#[test]
fn encode_then_decode_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let payload = write_payload(dir.path());

    let out = medcard()
        .arg("encode")
        .arg(&payload)
        .output()
        .expect("run encode");
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).expect("utf8");
    let envelope: Value = serde_json::from_str(text.trim()).expect("envelope json");
    assert_eq!(envelope["i"], "MEDCARD");
    assert_eq!(envelope["v"], "1.0");

    medcard()
        .args(["decode", text.trim()])
        .assert()
        .success()
        .stdout(predicate::str::contains("structured").and(predicate::str::contains("Asha K.")));
}

#[test]
fn encode_png_then_decode_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let payload = write_payload(dir.path());
    let png = dir.path().join("code.png");

    medcard()
        .arg("encode")
        .arg(&payload)
        .arg("--out")
        .arg(&png)
        .args(["--context", "poor-lighting", "--module-px", "4"])
        .assert()
        .success();
    assert!(png.exists());

    medcard()
        .arg("decode")
        .arg("--image")
        .arg(&png)
        .assert()
        .success()
        .stdout(predicate::str::contains("O-"));
}

#[test]
fn oversized_payload_fails_loudly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("big.json");
    let allergies: Vec<String> = (0..50)
        .map(|i| format!("allergy {i}: severe reaction, carries epinephrine auto-injector"))
        .collect();
    std::fs::write(&path, json!({ "allergies": allergies }).to_string()).expect("write");

    medcard()
        .arg("encode")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("budget"));
}

#[test]
fn scan_replay_records_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let payload = write_payload(dir.path());
    let frames = dir.path().join("frames");
    let history = dir.path().join("history");
    std::fs::create_dir_all(&frames).expect("frames dir");

    medcard()
        .arg("encode")
        .arg(&payload)
        .arg("--out")
        .arg(frames.join("001.png"))
        .assert()
        .success();

    medcard()
        .arg("scan")
        .arg(&frames)
        .arg("--history-dir")
        .arg(&history)
        .assert()
        .success()
        .stdout(predicate::str::contains("Asha K."));

    let out = medcard()
        .args(["history", "list", "--dir"])
        .arg(&history)
        .output()
        .expect("run history");
    assert!(out.status.success());
    let entries: Value = serde_json::from_slice(&out.stdout).expect("history json");
    assert_eq!(entries.as_array().map(Vec::len), Some(1));

    let exports = dir.path().join("exports");
    medcard()
        .args(["history", "export"])
        .arg(&exports)
        .arg("--dir")
        .arg(&history)
        .assert()
        .success()
        .stdout(predicate::str::contains("medcard-scan-history-"));

    medcard()
        .args(["history", "clear", "--dir"])
        .arg(&history)
        .assert()
        .success();
    medcard()
        .args(["history", "list", "--dir"])
        .arg(&history)
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn empty_history_lists_as_empty_array() {
    let dir = tempfile::tempdir().expect("tempdir");
    medcard()
        .args(["history", "list", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}
