use approx::assert_relative_eq;
use chrono::{DateTime, NaiveDate};
use medcard_core::{DecodedPayload, EmergencyPayload, SymbolDecode, SymbolLocation};
use medcard_scanner::{
    export_file_name, local_export_date, FileStore, HistoryStore, KeyValueStore, ResultHandler,
    ScanResult, Silent, HISTORY_KEY, HISTORY_LIMIT,
};
use nalgebra::Point2;

fn decode(text: &str) -> SymbolDecode {
    SymbolDecode {
        text: text.into(),
        location: Some(SymbolLocation {
            corners: [
                Point2::new(10.0, 10.0),
                Point2::new(30.0, 10.0),
                Point2::new(30.0, 30.0),
                Point2::new(10.0, 30.0),
            ],
        }),
    }
}

fn at(ms: i64) -> chrono::DateTime<chrono::Utc> {
    DateTime::from_timestamp_millis(ms).expect("timestamp")
}

#[test]
fn file_history_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut store = HistoryStore::in_dir(dir.path());
        let result = ScanResult::from_decode(decode("first"), at(1_000));
        store.record(&result).expect("record");
    }
    assert!(dir.path().join(format!("{HISTORY_KEY}.json")).exists());

    let mut store = HistoryStore::in_dir(dir.path());
    assert_eq!(store.len().expect("len"), 1);
    store
        .record(&ScanResult::from_decode(decode("second"), at(2_000)))
        .expect("record");

    let entries = store.load().expect("load");
    assert_eq!(entries[0].result.raw_text, "second");
    assert_eq!(entries[1].result.raw_text, "first");
    assert!(entries[0].result.location.is_none());
}

#[test]
fn file_history_is_bounded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = HistoryStore::in_dir(dir.path());
    for i in 0..(HISTORY_LIMIT as i64 + 7) {
        let result = ScanResult::from_decode(decode(&format!("scan {i}")), at(1_000 + i));
        store.record(&result).expect("record");
    }
    let entries = store.load().expect("load");
    assert_eq!(entries.len(), HISTORY_LIMIT);
    assert_eq!(entries[0].result.raw_text, "scan 26");
    assert_eq!(entries[HISTORY_LIMIT - 1].result.raw_text, "scan 7");
}

#[test]
fn clear_and_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let mut store = HistoryStore::in_dir(dir.path());
    store
        .record(&ScanResult::from_decode(decode("hello"), at(5)))
        .expect("record");

    let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
    let path = store.export_to_dir(out.path(), date).expect("export");
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some(export_file_name(date).as_str())
    );
    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(exported[0]["result"]["rawText"], "hello");

    store.clear().expect("clear");
    assert!(store.is_empty().expect("empty"));
    store.clear().expect("clear twice");
    assert!(FileStore::new(dir.path())
        .get(HISTORY_KEY)
        .expect("get")
        .is_none());
}

#[test]
fn export_today_uses_local_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let store = HistoryStore::in_dir(dir.path());

    let before = chrono::Local::now().date_naive();
    let path = store.export_today(out.path()).expect("export");
    let after = chrono::Local::now().date_naive();

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .expect("file name")
        .to_owned();
    assert!(name == export_file_name(before) || name == export_file_name(after));
    let today = local_export_date();
    assert!(before <= today && today <= chrono::Local::now().date_naive());
}

#[test]
fn handler_keeps_location_for_overlay_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = ResultHandler::new(HistoryStore::in_dir(dir.path()), Box::new(Silent));

    let payload = EmergencyPayload {
        name: Some("R. Osei".into()),
        allergies: Some(vec!["latex".into()]),
        ..EmergencyPayload::default()
    };
    let text = serde_json::to_string(&payload).expect("json");
    let (result, entry) = handler.handle(decode(&text), at(42));

    let center = result.location.expect("location").center();
    assert_relative_eq!(center.x, 20.0);
    assert_relative_eq!(center.y, 20.0);
    assert_eq!(result.payload, DecodedPayload::Structured(payload));

    let entry = entry.expect("recorded");
    assert!(entry.result.location.is_none());
    assert_eq!(entry.timestamp, at(42));
}
