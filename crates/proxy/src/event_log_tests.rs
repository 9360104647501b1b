// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn write_appends_one_json_object_per_line() {
    let tmp = tempfile::tempdir().unwrap();
    let log = EventLogger::new(tmp.path());

    log.write(
        LogLevel::Info,
        "proxy.started",
        "proxy server started",
        serde_json::json!({"port": 9000}),
    )
    .await;
    log.write(LogLevel::Warn, "proxy.request", "request attempt completed", serde_json::json!({}))
        .await;

    let contents = std::fs::read_to_string(log.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["level"], "INFO");
    assert_eq!(first["event"], "proxy.started");
    assert_eq!(first["message"], "proxy server started");
    assert_eq!(first["port"], 9000);
    assert!(first["ts"].is_string());

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["level"], "WARN");
}

#[tokio::test]
async fn write_creates_missing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let nested = tmp.path().join("auths");
    let log = EventLogger::new(&nested);

    log.write(LogLevel::Info, "proxy.started", "", serde_json::json!({})).await;
    assert!(log.path().exists());
}

#[tokio::test]
async fn tail_returns_last_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let log = EventLogger::new(tmp.path());

    for i in 0..5 {
        log.write(LogLevel::Info, "e", "", serde_json::json!({"n": i})).await;
    }

    let tail = log.tail(2);
    assert_eq!(tail.len(), 2);
    let last: serde_json::Value = serde_json::from_str(&tail[1]).unwrap();
    assert_eq!(last["n"], 4);

    // Zero means the default window, not zero lines.
    assert_eq!(log.tail(0).len(), 5);
}

#[test]
fn tail_of_missing_file_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let log = EventLogger::new(tmp.path());
    assert!(log.tail(10).is_empty());
}

#[test]
fn file_name_matches_published_layout() {
    let log = EventLogger::new(std::path::Path::new("/tmp/auths"));
    assert_eq!(log.path(), std::path::Path::new("/tmp/auths/rr_proxy_v2.events.jsonl"));
}
