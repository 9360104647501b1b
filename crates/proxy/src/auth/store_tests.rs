// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use base64::Engine;

use super::*;

fn write_json(path: &Path, payload: &serde_json::Value) {
    std::fs::write(path, payload.to_string()).unwrap();
}

fn encode_b64url_json(payload: &serde_json::Value) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string())
}

#[test]
fn accepts_supported_token_shapes_in_sort_order() {
    let tmp = tempfile::tempdir().unwrap();
    write_json(
        &tmp.path().join("primary.json"),
        &serde_json::json!({"access_token": "tok-primary", "email": "primary@example.com"}),
    );
    write_json(
        &tmp.path().join("nested.json"),
        &serde_json::json!({"tokens": {
            "access_token": "tok-nested",
            "account_id": "acc-1",
            "email": "nested@example.com"
        }}),
    );
    write_json(&tmp.path().join("openai_key.json"), &serde_json::json!({"OPENAI_API_KEY": "tok-o"}));
    write_json(&tmp.path().join("fallback.json"), &serde_json::json!({"api_key": "tok-f"}));

    let records = load_auth_records(&tmp.path().to_string_lossy());
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["fallback.json", "nested.json", "openai_key.json", "primary.json"]);

    let nested = records.iter().find(|r| r.name == "nested.json").unwrap();
    assert_eq!(nested.token, "tok-nested");
    assert_eq!(nested.account_id.as_deref(), Some("acc-1"));
    assert_eq!(nested.email.as_deref(), Some("nested@example.com"));

    let primary = records.iter().find(|r| r.name == "primary.json").unwrap();
    assert_eq!(primary.token, "tok-primary");
    assert_eq!(primary.email.as_deref(), Some("primary@example.com"));
}

#[test]
fn id_token_email_overrides_other_sources() {
    let tmp = tempfile::tempdir().unwrap();
    let id_token = [
        encode_b64url_json(&serde_json::json!({"alg": "none", "typ": "JWT"})),
        encode_b64url_json(&serde_json::json!({"email": "jwt@example.com"})),
        "signature".to_owned(),
    ]
    .join(".");
    write_json(
        &tmp.path().join("jwt.json"),
        &serde_json::json!({
            "email": "root@example.com",
            "tokens": {
                "access_token": "tok-jwt",
                "email": "nested@example.com",
                "id_token": id_token
            }
        }),
    );

    let records = load_auth_records(&tmp.path().to_string_lossy());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].email.as_deref(), Some("jwt@example.com"));
}

#[test]
fn ignores_invalid_or_empty_token_files() {
    let tmp = tempfile::tempdir().unwrap();
    write_json(&tmp.path().join("valid.json"), &serde_json::json!({"access_token": "tok-valid"}));
    std::fs::write(tmp.path().join("invalid.json"), "{not-json").unwrap();
    write_json(&tmp.path().join("empty_object.json"), &serde_json::json!({}));
    write_json(&tmp.path().join("wrong_type.json"), &serde_json::json!(["not", "object"]));
    write_json(&tmp.path().join("blank_token.json"), &serde_json::json!({"access_token": "   "}));
    std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

    let records = load_auth_records(&tmp.path().to_string_lossy());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "valid.json");
    assert_eq!(records[0].token, "tok-valid");
}

#[test]
fn missing_directory_yields_empty_list() {
    let records = load_auth_records("/nonexistent/rrproxy-auth-dir");
    assert!(records.is_empty());
}

#[test]
fn decode_jwt_payload_tolerates_garbage() {
    assert_eq!(decode_jwt_payload(""), serde_json::json!({}));
    assert_eq!(decode_jwt_payload("no-dots-here"), serde_json::json!({}));
    assert_eq!(decode_jwt_payload("a.%%%.c"), serde_json::json!({}));

    let payload = encode_b64url_json(&serde_json::json!({"email": "x@y"}));
    let token = format!("head.{payload}.sig");
    assert_eq!(decode_jwt_payload(&token)["email"], "x@y");

    // Padded payloads decode too.
    let padded = format!("head.{payload}==.sig");
    assert_eq!(decode_jwt_payload(&padded)["email"], "x@y");
}
