// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn error_code_prefers_nested_error_code() {
    let body = br#"{"error": {"code": "token_expired"}, "code": "outer"}"#;
    assert_eq!(extract_error_code(body).as_deref(), Some("token_expired"));
}

#[test]
fn error_code_falls_back_to_root_code() {
    let body = br#"{"code": "rate_limited"}"#;
    assert_eq!(extract_error_code(body).as_deref(), Some("rate_limited"));

    let body = br#"{"error": {"message": "nope"}, "code": "fallback"}"#;
    assert_eq!(extract_error_code(body).as_deref(), Some("fallback"));
}

#[test]
fn error_code_ignores_non_objects_and_blanks() {
    assert_eq!(extract_error_code(b""), None);
    assert_eq!(extract_error_code(b"not json"), None);
    assert_eq!(extract_error_code(br#"["array"]"#), None);
    assert_eq!(extract_error_code(br#"{"code": "   "}"#), None);
    assert_eq!(extract_error_code(br#"{"error": {"code": 42}}"#), None);
    assert_eq!(extract_error_code(br#"{"ok": true}"#), None);
}

#[test]
fn request_ids_are_twelve_hex_chars() {
    let id = new_request_id();
    assert_eq!(id.len(), 12);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(new_request_id(), new_request_id());
}
