// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loads auth records from a directory of JSON descriptor files.
//!
//! Several on-disk shapes are recognized; files that cannot be parsed or
//! yield no token are skipped without failing the load.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde_json::Value;

use crate::auth::AuthRecord;
use crate::config::resolve_path;

/// List regular `*.json` files in the auth directory, sorted by path.
///
/// A missing or unreadable directory yields the empty list, not an error.
fn auth_json_files(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    files
}

/// Trim a JSON value into a non-empty string, if it has one.
fn clean_text(value: Option<&Value>) -> Option<String> {
    let text = match value {
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode the payload segment of a JWT without verifying it.
///
/// Returns an empty object on any structural or encoding failure.
pub fn decode_jwt_payload(token: &str) -> Value {
    let empty = || Value::Object(serde_json::Map::new());
    let mut parts = token.split('.');
    let payload_b64 = match (parts.next(), parts.next()) {
        (Some(_), Some(payload)) => payload.trim_end_matches('='),
        _ => return empty(),
    };
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()
        .and_then(|raw| serde_json::from_slice::<Value>(&raw).ok());
    match decoded {
        Some(value @ Value::Object(_)) => value,
        _ => empty(),
    }
}

/// Extract `(token, email, account_id)` from one auth file's JSON object.
///
/// Token preference order: `tokens.access_token`, `access_token`,
/// `OPENAI_API_KEY`, then the first of `api_key`/`openai_api_key`/`token`.
/// An email inside `tokens.id_token`'s JWT payload overrides every other
/// email source.
fn extract_auth_fields(raw: &Value) -> (String, Option<String>, Option<String>) {
    let mut token = String::new();
    let mut email = clean_text(raw.get("email"));
    let mut account_id = None;

    if let Some(tokens) = raw.get("tokens").and_then(Value::as_object) {
        token = tokens.get("access_token").and_then(Value::as_str).unwrap_or("").to_owned();
        account_id = clean_text(tokens.get("account_id"));
        if email.is_none() {
            email = clean_text(tokens.get("email"));
        }
        if let Some(id_token) = clean_text(tokens.get("id_token")) {
            let payload = decode_jwt_payload(&id_token);
            if let Some(jwt_email) = clean_text(payload.get("email")) {
                email = Some(jwt_email);
            }
        }
    }

    if token.is_empty() {
        token = raw.get("access_token").and_then(Value::as_str).unwrap_or("").to_owned();
    }
    if token.is_empty() {
        token = raw.get("OPENAI_API_KEY").and_then(Value::as_str).unwrap_or("").to_owned();
    }
    if token.is_empty() {
        for key in ["api_key", "openai_api_key", "token"] {
            token = raw.get(key).and_then(Value::as_str).unwrap_or("").to_owned();
            if !token.is_empty() {
                break;
            }
        }
    }

    (token.trim().to_owned(), email, account_id)
}

/// Load all auth records from `auth_dir` (with `~` expansion), in directory
/// sort order, skipping invalid files.
pub fn load_auth_records(auth_dir: &str) -> Vec<AuthRecord> {
    let root = resolve_path(auth_dir);
    let mut records = Vec::new();
    for path in auth_json_files(&root) {
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Ok(raw) = serde_json::from_str::<Value>(&contents) else {
            tracing::debug!(path = %path.display(), "skipping unparsable auth file");
            continue;
        };
        if !raw.is_object() {
            continue;
        }
        let (token, email, account_id) = extract_auth_fields(&raw);
        if token.is_empty() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_owned();
        records.push(AuthRecord {
            name,
            path: path.to_string_lossy().into_owned(),
            token,
            email,
            account_id,
        });
    }
    records
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
