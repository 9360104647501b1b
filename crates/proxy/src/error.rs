// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON response helpers for the proxy surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Build a `{"error": message}` JSON response with the given status.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Build a JSON response from an arbitrary payload.
pub fn json_payload(status: StatusCode, payload: Value) -> Response {
    (status, Json(payload)).into_response()
}
