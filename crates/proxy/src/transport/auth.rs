// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Management-key validation.

use axum::http::HeaderMap;

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Check `X-Management-Key` against the configured key.
///
/// An empty configured key disables the check; startup refuses that
/// configuration for the real server, so it only arises in tests.
pub fn authorize_management(headers: &HeaderMap, expected: &str) -> bool {
    if expected.is_empty() {
        return true;
    }
    let provided = headers.get("x-management-key").and_then(|v| v.to_str().ok()).unwrap_or("");
    constant_time_eq(provided, expected)
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
