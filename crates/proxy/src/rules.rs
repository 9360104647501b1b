// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure routing and header rules for the privileged upstream family.

use std::net::IpAddr;

use axum::http::HeaderMap;

/// Upstream hosts that get the codex path rewrite and header filtering.
pub const CHATGPT_HOSTS: [&str; 2] = ["chatgpt.com", "chat.openai.com"];

/// Headers always stripped in privileged responses mode.
pub const CHATGPT_RESPONSES_DROP_HEADERS: [&str; 7] = [
    "originator",
    "version",
    "x-codex-beta-features",
    "x-oai-web-search-eligible",
    "x-codex-turn-metadata",
    "session_id",
    "chatgpt-account-id",
];

/// Ordered prefix rewrites; the first match wins and the suffix is preserved.
pub const PATH_REWRITE_PATTERNS: [(&str, &str); 4] = [
    ("/v1/responses/compact", "/codex/responses/compact"),
    ("/responses/compact", "/codex/responses/compact"),
    ("/v1/responses", "/codex/responses"),
    ("/responses", "/codex/responses"),
];

/// Headers kept in privileged responses mode (besides the allowed prefixes).
const CHATGPT_ALLOWED_HEADERS: [&str; 4] =
    ["accept", "content-type", "content-encoding", "user-agent"];

/// Coarse classification of proxied paths for the trace log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceRoute {
    Request,
    Compact,
    Other,
}

/// Management endpoints served by the proxy itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementRoute {
    Debug,
    Trace,
    Health,
    AuthFiles,
    Shutdown,
}

/// Whether a bind host is `localhost` or a loopback IP literal.
pub fn is_loopback_host(host: &str) -> bool {
    let normalized = host.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return false;
    }
    if normalized == "localhost" {
        return true;
    }
    normalized.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

/// Classify a proxied path (query ignored) for the trace log.
pub fn trace_route(path: &str) -> TraceRoute {
    let path_only = path.split('?').next().unwrap_or("");
    if path_only.ends_with("/compact") {
        return TraceRoute::Compact;
    }
    if path_only.contains("/responses") {
        return TraceRoute::Request;
    }
    TraceRoute::Other
}

/// Classify an exact management path (query ignored).
pub fn management_route(path: &str) -> Option<ManagementRoute> {
    let path_only = path.split('?').next().unwrap_or("");
    match path_only {
        "/debug" => Some(ManagementRoute::Debug),
        "/trace" => Some(ManagementRoute::Trace),
        "/health" => Some(ManagementRoute::Health),
        "/auth-files" => Some(ManagementRoute::AuthFiles),
        "/shutdown" => Some(ManagementRoute::Shutdown),
        _ => None,
    }
}

/// Rewrite `/responses`-family paths onto the codex backend prefix.
///
/// Only applies when the upstream is a chatgpt host with the exact
/// `/backend-api` base path; other upstreams pass through untouched.
pub fn rewrite_request_path(req_path: &str, upstream_host: &str, upstream_base_path: &str) -> String {
    let host = upstream_host.to_ascii_lowercase();
    if !CHATGPT_HOSTS.contains(&host.as_str()) {
        return req_path.to_owned();
    }
    if upstream_base_path.trim_end_matches('/') != "/backend-api" {
        return req_path.to_owned();
    }
    for (old_prefix, new_prefix) in PATH_REWRITE_PATTERNS {
        if let Some(suffix) = req_path.strip_prefix(old_prefix) {
            return format!("{new_prefix}{suffix}");
        }
    }
    req_path.to_owned()
}

/// Whether a rewritten path (query ignored) targets the privileged
/// responses endpoints.
pub fn is_privileged_responses_path(req_path: &str) -> bool {
    req_path.split('?').next().unwrap_or("").starts_with("/codex/responses")
}

/// Copy client headers for the upstream leg, applying the drop rules.
///
/// Hop-by-hop headers are always stripped. In privileged responses mode only
/// an allowlist (plus `x-openai-`/`openai-` prefixes) survives, minus the
/// fixed drop set and any name containing an underscore.
pub fn build_forward_headers(incoming: &HeaderMap, chatgpt_responses_mode: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        let normalized = name.as_str();
        if matches!(normalized, "host" | "content-length" | "connection" | "transfer-encoding") {
            continue;
        }
        if chatgpt_responses_mode {
            if CHATGPT_RESPONSES_DROP_HEADERS.contains(&normalized) || normalized.contains('_') {
                continue;
            }
            if CHATGPT_ALLOWED_HEADERS.contains(&normalized)
                || normalized.starts_with("x-openai-")
                || normalized.starts_with("openai-")
            {
                headers.append(name.clone(), value.clone());
            }
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
