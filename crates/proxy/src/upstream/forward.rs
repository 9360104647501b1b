// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-request forwarding with auth rotation and retry.
//!
//! One client request becomes up to `pool.count()` upstream attempts; each
//! attempt is traced and fed back to the pool. SSE responses are streamed
//! through without buffering; everything else is buffered with a hard cap.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::Request;
use axum::http::header::{
    HeaderName, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use serde_json::json;

use crate::error::json_error;
use crate::rules;
use crate::state::ProxyState;
use crate::trace::TraceEvent;

/// Hard cap on buffered request bodies.
pub const MAX_REQUEST_BODY: usize = 10 * 1024 * 1024;
/// Hard cap on buffered (non-streaming) response bodies.
pub const MAX_RESPONSE_BODY: usize = 10 * 1024 * 1024;

/// Hop-by-hop headers never copied back to the client.
const STRIP_RESPONSE_HEADERS: [&str; 3] = ["transfer-encoding", "connection", "content-length"];

/// Forward one client request upstream, rotating auths on 401/403/429.
pub async fn proxy_request(state: Arc<ProxyState>, req: Request) -> Response {
    let method = req.method().clone();
    let incoming_path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string());
    let incoming_headers = req.headers().clone();

    let route = rules::trace_route(&incoming_path);
    let rewritten_path = rules::rewrite_request_path(
        &incoming_path,
        &state.upstream.host,
        &state.upstream.base_path,
    );
    let base_path = state.upstream.base_path.as_str();
    // A client may already send the base-prefixed form; avoid doubling it.
    let full_path = if !base_path.is_empty() && rewritten_path.starts_with(&format!("{base_path}/"))
    {
        rewritten_path.clone()
    } else {
        format!("{base_path}{rewritten_path}")
    };
    let chatgpt_backend = state.upstream.chatgpt_backend();
    let chatgpt_responses_mode =
        chatgpt_backend && rules::is_privileged_responses_path(&rewritten_path);

    // Reject a malformed or oversize declared length before reading anything.
    if let Some(declared) = incoming_headers.get(CONTENT_LENGTH) {
        let Some(length) = declared.to_str().ok().and_then(|v| v.parse::<u64>().ok()) else {
            return json_error(StatusCode::BAD_REQUEST, "invalid content length");
        };
        if length > MAX_REQUEST_BODY as u64 {
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
    }
    let body = match axum::body::to_bytes(req.into_body(), MAX_REQUEST_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => return json_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
    };

    let mut base_headers = rules::build_forward_headers(&incoming_headers, chatgpt_responses_mode);
    if !body.is_empty() && !base_headers.contains_key(CONTENT_TYPE) {
        let content_type = incoming_headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        base_headers.insert(CONTENT_TYPE, content_type);
    }
    if chatgpt_backend {
        default_header(&mut base_headers, "origin", "https://chatgpt.com");
        default_header(&mut base_headers, "referer", "https://chatgpt.com/");
        default_header(&mut base_headers, "user-agent", "codex-cli");
    }

    let max_attempts = state.pool.count().await.max(1);
    let request_id = new_request_id();

    let mut final_response = FinalResponse::NoAuths;

    for attempt in 1..=max_attempts {
        let Some(record) = state.pool.pick().await else {
            break;
        };

        let mut headers = base_headers.clone();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", record.token)) {
            headers.insert(AUTHORIZATION, value);
        }
        if chatgpt_backend {
            if let Some(account_id) = record.account_id.as_deref() {
                if let Ok(value) = HeaderValue::from_str(account_id) {
                    headers.insert(HeaderName::from_static("chatgpt-account-id"), value);
                }
            }
        }

        let start = Instant::now();
        let mut error_message: Option<String> = None;
        let mut error_code: Option<String> = None;

        match dispatch_attempt(&state, &method, &full_path, &headers, &body).await {
            Ok(AttemptOutcome::Stream(resp)) => {
                final_response = FinalResponse::Stream(resp);
            }
            Ok(AttemptOutcome::Buffered { status, headers, body }) => {
                error_code = extract_error_code(&body);
                final_response = FinalResponse::Buffered { status, headers, body };
            }
            Ok(AttemptOutcome::Oversize) => {
                final_response = FinalResponse::synthetic(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    json!({ "error": "response body too large" }),
                );
            }
            Err(e) => {
                let detail = e.to_string();
                tracing::warn!(url = %state.upstream.url_for(&full_path), err = %detail, "upstream dispatch failed");
                error_message = Some(detail.clone());
                error_code = Some("upstream_request_failed".to_owned());
                final_response = FinalResponse::synthetic(
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "upstream request failed", "detail": detail }),
                );
            }
        }

        let final_status = final_response.status();
        state
            .record_attempt(TraceEvent {
                id: None,
                ts: epoch_secs_f64(),
                request_id: request_id.clone(),
                method: method.to_string(),
                path: incoming_path.clone(),
                route,
                status: final_status,
                latency_ms: start.elapsed().as_millis() as u64,
                auth_file: record.name.clone(),
                auth_email: record.email.clone(),
                attempt: attempt as u32,
                client_ip: client_ip.clone(),
                error: error_message,
            })
            .await;
        state.pool.mark_result(&record.name, final_status, error_code.as_deref(), None).await;

        if matches!(final_status, 401 | 403 | 429) && attempt < max_attempts {
            continue;
        }
        break;
    }

    final_response.into_response()
}

/// What one upstream dispatch produced.
enum AttemptOutcome {
    Buffered { status: StatusCode, headers: HeaderMap, body: Bytes },
    Stream(reqwest::Response),
    Oversize,
}

/// One upstream dispatch. Streaming responses are handed back unread.
async fn dispatch_attempt(
    state: &ProxyState,
    method: &Method,
    full_path: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<AttemptOutcome, reqwest::Error> {
    let url = state.upstream.url_for(full_path);
    let resp = state
        .http
        .request(method.clone(), url)
        .headers(headers.clone())
        .body(body.clone())
        .send()
        .await?;

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if content_type.contains("text/event-stream") {
        return Ok(AttemptOutcome::Stream(resp));
    }

    let status = resp.status();
    let resp_headers = resp.headers().clone();
    let mut resp = resp;
    let mut data = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        data.extend_from_slice(&chunk);
        if data.len() > MAX_RESPONSE_BODY {
            return Ok(AttemptOutcome::Oversize);
        }
    }
    Ok(AttemptOutcome::Buffered { status, headers: resp_headers, body: Bytes::from(data) })
}

/// The response the client will see once the attempt loop ends.
enum FinalResponse {
    /// The pool had nothing available before the first attempt.
    NoAuths,
    Buffered { status: StatusCode, headers: HeaderMap, body: Bytes },
    Stream(reqwest::Response),
}

impl FinalResponse {
    fn synthetic(status: StatusCode, payload: serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::Buffered {
            status,
            headers,
            body: Bytes::from(serde_json::to_vec(&payload).unwrap_or_default()),
        }
    }

    fn status(&self) -> u16 {
        match self {
            Self::NoAuths => 503,
            Self::Buffered { status, .. } => status.as_u16(),
            Self::Stream(resp) => resp.status().as_u16(),
        }
    }

    fn into_response(self) -> Response {
        match self {
            Self::NoAuths => json_error(StatusCode::SERVICE_UNAVAILABLE, "no auths available"),
            Self::Buffered { status, headers, body } => {
                let mut response = Response::new(Body::from(body));
                *response.status_mut() = status;
                *response.headers_mut() = copy_response_headers(&headers);
                response
            }
            Self::Stream(resp) => {
                let status = resp.status();
                let mut headers = copy_response_headers(resp.headers());
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                let mut response = Response::new(Body::from_stream(resp.bytes_stream()));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
        }
    }
}

fn copy_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if STRIP_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Pull a machine-readable error code from a JSON error body.
///
/// Prefers `error.code`, falling back to a root-level `code`.
fn extract_error_code(raw_body: &[u8]) -> Option<String> {
    if raw_body.is_empty() {
        return None;
    }
    let parsed: serde_json::Value = serde_json::from_slice(raw_body).ok()?;
    let object = parsed.as_object()?;
    if let Some(code) = object.get("error").and_then(|e| e.get("code")).and_then(|c| c.as_str()) {
        let code = code.trim();
        if !code.is_empty() {
            return Some(code.to_owned());
        }
    }
    let code = object.get("code").and_then(|c| c.as_str())?.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_owned())
    }
}

fn default_header(headers: &mut HeaderMap, name: &'static str, value: &'static str) {
    let name = HeaderName::from_static(name);
    if !headers.contains_key(&name) {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// 12-hex opaque id tying all attempts of one client request together.
fn new_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

fn epoch_secs_f64() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
