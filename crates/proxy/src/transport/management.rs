// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only management handlers plus the shutdown trigger.

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;

use crate::error::json_payload;
use crate::event_log::LogLevel;
use crate::rules::ManagementRoute;
use crate::state::ProxyState;

/// Serve one management route. Authorization has already been checked.
pub async fn handle(route: ManagementRoute, state: &ProxyState, query: &str) -> Response {
    match route {
        ManagementRoute::Debug => {
            let payload = state.debug_payload().await;
            json_payload(StatusCode::OK, serde_json::to_value(&payload).unwrap_or_default())
        }
        ManagementRoute::Trace => {
            // An absent or unparsable limit means "all buffered".
            let limit =
                query_param(query, "limit").and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
            let events = state.traces.list(limit).await;
            json_payload(StatusCode::OK, json!({ "events": events }))
        }
        ManagementRoute::Health => {
            let refresh = query_param(query, "refresh").as_deref() == Some("1");
            let payload = state.health_snapshot(refresh).await;
            json_payload(StatusCode::OK, serde_json::to_value(&payload).unwrap_or_default())
        }
        ManagementRoute::AuthFiles => {
            json_payload(StatusCode::OK, json!({ "files": state.pool.auth_files().await }))
        }
        ManagementRoute::Shutdown => {
            state
                .event_log
                .write(LogLevel::Info, "proxy.shutdown_requested", "shutdown requested", json!({}))
                .await;
            state.shutdown.cancel();
            json_payload(StatusCode::OK, json!({ "status": "shutting_down" }))
        }
    }
}

/// First value for `name` in a raw query string.
fn query_param(query: &str, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    query.split('&').find_map(|pair| pair.strip_prefix(prefix.as_str()).map(str::to_owned))
}
