// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory ring buffer of request trace events.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::rules::TraceRoute;

/// One proxied attempt, as recorded in the trace buffer and event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Assigned by the store on insert; absent until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Wall-clock seconds.
    pub ts: f64,
    /// 12-hex id shared by all attempts of one client request.
    pub request_id: String,
    pub method: String,
    /// Path as received from the client, including any query.
    pub path: String,
    pub route: TraceRoute,
    pub status: u16,
    pub latency_ms: u64,
    pub auth_file: String,
    pub auth_email: Option<String>,
    /// 1-based attempt counter within one client request.
    pub attempt: u32,
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct TraceInner {
    items: VecDeque<TraceEvent>,
    seq: u64,
}

/// Bounded FIFO of trace events with strictly increasing ids.
pub struct TraceStore {
    inner: Mutex<TraceInner>,
    max_size: usize,
}

impl TraceStore {
    /// Capacity is clamped to at least one event.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            inner: Mutex::new(TraceInner { items: VecDeque::with_capacity(max_size), seq: 0 }),
            max_size,
        }
    }

    /// Stamp the next id onto `event`, append it, and evict the oldest past
    /// capacity. Returns the stamped event.
    pub async fn add(&self, mut event: TraceEvent) -> TraceEvent {
        let mut inner = self.inner.lock().await;
        inner.seq += 1;
        event.id = Some(inner.seq);
        inner.items.push_back(event.clone());
        if inner.items.len() > self.max_size {
            inner.items.pop_front();
        }
        event
    }

    /// Snapshot buffered events; a positive `limit` returns only the newest
    /// `limit` of them.
    pub async fn list(&self, limit: usize) -> Vec<TraceEvent> {
        let inner = self.inner.lock().await;
        if limit > 0 && limit < inner.items.len() {
            inner.items.iter().skip(inner.items.len() - limit).cloned().collect()
        } else {
            inner.items.iter().cloned().collect()
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
