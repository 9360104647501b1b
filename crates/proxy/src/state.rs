// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared runtime state for the proxy.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::auth::rotation::RoundRobinAuthPool;
use crate::auth::store::load_auth_records;
use crate::auth::HealthEntry;
use crate::config::ProxyConfig;
use crate::event_log::{EventLogger, LogLevel};
use crate::trace::{TraceEvent, TraceStore};
use crate::upstream::UpstreamTarget;

/// Upstream dispatch timeout (connect and per-read). A total-duration timeout
/// would kill long-lived SSE streams, so it is deliberately not set.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(25);

/// Shared proxy state.
pub struct ProxyState {
    pub config: ProxyConfig,
    /// Auth directory with `~` expanded.
    pub auth_dir: PathBuf,
    pub pool: RoundRobinAuthPool,
    pub traces: TraceStore,
    pub event_log: EventLogger,
    pub upstream: UpstreamTarget,
    pub http: reqwest::Client,
    pub shutdown: CancellationToken,
    /// The address actually bound (port 0 resolves to a free port).
    pub addr: SocketAddr,
}

/// `/debug` management payload.
#[derive(Debug, Serialize)]
pub struct DebugPayload {
    pub status: String,
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub auth_dir: String,
    pub auth_count: usize,
    pub upstream_base_url: String,
    pub log_request_preview: bool,
    pub management_key_required: bool,
    pub trace_max: usize,
    pub pid: u32,
    pub event_log_file: String,
}

/// `/health` management payload.
#[derive(Debug, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
    pub accounts: Vec<HealthEntry>,
}

impl ProxyState {
    pub fn new(
        config: ProxyConfig,
        upstream: UpstreamTarget,
        addr: SocketAddr,
        shutdown: CancellationToken,
    ) -> Self {
        let auth_dir = config.resolved_auth_dir();
        let traces = TraceStore::new(config.trace_max);
        let event_log = EventLogger::new(&auth_dir);
        let http = reqwest::Client::builder()
            .connect_timeout(UPSTREAM_TIMEOUT)
            .read_timeout(UPSTREAM_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            config,
            auth_dir,
            pool: RoundRobinAuthPool::new(),
            traces,
            event_log,
            upstream,
            http,
            shutdown,
            addr,
        }
    }

    /// Reload auth records from disk into the pool; returns how many loaded.
    pub async fn reload_auths(&self) -> usize {
        let records = load_auth_records(&self.config.auth_dir);
        let count = records.len();
        self.pool.load(records).await;
        count
    }

    pub async fn health_snapshot(&self, refresh: bool) -> HealthPayload {
        if refresh {
            self.reload_auths().await;
        }
        let accounts = self.pool.health_snapshot().await;
        HealthPayload { ok: !accounts.is_empty(), accounts }
    }

    pub async fn debug_payload(&self) -> DebugPayload {
        DebugPayload {
            status: "running".to_owned(),
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            base_url: format!("http://{}:{}", self.addr.ip(), self.addr.port()),
            auth_dir: self.auth_dir.to_string_lossy().into_owned(),
            auth_count: self.pool.count().await,
            upstream_base_url: self.config.upstream.clone(),
            log_request_preview: false,
            management_key_required: !self.management_key().is_empty(),
            trace_max: self.traces.max_size(),
            pid: std::process::id(),
            event_log_file: self.event_log.path().to_string_lossy().into_owned(),
        }
    }

    /// The configured management key, trimmed (empty means unset).
    pub fn management_key(&self) -> &str {
        self.config.management_key.as_deref().map(str::trim).unwrap_or("")
    }

    /// Record one forwarded attempt in the trace buffer and the event log.
    pub async fn record_attempt(&self, event: TraceEvent) {
        let level = if event.status < 500 { LogLevel::Info } else { LogLevel::Warn };
        let fields = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
        self.traces.add(event).await;
        self.event_log.write(level, "proxy.request", "request attempt completed", fields).await;
    }
}
