// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Round-robin auth pool with cooldown, blacklist, and probation.
//!
//! All policy numbers live here as public constants. Every operation holds
//! the single pool mutex for its duration; critical sections do no I/O.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use crate::auth::{AuthRecord, AuthState, AuthStatus, HealthEntry};

pub const DEFAULT_COOLDOWN_SECONDS: u64 = 30;
pub const DEFAULT_TRANSIENT_COOLDOWN_SECONDS: u64 = 8;
pub const DEFAULT_BLACKLIST_SECONDS: u64 = 15 * 60;
pub const MAX_COOLDOWN_SECONDS: u64 = 15 * 60;
pub const MAX_BLACKLIST_SECONDS: u64 = 6 * 60 * 60;
pub const PROBATION_PROBE_INTERVAL_SECONDS: u64 = 20;
pub const PROBATION_SUCCESS_TARGET: u32 = 2;

/// Aggregate status tallies across the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub ok: usize,
    pub cooldown: usize,
    pub blacklist: usize,
    pub probation: usize,
    pub total: usize,
}

struct PoolInner {
    states: Vec<AuthState>,
    cursor: usize,
}

/// Thread-safe auth pool with cooldown, blacklist, and probation.
pub struct RoundRobinAuthPool {
    inner: Mutex<PoolInner>,
}

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Merge prior health state into a freshly loaded record.
///
/// A record with an unchanged token carries every timer and counter; a
/// replaced token keeps only `used`/`errors` and re-enters rotation clean.
fn merge_state(record: AuthRecord, prev: Option<&AuthState>) -> AuthState {
    let mut state = AuthState::fresh(record);
    if let Some(prev) = prev {
        state.used = prev.used;
        state.errors = prev.errors;
        if prev.record.token == state.record.token {
            state.cooldown_until = prev.cooldown_until;
            state.blacklist_until = prev.blacklist_until;
            state.blacklist_reason = prev.blacklist_reason.clone();
            state.probation_successes = prev.probation_successes;
            state.probation_target = prev.probation_target;
            state.next_probe_after = prev.next_probe_after;
            state.rate_limit_strikes = prev.rate_limit_strikes;
            state.hard_failures = prev.hard_failures;
        }
    }
    state
}

fn mark_success(state: &mut AuthState, now: u64) {
    state.cooldown_until = 0;
    state.rate_limit_strikes = 0;
    if state.in_probation() {
        state.probation_successes += 1;
        if state.probation_successes >= state.probation_target {
            state.blacklist_until = 0;
            state.blacklist_reason = None;
            state.next_probe_after = 0;
        }
    } else if state.blacklist_until <= now {
        state.blacklist_reason = None;
    }
}

fn rate_limit_cooldown_seconds(strikes: u32) -> u64 {
    let power = strikes.saturating_sub(1).min(6);
    MAX_COOLDOWN_SECONDS.min(DEFAULT_COOLDOWN_SECONDS << power)
}

fn blacklist_ttl_seconds(hard_failures: u32) -> u64 {
    let power = hard_failures.saturating_sub(1).min(4);
    MAX_BLACKLIST_SECONDS.min(DEFAULT_BLACKLIST_SECONDS << power)
}

fn mark_rate_limited(state: &mut AuthState, now: u64, seconds_override: Option<u64>) {
    state.errors += 1;
    state.rate_limit_strikes += 1;
    let cooldown = seconds_override
        .unwrap_or_else(|| rate_limit_cooldown_seconds(state.rate_limit_strikes));
    state.cooldown_until = state.cooldown_until.max(now + cooldown.max(1));
    // Persistent 429s are ejected temporarily as outliers.
    if state.rate_limit_strikes >= 5 {
        mark_blacklist(state, now, "rate_limited_persistent".to_owned());
    }
}

fn mark_blacklist(state: &mut AuthState, now: u64, reason: String) {
    state.errors += 1;
    state.hard_failures += 1;
    let ttl = blacklist_ttl_seconds(state.hard_failures);
    state.blacklist_until = state.blacklist_until.max(now + ttl.max(1));
    state.blacklist_reason = Some(reason);
    state.probation_target = PROBATION_SUCCESS_TARGET;
    state.probation_successes = 0;
    state.next_probe_after = state.blacklist_until;
    state.cooldown_until = state.cooldown_until.max(state.blacklist_until);
}

fn mark_transient_failure(state: &mut AuthState, now: u64) {
    state.errors += 1;
    state.cooldown_until = state.cooldown_until.max(now + DEFAULT_TRANSIENT_COOLDOWN_SECONDS);
}

impl RoundRobinAuthPool {
    pub fn new() -> Self {
        Self { inner: Mutex::new(PoolInner { states: Vec::new(), cursor: 0 }) }
    }

    /// Atomically replace the state list, carrying prior health by file name.
    pub async fn load(&self, records: Vec<AuthRecord>) {
        let mut inner = self.inner.lock().await;
        let previous: HashMap<String, AuthState> =
            inner.states.drain(..).map(|state| (state.record.name.clone(), state)).collect();
        inner.states = records
            .into_iter()
            .map(|record| {
                let prev = previous.get(&record.name);
                merge_state(record, prev)
            })
            .collect();
        if inner.states.is_empty() {
            inner.cursor = 0;
        } else {
            inner.cursor %= inner.states.len();
        }
    }

    /// Select the next available record, round-robin over the available subset.
    ///
    /// Increments `used` on the chosen state and, while it is in probation,
    /// pushes its next allowed probe out by the probe interval.
    pub async fn pick(&self) -> Option<AuthRecord> {
        self.pick_at(epoch_secs()).await
    }

    async fn pick_at(&self, now: u64) -> Option<AuthRecord> {
        let mut inner = self.inner.lock().await;
        let available: Vec<usize> = inner
            .states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.available(now))
            .map(|(idx, _)| idx)
            .collect();
        if available.is_empty() {
            return None;
        }
        let slot = available[inner.cursor % available.len()];
        inner.cursor = (inner.cursor + 1) % available.len();
        let state = &mut inner.states[slot];
        state.used += 1;
        if state.in_probation() {
            state.next_probe_after = now + PROBATION_PROBE_INTERVAL_SECONDS;
        }
        Some(state.record.clone())
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.states.len()
    }

    /// Compatibility helper: apply a rate-limit style cooldown directly.
    pub async fn mark_cooldown(&self, auth_name: &str, seconds: u64) {
        self.mark_result_at(epoch_secs(), auth_name, 429, None, Some(seconds)).await;
    }

    /// Report the outcome of one upstream attempt for `auth_name`.
    pub async fn mark_result(
        &self,
        auth_name: &str,
        status: u16,
        error_code: Option<&str>,
        cooldown_seconds: Option<u64>,
    ) {
        self.mark_result_at(epoch_secs(), auth_name, status, error_code, cooldown_seconds).await;
    }

    async fn mark_result_at(
        &self,
        now: u64,
        auth_name: &str,
        status: u16,
        error_code: Option<&str>,
        cooldown_seconds: Option<u64>,
    ) {
        let mut inner = self.inner.lock().await;
        let Some(state) = inner.states.iter_mut().find(|state| state.record.name == auth_name)
        else {
            return;
        };
        match status {
            200..=399 => mark_success(state, now),
            401 | 403 => {
                let reason = error_code.map(str::to_owned).unwrap_or_else(|| {
                    if status == 401 { "token_invalid" } else { "forbidden" }.to_owned()
                });
                mark_blacklist(state, now, reason);
            }
            429 => mark_rate_limited(state, now, cooldown_seconds.map(|secs| secs.max(1))),
            // 5xx, retryable 4xx, and anything else unexpected: short cooldown.
            _ => mark_transient_failure(state, now),
        }
    }

    pub async fn health_snapshot(&self) -> Vec<HealthEntry> {
        self.health_snapshot_at(epoch_secs()).await
    }

    async fn health_snapshot_at(&self, now: u64) -> Vec<HealthEntry> {
        self.inner.lock().await.states.iter().map(|state| state.health(now)).collect()
    }

    pub async fn auth_files(&self) -> Vec<String> {
        self.inner.lock().await.states.iter().map(|state| state.record.name.clone()).collect()
    }

    pub async fn stats(&self) -> PoolStats {
        self.stats_at(epoch_secs()).await
    }

    async fn stats_at(&self, now: u64) -> PoolStats {
        let inner = self.inner.lock().await;
        let mut stats = PoolStats {
            ok: 0,
            cooldown: 0,
            blacklist: 0,
            probation: 0,
            total: inner.states.len(),
        };
        for state in &inner.states {
            match state.status(now) {
                AuthStatus::Ok => stats.ok += 1,
                AuthStatus::Cooldown => stats.cooldown += 1,
                AuthStatus::Probation => stats.probation += 1,
                AuthStatus::Blacklist => stats.blacklist += 1,
            }
        }
        stats
    }
}

impl Default for RoundRobinAuthPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "rotation_tests.rs"]
mod tests;
