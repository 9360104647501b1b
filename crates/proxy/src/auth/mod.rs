// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth records and per-record rotation health state.

pub mod rotation;
pub mod store;

use serde::Serialize;

/// Immutable descriptor of one upstream credential, loaded from an auth file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord {
    /// Stable identity, normally the file name. Health state carries over
    /// reloads by this name.
    pub name: String,
    pub path: String,
    pub token: String,
    pub email: Option<String>,
    pub account_id: Option<String>,
}

/// Selection status label for one auth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Ok,
    Cooldown,
    Blacklist,
    Probation,
}

/// Mutable health bookkeeping for one auth record.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub record: AuthRecord,
    /// Selection is blocked while `now < cooldown_until`.
    pub cooldown_until: u64,
    /// Selection is blocked while `now < blacklist_until`.
    pub blacklist_until: u64,
    pub blacklist_reason: Option<String>,
    pub probation_successes: u32,
    pub probation_target: u32,
    /// Next allowed probation probe while re-entering after a blacklist.
    pub next_probe_after: u64,
    pub used: u64,
    pub errors: u64,
    pub rate_limit_strikes: u32,
    pub hard_failures: u32,
}

impl AuthState {
    /// A record that has never failed: not in probation, no timers.
    pub fn fresh(record: AuthRecord) -> Self {
        Self {
            record,
            cooldown_until: 0,
            blacklist_until: 0,
            blacklist_reason: None,
            probation_successes: rotation::PROBATION_SUCCESS_TARGET,
            probation_target: rotation::PROBATION_SUCCESS_TARGET,
            next_probe_after: 0,
            used: 0,
            errors: 0,
            rate_limit_strikes: 0,
            hard_failures: 0,
        }
    }

    pub fn in_probation(&self) -> bool {
        self.probation_successes < self.probation_target
    }

    pub fn available(&self, now: u64) -> bool {
        if now < self.blacklist_until {
            return false;
        }
        if now < self.cooldown_until {
            return false;
        }
        if self.in_probation() && now < self.next_probe_after {
            return false;
        }
        true
    }

    pub fn status(&self, now: u64) -> AuthStatus {
        if now < self.blacklist_until {
            return AuthStatus::Blacklist;
        }
        if now < self.cooldown_until {
            return AuthStatus::Cooldown;
        }
        if self.in_probation() {
            if now < self.next_probe_after {
                return AuthStatus::Blacklist;
            }
            return AuthStatus::Probation;
        }
        AuthStatus::Ok
    }

    /// Project this state into the `/health` wire shape.
    pub fn health(&self, now: u64) -> HealthEntry {
        let status = self.status(now);
        HealthEntry {
            file: self.record.name.clone(),
            email: self.record.email.clone(),
            status,
            cooldown_seconds: (self.cooldown_until > now).then(|| self.cooldown_until - now),
            blacklist_seconds: (self.blacklist_until > now).then(|| self.blacklist_until - now),
            blacklist_reason: self.blacklist_reason.clone(),
            probation: status == AuthStatus::Probation,
            probation_successes: self.probation_successes,
            probation_target: self.probation_target,
            used: self.used,
            errors: self.errors,
            rate_limit_strikes: self.rate_limit_strikes,
            hard_failures: self.hard_failures,
        }
    }
}

/// Per-auth view returned by `/health` and the pool snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthEntry {
    pub file: String,
    pub email: Option<String>,
    pub status: AuthStatus,
    pub cooldown_seconds: Option<u64>,
    pub blacklist_seconds: Option<u64>,
    pub blacklist_reason: Option<String>,
    pub probation: bool,
    pub probation_successes: u32,
    pub probation_target: u32,
    pub used: u64,
    pub errors: u64,
    pub rate_limit_strikes: u32,
    pub hard_failures: u32,
}
