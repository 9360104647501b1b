// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration, from CLI flags and `CLIPROXY_*` env vars.

use std::path::PathBuf;

pub const DEFAULT_AUTH_DIR: &str = "~/.codex/_auths";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_UPSTREAM: &str = "https://chatgpt.com/backend-api";
pub const DEFAULT_TRACE_MAX: usize = 500;

/// Configuration for the rrproxy server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "rrproxy", about = "Rotating auth reverse proxy")]
pub struct ProxyConfig {
    /// Directory of auth descriptor JSON files.
    #[arg(long, default_value = DEFAULT_AUTH_DIR, env = "CLIPROXY_AUTH_DIR")]
    pub auth_dir: String,

    /// Host to bind on. Non-loopback hosts require --allow-non-loopback.
    #[arg(long, default_value = DEFAULT_HOST, env = "CLIPROXY_HOST")]
    pub host: String,

    /// Port to listen on (0 picks a free port).
    #[arg(long, default_value_t = 0, env = "CLIPROXY_PORT")]
    pub port: u16,

    /// Upstream base URL requests are forwarded to.
    #[arg(long, default_value = DEFAULT_UPSTREAM, env = "CLIPROXY_UPSTREAM")]
    pub upstream: String,

    /// Key required in X-Management-Key for management endpoints.
    #[arg(long, env = "CLIPROXY_MANAGEMENT_KEY")]
    pub management_key: Option<String>,

    /// Allow binding to a non-loopback host.
    #[arg(
        long,
        env = "CLIPROXY_ALLOW_NON_LOOPBACK",
        value_parser = parse_truthy,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub allow_non_loopback: bool,

    /// Capacity of the in-memory trace ring buffer.
    #[arg(long, default_value_t = DEFAULT_TRACE_MAX, env = "CLIPROXY_TRACE_MAX")]
    pub trace_max: usize,
}

impl ProxyConfig {
    /// Auth directory with `~` expanded.
    pub fn resolved_auth_dir(&self) -> PathBuf {
        resolve_path(&self.auth_dir)
    }
}

/// Parse `1|true|yes|on` (any case) as true; everything else is false.
fn parse_truthy(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Expand a leading `~` against `$HOME`.
pub fn resolve_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(format!("{home}{rest}"));
            }
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
