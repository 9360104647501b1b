// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream target parsing and the forwarding engine.

pub mod forward;

use crate::rules::CHATGPT_HOSTS;

/// Parsed upstream base URL.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Base path with any trailing slash removed (may be empty).
    pub base_path: String,
}

impl UpstreamTarget {
    /// Parse an upstream base URL, defaulting the port by scheme.
    pub fn parse(upstream: &str) -> anyhow::Result<Self> {
        let url: reqwest::Url = upstream.parse()?;
        let scheme = url.scheme().to_owned();
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("invalid upstream host"))?
            .to_owned();
        let port = url.port().unwrap_or(if scheme == "https" { 443 } else { 80 });
        let base_path = url.path().trim_end_matches('/').to_owned();
        Ok(Self { scheme, host, port, base_path })
    }

    /// Whether this upstream is the privileged chatgpt backend family.
    pub fn chatgpt_backend(&self) -> bool {
        CHATGPT_HOSTS.contains(&self.host.to_ascii_lowercase().as_str())
            && self.base_path.trim_end_matches('/') == "/backend-api"
    }

    /// Absolute URL for a full request path (which may carry a query).
    /// Default ports are omitted so the Host header stays canonical.
    pub fn url_for(&self, full_path: &str) -> String {
        let default_port = if self.scheme == "https" { 443 } else { 80 };
        if self.port == default_port {
            format!("{}://{}{}", self.scheme, self.host, full_path)
        } else {
            format!("{}://{}:{}{}", self.scheme, self.host, self.port, full_path)
        }
    }
}
