// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rrproxy: a local reverse proxy that rotates upstream API requests across a
//! pool of auth tokens, tracking per-token health (cooldown, blacklist,
//! probation) and exposing an authenticated management surface.

pub mod auth;
pub mod config;
pub mod error;
pub mod event_log;
pub mod rules;
pub mod state;
pub mod trace;
pub mod transport;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use anyhow::Context;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::event_log::LogLevel;
use crate::state::ProxyState;
use crate::transport::build_router;
use crate::upstream::UpstreamTarget;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Run the proxy server until shutdown.
pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    ensure_crypto();

    if !rules::is_loopback_host(&config.host) && !config.allow_non_loopback {
        anyhow::bail!("non-loopback bind blocked; use --allow-non-loopback to override");
    }
    if config.management_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
        anyhow::bail!("management key required");
    }
    let upstream = UpstreamTarget::parse(&config.upstream)
        .with_context(|| format!("invalid upstream url: {}", config.upstream))?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    let bound = listener.local_addr()?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(ProxyState::new(config, upstream, bound, shutdown.clone()));

    let auth_count = state.reload_auths().await;
    if auth_count == 0 {
        anyhow::bail!("no valid auth files found in {}", state.auth_dir.display());
    }

    state
        .event_log
        .write(
            LogLevel::Info,
            "proxy.started",
            "proxy server started",
            json!({
                "host": bound.ip().to_string(),
                "port": bound.port(),
                "upstream": state.config.upstream,
                "auth_count": auth_count,
            }),
        )
        .await;

    spawn_signal_handler(shutdown.clone());

    tracing::info!(addr = %bound, auth_count, "rrproxy listening");
    let router = build_router(Arc::clone(&state));
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    state
        .event_log
        .write(
            LogLevel::Info,
            "proxy.stopped",
            "proxy server stopped",
            json!({ "host": bound.ip().to_string(), "port": bound.port() }),
        )
        .await;
    Ok(())
}

/// Cancel the shutdown token on SIGINT/SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        shutdown.cancel();
    });
}
