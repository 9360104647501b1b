// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: router construction and request dispatch.

pub mod auth;
pub mod management;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::json_error;
use crate::rules;
use crate::state::ProxyState;
use crate::upstream::forward;

/// Build the axum router. Management routes are matched first; everything
/// else is forwarded upstream.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(dispatch).layer(TraceLayer::new_for_http()).with_state(state)
}

/// Single dispatching handler for every method and path.
async fn dispatch(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    if let Some(route) = rules::management_route(req.uri().path()) {
        if !auth::authorize_management(req.headers(), state.management_key()) {
            return json_error(StatusCode::UNAUTHORIZED, "unauthorized management request");
        }
        return management::handle(route, &state, req.uri().query().unwrap_or("")).await;
    }
    forward::proxy_request(state, req).await
}
