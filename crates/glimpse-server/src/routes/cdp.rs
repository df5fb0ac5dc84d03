//! `GET /sessions/{id}/cdp` — forwarded debugger websocket.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

/// Upgrade the client and splice it onto the session's browser-level
/// debugger websocket.
pub async fn cdp_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };
    glimpse_stream::proxy::proxy_debugger(ws, session.debugger_url().to_string()).await
}
