//! Session lifecycle endpoints: create, list, delete.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use glimpse_browser::Session;

use crate::server::AppState;
use crate::urls::RequestUrls;

/// Body of `POST /sessions`. All fields optional.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Requested lifetime in minutes; non-positive falls back to the default.
    #[serde(default)]
    pub duration_minutes: i64,
}

/// A session as presented to clients.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Session id.
    pub id: String,
    /// Websocket URL of the forwarded debugger.
    pub cdp_url: String,
    /// URL of the session's preview surface.
    pub preview_url: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl SessionResponse {
    fn from_session(session: &Session, urls: &RequestUrls) -> Self {
        Self {
            id: session.id().to_string(),
            cdp_url: urls.cdp_url(session.id()),
            preview_url: urls.preview_url(session.id()),
            created_at: session.created_at(),
            expires_at: session.expires_at(),
        }
    }
}

/// `POST /sessions` — provision a browser session.
///
/// The body is decoded leniently: malformed or absent JSON falls through to
/// the default lifetime rather than failing the request.
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: CreateSessionRequest = serde_json::from_slice(&body).unwrap_or_default();
    let minutes = if request.duration_minutes > 0 {
        request.duration_minutes
    } else {
        state.config.default_session_minutes
    };
    let lifetime = Duration::from_secs(minutes as u64 * 60);

    match state.sessions.create(lifetime).await {
        Ok(session) => {
            let urls = RequestUrls::resolve(&headers, state.config.app_host.as_deref());
            Json(SessionResponse::from_session(&session, &urls)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to create session: {e}"),
        )
            .into_response(),
    }
}

/// `GET /sessions` — snapshot of live sessions.
pub async fn list_sessions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let urls = RequestUrls::resolve(&headers, state.config.app_host.as_deref());
    let sessions: Vec<SessionResponse> = state
        .sessions
        .list()
        .iter()
        .map(|s| SessionResponse::from_session(s, &urls))
        .collect();
    Json(sessions).into_response()
}

/// `DELETE /sessions/{id}` — stop a session.
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.sessions.delete(&id).await {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::NOT_FOUND, "session not found").into_response()
    }
}
