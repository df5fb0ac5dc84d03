//! WHIP endpoints: offer ingestion and resource management.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use glimpse_stream::pump::DebuggerEndpoint;
use glimpse_stream::whip;
use glimpse_stream::PumpOptions;

use crate::server::AppState;

/// `POST /sessions/{id}/whip` — negotiate a new WHIP resource.
///
/// The offer body is read to EOF; chunked transfers are not truncated.
pub async fn create_whip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };

    if !is_sdp(&headers) {
        return (
            StatusCode::BAD_REQUEST,
            "Content-Type must be application/sdp",
        )
            .into_response();
    }

    let Ok(offer_sdp) = String::from_utf8(body.to_vec()) else {
        return (StatusCode::BAD_REQUEST, "offer is not valid UTF-8").into_response();
    };

    let endpoint: Arc<dyn DebuggerEndpoint> = session;
    let pump_options = PumpOptions {
        bootstrap_url: state.config.bootstrap_url.clone(),
        auto_scroll: state.config.auto_scroll,
        ..PumpOptions::default()
    };

    match whip::create_resource(&state.whip, endpoint, &id, offer_sdp, pump_options).await {
        Ok((resource, answer_sdp)) => {
            let location = format!("/sessions/{}/whip/{}", id, resource.id());
            (
                StatusCode::CREATED,
                [
                    (header::CONTENT_TYPE, "application/sdp".to_string()),
                    (header::LOCATION, location),
                ],
                answer_sdp,
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "whip negotiation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to negotiate: {e}"),
            )
                .into_response()
        }
    }
}

/// `PATCH /sessions/{id}/whip/{resource_id}` — trickle-ICE stub.
///
/// Candidate updates are not integrated in this revision; the endpoint
/// exists so compliant clients succeed.
pub async fn patch_whip(
    State(state): State<AppState>,
    Path((_session_id, resource_id)): Path<(String, String)>,
) -> Response {
    if state.whip.get(&resource_id).is_none() {
        return (StatusCode::NOT_FOUND, "whip resource not found").into_response();
    }
    tracing::debug!(resource_id = %resource_id, "trickle-ice update acknowledged, not applied");
    StatusCode::NO_CONTENT.into_response()
}

/// `DELETE /sessions/{id}/whip/{resource_id}` — terminate a WHIP resource.
pub async fn delete_whip(
    State(state): State<AppState>,
    Path((_session_id, resource_id)): Path<(String, String)>,
) -> Response {
    let Some(resource) = state.whip.get(&resource_id) else {
        return (StatusCode::NOT_FOUND, "whip resource not found").into_response();
    };
    resource.close().await;
    state.whip.remove(&resource_id);
    tracing::info!(resource_id = %resource_id, "whip resource deleted");
    StatusCode::OK.into_response()
}

/// The WHIP POST accepts only `application/sdp` bodies.
fn is_sdp(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/sdp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_content_type(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn sdp_content_type_accepted() {
        assert!(is_sdp(&headers_with_content_type("application/sdp")));
    }

    #[test]
    fn sdp_content_type_with_charset_accepted() {
        assert!(is_sdp(&headers_with_content_type(
            "application/sdp; charset=utf-8"
        )));
    }

    #[test]
    fn sdp_content_type_case_insensitive() {
        assert!(is_sdp(&headers_with_content_type("Application/SDP")));
    }

    #[test]
    fn json_content_type_rejected() {
        assert!(!is_sdp(&headers_with_content_type("application/json")));
    }

    #[test]
    fn missing_content_type_rejected() {
        assert!(!is_sdp(&HeaderMap::new()));
    }
}
