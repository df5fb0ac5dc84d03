//! Client-facing URL derivation.
//!
//! The service usually sits behind a TLS-terminating tunnel, so the host
//! and scheme of the URLs it hands out cannot be taken from the socket.

use axum::http::header::HOST;
use axum::http::HeaderMap;

/// Host and scheme context for one request's generated URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrls {
    host: String,
    secure: bool,
}

impl RequestUrls {
    /// Resolve from the request headers and the optional `APP_HOST` override.
    ///
    /// `APP_HOST` wins over the `Host` header and implies TLS (a tunnel that
    /// needs the override is terminating TLS for us). Otherwise the scheme
    /// follows `X-Forwarded-Proto`.
    pub fn resolve(headers: &HeaderMap, app_host: Option<&str>) -> Self {
        if let Some(host) = app_host.filter(|h| !h.is_empty()) {
            return Self {
                host: host.to_string(),
                secure: true,
            };
        }
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost")
            .to_string();
        let secure = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("https"));
        Self { host, secure }
    }

    /// `http` or `https`.
    pub fn http_scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// `ws` or `wss`, mirroring the HTTP scheme.
    pub fn ws_scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }

    /// Websocket URL of a session's debugger proxy.
    pub fn cdp_url(&self, session_id: &str) -> String {
        format!("{}://{}/sessions/{}/cdp", self.ws_scheme(), self.host, session_id)
    }

    /// URL of a session's preview surface.
    pub fn preview_url(&self, session_id: &str) -> String {
        format!(
            "{}://{}/sessions/{}/preview",
            self.http_scheme(),
            self.host,
            session_id
        )
    }
}
