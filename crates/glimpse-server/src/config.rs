//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the glimpse server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8080`; `0` for auto-assign).
    pub port: u16,
    /// Host override for generated URLs (env `APP_HOST`). When set, generated
    /// URLs also assume TLS, which is what a terminating tunnel provides.
    pub app_host: Option<String>,
    /// Session lifetime in minutes when the client specifies none (or a
    /// non-positive value).
    pub default_session_minutes: i64,
    /// Whether screencast pumps run the alternating scroll ticker.
    pub auto_scroll: bool,
    /// URL pumps drive the page to before starting the screencast.
    pub bootstrap_url: String,
    /// Max request body size in bytes.
    pub max_body_bytes: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            app_host: None,
            default_session_minutes: 5,
            auto_scroll: true,
            bootstrap_url: "https://www.google.com".into(),
            max_body_bytes: 1024 * 1024, // 1 MB
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with environment overrides (`APP_HOST`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("APP_HOST") {
            if !host.is_empty() {
                config.app_host = Some(host);
            }
        }
        config
    }
}
