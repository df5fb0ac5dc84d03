//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across crates.

/// Live browser sessions (gauge).
pub const BROWSER_SESSIONS_ACTIVE: &str = "browser_sessions_active";
/// Browser sessions created (counter).
pub const BROWSER_SESSIONS_CREATED_TOTAL: &str = "browser_sessions_created_total";
/// Active WHIP resources (gauge).
pub const WHIP_RESOURCES_ACTIVE: &str = "whip_resources_active";
/// Debugger proxy connections accepted (counter).
pub const CDP_PROXY_CONNECTIONS_TOTAL: &str = "cdp_proxy_connections_total";
/// Screencast frames forwarded (counter).
pub const SCREENCAST_FRAMES_TOTAL: &str = "screencast_frames_total";
/// Screencast payload bytes forwarded (counter).
pub const SCREENCAST_BYTES_TOTAL: &str = "screencast_bytes_total";
