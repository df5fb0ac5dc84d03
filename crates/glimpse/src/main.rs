//! # glimpse
//!
//! Server binary: provisions ephemeral headless-browser sessions, forwards
//! their debugger protocol, and streams their viewports over WebRTC.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use glimpse_server::{GlimpseServer, ServerConfig};

/// Glimpse server.
#[derive(Parser, Debug)]
#[command(name = "glimpse", about = "Headless browser sessions with WebRTC viewport streaming")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Disable the automated scroll ticker on screencast pumps.
    #[arg(long)]
    no_auto_scroll: bool,

    /// URL screencast pumps drive the page to before capturing.
    #[arg(long)]
    bootstrap_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let metrics_handle = glimpse_server::metrics::install_recorder();

    let mut config = ServerConfig::from_env();
    config.host = args.host;
    config.port = args.port;
    if args.no_auto_scroll {
        config.auto_scroll = false;
    }
    if let Some(url) = args.bootstrap_url {
        config.bootstrap_url = url;
    }

    let server = GlimpseServer::new(config, metrics_handle);
    let (addr, server_handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!(%addr, "glimpse listening");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received");

    // Tear the streaming plane down first, then the browsers it fed; no
    // subprocess or profile directory outlives the server.
    server.whip().shutdown_all().await;
    server.sessions().shutdown_all().await;
    server
        .shutdown()
        .graceful_shutdown(vec![server_handle], None)
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["glimpse"]);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 8080);
        assert!(!cli.no_auto_scroll);
        assert!(cli.bootstrap_url.is_none());
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::parse_from([
            "glimpse",
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--no-auto-scroll",
            "--bootstrap-url",
            "https://example.org",
        ]);
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 0);
        assert!(cli.no_auto_scroll);
        assert_eq!(cli.bootstrap_url.as_deref(), Some("https://example.org"));
    }
}
