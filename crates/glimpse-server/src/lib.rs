//! HTTP control plane for browser sessions and WHIP streaming.
//!
//! Routes:
//! - `POST/GET /sessions`, `DELETE /sessions/{id}` — session lifecycle
//! - `GET /sessions/{id}/cdp` — forwarded debugger websocket
//! - `POST /sessions/{id}/whip`, `PATCH`/`DELETE /sessions/{id}/whip/{rid}` —
//!   WHIP negotiation surface
//! - `/health`, `/metrics` — operator surfaces

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod urls;

pub use config::ServerConfig;
pub use server::{AppState, GlimpseServer};
pub use shutdown::ShutdownCoordinator;
