//! The streaming plane: debugger proxying, WHIP ingestion, and the
//! screencast pump.
//!
//! [`proxy`] splices a debug client onto a session's browser-level debugger
//! websocket. [`whip`] negotiates WebRTC peer connections whose inbound
//! `screencast` data channel is fed by [`pump`], which drives a page
//! target's screencast, chunks each JPEG frame, and acks it back.

#![deny(unsafe_code)]

pub mod cdp;
pub mod error;
pub mod proxy;
pub mod pump;
pub mod whip;

pub use error::StreamError;
pub use pump::{DebuggerEndpoint, PumpOptions};
pub use whip::{WhipRegistry, WhipResource, DATA_CHANNEL_LABEL};
