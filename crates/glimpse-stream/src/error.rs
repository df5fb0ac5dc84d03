//! Streaming-plane error types.

use thiserror::Error;

/// Errors from the debugger proxy, WHIP negotiation, and the screencast pump.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Could not reach the browser's debugger endpoint.
    #[error("debugger unreachable: {context}")]
    DebuggerUnreachable {
        /// What failed while reaching it.
        context: String,
    },

    /// The browser reported no connectable page target.
    #[error("no page target available")]
    NoPageTarget,

    /// WebRTC stack error during negotiation.
    #[error("webrtc: {0}")]
    WebRtc(#[from] webrtc::Error),

    /// The negotiated answer could not be produced.
    #[error("webrtc negotiation failed: {context}")]
    Negotiation {
        /// Which step failed.
        context: String,
    },

    /// A data-channel send failed mid-stream.
    #[error("data channel send failed: {context}")]
    ChannelSend {
        /// The underlying send error.
        context: String,
    },

    /// A debugger websocket read or write failed mid-stream.
    #[error("cdp transport: {context}")]
    Transport {
        /// The underlying transport error.
        context: String,
    },
}
