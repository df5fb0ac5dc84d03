//! CDP wire types consumed and produced by the streaming plane.
//!
//! Only the envelope and the handful of payloads the pump actually touches
//! are modelled; everything else passes through opaquely.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The debugger protocol envelope.
///
/// Events carry `method` and no `id`; command replies carry `id` and no
/// `method`. The pump dispatches on `method` and ignores replies.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpMessage {
    /// Correlation id (absent on events).
    #[serde(default)]
    pub id: Option<u64>,
    /// Event or command name (absent on replies).
    #[serde(default)]
    pub method: Option<String>,
    /// Opaque parameters payload.
    #[serde(default)]
    pub params: Value,
}

/// Parameters of a `Page.screencastFrame` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreencastFrameParams {
    /// Base64-encoded JPEG of the viewport.
    pub data: String,
    /// Screencast session id, echoed back in the ack.
    pub session_id: i64,
}

/// One entry of the debugger's `GET /json` target listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target kind; the pump only attaches to `"page"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Per-target debugger websocket URL (may be empty when claimed).
    #[serde(default)]
    pub web_socket_debugger_url: String,
}

/// Screencast capture parameters for `Page.startScreencast`.
#[derive(Clone, Debug)]
pub struct ScreencastOptions {
    /// Image format.
    pub format: ScreencastFormat,
    /// JPEG quality (0-100).
    pub quality: u32,
    /// Maximum capture width.
    pub max_width: u32,
    /// Maximum capture height.
    pub max_height: u32,
    /// Capture every Nth frame (1 = every frame).
    pub every_nth_frame: u32,
}

impl Default for ScreencastOptions {
    fn default() -> Self {
        Self {
            format: ScreencastFormat::Jpeg,
            quality: 80,
            max_width: 1280,
            max_height: 720,
            every_nth_frame: 1,
        }
    }
}

/// Screencast image format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScreencastFormat {
    /// JPEG format.
    Jpeg,
    /// PNG format.
    Png,
}

impl ScreencastFormat {
    /// CDP protocol string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

/// Control record sent on the data channel ahead of a frame's binary chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameStart {
    /// Always `"frame-start"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Decoded byte length of the JPEG that follows.
    pub size: usize,
}

impl FrameStart {
    /// Build the control record for a frame of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            kind: "frame-start".into(),
            size,
        }
    }
}

/// Serialize an outbound CDP command.
pub fn command_json(id: u64, method: &str, params: Value) -> String {
    serde_json::json!({ "id": id, "method": method, "params": params }).to_string()
}
