//! The screencast pump: drives a page target's screencast and multiplexes
//! the frames onto a WebRTC data channel.
//!
//! One pump owns one debugger websocket. Reads happen only in the main
//! loop; writes (bootstrap, acks, automation) all go through a single
//! writer mutex because concurrent writes on one websocket are undefined.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use webrtc::data_channel::RTCDataChannel;

use crate::cdp::{self, CdpMessage, ScreencastFrameParams, ScreencastOptions, TargetInfo};
use crate::error::StreamError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = Arc<Mutex<SplitSink<WsStream, Message>>>;

/// Reliable-ordered data channels cap out near 64 KiB per message on common
/// stacks; 60 000 bytes leaves headroom.
pub const CHUNK_SIZE: usize = 60_000;

/// How long the bootstrap navigation gets before the screencast starts.
const LOAD_SETTLE: Duration = Duration::from_secs(2);
/// Delay before the first automated scroll.
const SCROLL_START_DELAY: Duration = Duration::from_secs(3);
/// Period between automated scrolls.
const SCROLL_PERIOD: Duration = Duration::from_secs(1);
/// Scroll distance per tick, alternating sign.
const SCROLL_STEP: i32 = 100;

// Fixed ids for the bootstrap commands; acks and automation draw from a
// shared counter starting above them.
const PAGE_ENABLE_ID: u64 = 1;
const START_SCREENCAST_ID: u64 = 2;
const NAVIGATE_ID: u64 = 3;
const BRING_TO_FRONT_ID: u64 = 10;
const COUNTER_ID_BASE: u64 = 100;

/// Anything that can hand the pump a debugger base URL.
pub trait DebuggerEndpoint: Send + Sync {
    /// The browser-level DevTools websocket URL.
    fn debugger_url(&self) -> String;
}

impl DebuggerEndpoint for glimpse_browser::Session {
    fn debugger_url(&self) -> String {
        glimpse_browser::Session::debugger_url(self).to_string()
    }
}

/// Pump behavior knobs, fixed at resource creation.
#[derive(Clone, Debug)]
pub struct PumpOptions {
    /// URL the page is driven to before the screencast starts.
    pub bootstrap_url: String,
    /// Whether the alternating scroll ticker runs.
    pub auto_scroll: bool,
    /// Capture parameters.
    pub screencast: ScreencastOptions,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            bootstrap_url: "https://www.google.com".into(),
            auto_scroll: true,
            screencast: ScreencastOptions::default(),
        }
    }
}

/// Run the pump to completion, logging the terminating error.
///
/// Transport failures mid-stream are never surfaced to a caller; the pump
/// simply ends and the WHIP registry self-heals via the connection-state
/// callback.
pub async fn run(
    endpoint: Arc<dyn DebuggerEndpoint>,
    channel: Arc<RTCDataChannel>,
    options: PumpOptions,
) {
    match pump(endpoint.as_ref(), &channel, &options).await {
        Ok(()) => tracing::info!("screencast pump finished"),
        Err(e) => tracing::warn!(error = %e, "screencast pump terminated"),
    }
}

async fn pump(
    endpoint: &dyn DebuggerEndpoint,
    channel: &Arc<RTCDataChannel>,
    options: &PumpOptions,
) -> Result<(), StreamError> {
    let page_url = discover_page_target(endpoint).await?;
    tracing::info!(url = %page_url, "attaching to page target");

    let (ws, _) = connect_async(&page_url)
        .await
        .map_err(|e| StreamError::DebuggerUnreachable {
            context: format!("page dial: {e}"),
        })?;
    let (sink, mut stream) = ws.split();
    let writer: WsWriter = Arc::new(Mutex::new(sink));
    let ids = Arc::new(AtomicU64::new(COUNTER_ID_BASE));

    send_command(&writer, PAGE_ENABLE_ID, "Page.enable", json!({})).await?;
    send_command(&writer, BRING_TO_FRONT_ID, "Page.bringToFront", json!({})).await?;
    send_command(
        &writer,
        NAVIGATE_ID,
        "Page.navigate",
        json!({ "url": options.bootstrap_url }),
    )
    .await?;
    tokio::time::sleep(LOAD_SETTLE).await;

    let capture = &options.screencast;
    send_command(
        &writer,
        START_SCREENCAST_ID,
        "Page.startScreencast",
        json!({
            "format": capture.format.as_str(),
            "quality": capture.quality,
            "maxWidth": capture.max_width,
            "maxHeight": capture.max_height,
            "everyNthFrame": capture.every_nth_frame,
        }),
    )
    .await?;

    if options.auto_scroll {
        tokio::spawn(scroll_ticker(Arc::clone(&writer), Arc::clone(&ids)));
    }

    let result = read_loop(&mut stream, &writer, &ids, channel).await;

    // Closing the debugger socket fails the ticker's next write, which
    // terminates it.
    let _ = writer.lock().await.close().await;
    result
}

/// Resolve the first connectable page target behind the session's debugger.
async fn discover_page_target(endpoint: &dyn DebuggerEndpoint) -> Result<String, StreamError> {
    let debugger_url = endpoint.debugger_url();
    let port = url::Url::parse(&debugger_url)
        .ok()
        .and_then(|u| u.port())
        .ok_or_else(|| StreamError::DebuggerUnreachable {
            context: format!("no port in {debugger_url}"),
        })?;

    let targets: Vec<TargetInfo> = reqwest::get(format!("http://127.0.0.1:{port}/json"))
        .await
        .map_err(|e| StreamError::DebuggerUnreachable {
            context: format!("target listing: {e}"),
        })?
        .json()
        .await
        .map_err(|e| StreamError::DebuggerUnreachable {
            context: format!("target decode: {e}"),
        })?;

    select_page_target(targets).ok_or(StreamError::NoPageTarget)
}

/// Pick the first page target with a connectable debugger websocket.
fn select_page_target(targets: Vec<TargetInfo>) -> Option<String> {
    targets
        .into_iter()
        .find(|t| t.kind == "page" && !t.web_socket_debugger_url.is_empty())
        .map(|t| t.web_socket_debugger_url)
}

/// Consume debugger events until either connection fails.
async fn read_loop(
    stream: &mut SplitStream<WsStream>,
    writer: &WsWriter,
    ids: &AtomicU64,
    channel: &Arc<RTCDataChannel>,
) -> Result<(), StreamError> {
    while let Some(message) = stream.next().await {
        let message = message.map_err(|e| StreamError::Transport {
            context: format!("read: {e}"),
        })?;
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(envelope) = serde_json::from_str::<CdpMessage>(text.as_str()) else {
            continue;
        };
        if envelope.method.as_deref() != Some("Page.screencastFrame") {
            continue;
        }
        let frame: ScreencastFrameParams = match serde_json::from_value(envelope.params) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "malformed screencast frame params");
                continue;
            }
        };
        let payload = match base64::engine::general_purpose::STANDARD.decode(&frame.data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "screencast frame base64 decode failed");
                continue;
            }
        };

        forward_frame(channel, &payload).await?;
        metrics::counter!("screencast_frames_total").increment(1);
        metrics::counter!("screencast_bytes_total").increment(payload.len() as u64);

        // Mandatory: without the ack the browser never delivers another frame.
        let ack_id = ids.fetch_add(1, Ordering::Relaxed);
        send_command(
            writer,
            ack_id,
            "Page.screencastFrameAck",
            json!({ "sessionId": frame.session_id }),
        )
        .await?;
    }
    Ok(())
}

/// Emit one frame on the data channel: the `frame-start` control record,
/// then the payload in fixed-size binary chunks.
async fn forward_frame(channel: &Arc<RTCDataChannel>, payload: &[u8]) -> Result<(), StreamError> {
    let header = serde_json::to_string(&cdp::FrameStart::new(payload.len()))
        .expect("frame-start serializes");
    channel
        .send_text(header)
        .await
        .map_err(|e| StreamError::ChannelSend {
            context: format!("frame-start: {e}"),
        })?;

    for chunk in payload.chunks(CHUNK_SIZE) {
        channel
            .send(&Bytes::copy_from_slice(chunk))
            .await
            .map_err(|e| StreamError::ChannelSend {
                context: format!("chunk: {e}"),
            })?;
    }
    Ok(())
}

/// Alternate `window.scrollBy(0, ±100)` once a second to keep the screencast
/// visibly live. Exits when the debugger write fails.
async fn scroll_ticker(writer: WsWriter, ids: Arc<AtomicU64>) {
    tokio::time::sleep(SCROLL_START_DELAY).await;
    let mut down = true;
    loop {
        tokio::time::sleep(SCROLL_PERIOD).await;
        let dy = if down { SCROLL_STEP } else { -SCROLL_STEP };
        down = !down;

        let id = ids.fetch_add(1, Ordering::Relaxed);
        let expression = format!("window.scrollBy(0, {dy});");
        let send = send_command(
            &writer,
            id,
            "Runtime.evaluate",
            json!({ "expression": expression }),
        )
        .await;
        if send.is_err() {
            tracing::debug!("automation ticker stopped: debugger write failed");
            break;
        }
    }
}

/// Write one CDP command under the writer mutex.
async fn send_command(
    writer: &WsWriter,
    id: u64,
    method: &str,
    params: Value,
) -> Result<(), StreamError> {
    let raw = cdp::command_json(id, method, params);
    writer
        .lock()
        .await
        .send(Message::Text(raw.into()))
        .await
        .map_err(|e| StreamError::Transport {
            context: format!("write {method}: {e}"),
        })
}
