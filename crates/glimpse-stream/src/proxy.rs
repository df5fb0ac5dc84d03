//! Transparent websocket relay between a debug client and the browser's
//! debugger endpoint.
//!
//! The target is dialled before the client upgrade so a dead browser
//! surfaces as a plain 502 instead of a dropped websocket.

use axum::extract::ws::{Message as ClientMessage, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as BrowserMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type BrowserWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dial the debugger at `debugger_url`, then upgrade the inbound request and
/// splice the two connections until either side fails.
///
/// Any `Origin` is accepted; the relay never inspects or rewrites messages.
pub async fn proxy_debugger(ws: WebSocketUpgrade, debugger_url: String) -> Response {
    let browser = match connect_async(&debugger_url).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::warn!(url = %debugger_url, error = %e, "debugger dial failed");
            return (
                StatusCode::BAD_GATEWAY,
                "failed to connect to browser debugger",
            )
                .into_response();
        }
    };

    metrics::counter!("cdp_proxy_connections_total").increment(1);
    ws.on_upgrade(move |client| splice(client, browser))
        .into_response()
}

/// Run both forwarding directions concurrently; the first failure (or a
/// clean close from either peer) ends the relay and drops both sockets.
async fn splice(client: WebSocket, browser: BrowserWs) {
    let (mut browser_tx, mut browser_rx) = browser.split();
    let (mut client_tx, mut client_rx) = client.split();

    let client_to_browser = async {
        while let Some(message) = client_rx.next().await {
            let message = message.map_err(|e| e.to_string())?;
            let Some(forward) = client_to_browser_message(message) else {
                return Ok(());
            };
            browser_tx.send(forward).await.map_err(|e| e.to_string())?;
        }
        Ok::<(), String>(())
    };

    let browser_to_client = async {
        while let Some(message) = browser_rx.next().await {
            let message = message.map_err(|e| e.to_string())?;
            let Some(forward) = browser_to_client_message(message) else {
                return Ok(());
            };
            client_tx.send(forward).await.map_err(|e| e.to_string())?;
        }
        Ok::<(), String>(())
    };

    let (side, result) = tokio::select! {
        r = client_to_browser => ("client", r),
        r = browser_to_client => ("browser", r),
    };
    match result {
        Ok(()) => tracing::debug!(side, "debugger relay closed"),
        Err(e) => tracing::debug!(side, error = %e, "debugger relay terminated"),
    }
    // Both halves of both sockets drop here, closing the connections and
    // unblocking the other direction.
}

/// Map an inbound client frame to the browser connection. `None` ends the relay.
fn client_to_browser_message(message: ClientMessage) -> Option<BrowserMessage> {
    match message {
        ClientMessage::Text(t) => Some(BrowserMessage::Text(t.as_str().into())),
        ClientMessage::Binary(b) => Some(BrowserMessage::Binary(b)),
        ClientMessage::Ping(b) => Some(BrowserMessage::Ping(b)),
        ClientMessage::Pong(b) => Some(BrowserMessage::Pong(b)),
        ClientMessage::Close(_) => None,
    }
}

/// Map a browser frame to the client connection. `None` ends the relay.
fn browser_to_client_message(message: BrowserMessage) -> Option<ClientMessage> {
    match message {
        BrowserMessage::Text(t) => Some(ClientMessage::Text(t.as_str().into())),
        BrowserMessage::Binary(b) => Some(ClientMessage::Binary(b)),
        BrowserMessage::Ping(b) => Some(ClientMessage::Ping(b)),
        BrowserMessage::Pong(b) => Some(ClientMessage::Pong(b)),
        BrowserMessage::Close(_) => None,
        // Raw frames never surface from a read.
        BrowserMessage::Frame(_) => None,
    }
}
