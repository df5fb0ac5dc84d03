//! End-to-end tests over a bound listener.
//!
//! A scripted stand-in plays Chrome: it announces a DevTools URL on stderr
//! that points at a local websocket endpoint acting as the browser
//! debugger. No real browser is required.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use glimpse_server::{GlimpseServer, ServerConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Serializes tests that set `CHROME_PATH`.
static ENV_LOCK: Mutex<()> = Mutex::new(());

struct ChromePathGuard {
    prev: Option<String>,
}

impl ChromePathGuard {
    fn set(path: &Path) -> Self {
        let prev = std::env::var("CHROME_PATH").ok();
        unsafe { std::env::set_var("CHROME_PATH", path) };
        Self { prev }
    }
}

impl Drop for ChromePathGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var("CHROME_PATH", v) },
            None => unsafe { std::env::remove_var("CHROME_PATH") },
        }
    }
}

/// A local websocket endpoint standing in for the browser debugger: replies
/// to every text message with a CDP-shaped result carrying the same id.
async fn spawn_fake_debugger() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Text(text) = message {
                        let id = serde_json::from_str::<Value>(text.as_str())
                            .ok()
                            .and_then(|v| v["id"].as_u64())
                            .unwrap_or(0);
                        let reply = serde_json::json!({
                            "id": id,
                            "result": { "product": "FakeChrome/1.0" },
                        });
                        if ws
                            .send(Message::Text(reply.to_string().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            });
        }
    });
    port
}

/// Write an executable script that announces a DevTools URL on the given
/// port and then stays alive.
fn fake_chrome_script(dir: &Path, debugger_port: u16) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-chrome");
    let body = format!(
        "#!/bin/sh\necho \"DevTools listening on ws://127.0.0.1:{debugger_port}/devtools/browser/itest\" >&2\nsleep 60\n"
    );
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn boot_server() -> (String, Arc<GlimpseServer>) {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..ServerConfig::default()
    };
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let server = Arc::new(GlimpseServer::new(config, metrics_handle));
    let (addr, _handle) = server.listen().await.unwrap();
    (format!("http://{addr}"), server)
}

/// Create a session through the API; returns its id.
async fn create_session(client: &reqwest::Client, base: &str) -> Value {
    let resp = client
        .post(format!("{base}/sessions"))
        .json(&serde_json::json!({ "duration_minutes": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

/// Build a realistic SDP offer carrying a `screencast` data channel.
async fn data_channel_offer() -> String {
    use webrtc::api::media_engine::MediaEngine;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    let mut media = MediaEngine::default();
    media.register_default_codecs().unwrap();
    let api = APIBuilder::new().with_media_engine(media).build();
    let pc = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .unwrap();
    let _channel = pc.create_data_channel("screencast", None).await.unwrap();

    let offer = pc.create_offer(None).await.unwrap();
    let mut gathering_done = pc.gathering_complete_promise().await;
    pc.set_local_description(offer).await.unwrap();
    let _ = gathering_done.recv().await;
    let sdp = pc.local_description().await.unwrap().sdp;
    pc.close().await.unwrap();
    sdp
}

#[tokio::test]
async fn create_list_delete_roundtrip() {
    let _env = ENV_LOCK.lock();
    let dir = tempfile::tempdir().unwrap();
    let debugger_port = spawn_fake_debugger().await;
    let _chrome = ChromePathGuard::set(&fake_chrome_script(dir.path(), debugger_port));

    let (base, _server) = boot_server().await;
    let client = reqwest::Client::new();

    let session = create_session(&client, &base).await;
    let id = session["id"].as_str().unwrap().to_string();
    assert!(session["cdp_url"].as_str().unwrap().contains(&id));
    assert!(session["created_at"].is_string());
    assert!(session["expires_at"].is_string());

    let listed: Value = client
        .get(format!("{base}/sessions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["id"] == id.as_str()));

    let deleted = client
        .delete(format!("{base}/sessions/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);

    let second_delete = client
        .delete(format!("{base}/sessions/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(second_delete.status(), 404);

    let listed: Value = client
        .get(format!("{base}/sessions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!listed
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["id"] == id.as_str()));
}

#[tokio::test]
async fn malformed_create_body_defaults_to_five_minutes() {
    let _env = ENV_LOCK.lock();
    let dir = tempfile::tempdir().unwrap();
    let debugger_port = spawn_fake_debugger().await;
    let _chrome = ChromePathGuard::set(&fake_chrome_script(dir.path(), debugger_port));

    let (base, _server) = boot_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/sessions"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let session: Value = resp.json().await.unwrap();

    let created = chrono::DateTime::parse_from_rfc3339(session["created_at"].as_str().unwrap())
        .unwrap();
    let expires = chrono::DateTime::parse_from_rfc3339(session["expires_at"].as_str().unwrap())
        .unwrap();
    assert_eq!((expires - created).num_minutes(), 5);

    let id = session["id"].as_str().unwrap();
    client
        .delete(format!("{base}/sessions/{id}"))
        .send()
        .await
        .unwrap();
}

#[tokio::test]
async fn cdp_proxy_relays_messages() {
    let _env = ENV_LOCK.lock();
    let dir = tempfile::tempdir().unwrap();
    let debugger_port = spawn_fake_debugger().await;
    let _chrome = ChromePathGuard::set(&fake_chrome_script(dir.path(), debugger_port));

    let (base, _server) = boot_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;
    let id = session["id"].as_str().unwrap();

    let ws_url = format!("{}/sessions/{id}/cdp", base.replace("http://", "ws://"));
    let (mut ws, _) = connect_async(&ws_url).await.unwrap();

    ws.send(Message::Text(
        r#"{"id":1,"method":"Browser.getVersion"}"#.into(),
    ))
    .await
    .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("no reply within 2s")
        .unwrap()
        .unwrap();
    let Message::Text(text) = reply else {
        panic!("expected text reply, got: {reply:?}");
    };
    let parsed: Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(parsed["id"], 1);
    assert!(parsed.get("result").is_some());
}

#[tokio::test]
async fn cdp_proxy_unknown_session_rejects_handshake() {
    let _env = ENV_LOCK.lock();
    let (base, _server) = boot_server().await;
    let ws_url = format!("{}/sessions/nope/cdp", base.replace("http://", "ws://"));
    assert!(connect_async(&ws_url).await.is_err());
}

#[tokio::test]
async fn whip_rejects_wrong_content_type() {
    let _env = ENV_LOCK.lock();
    let dir = tempfile::tempdir().unwrap();
    let debugger_port = spawn_fake_debugger().await;
    let _chrome = ChromePathGuard::set(&fake_chrome_script(dir.path(), debugger_port));

    let (base, server) = boot_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;
    let id = session["id"].as_str().unwrap();

    let resp = client
        .post(format!("{base}/sessions/{id}/whip"))
        .header("content-type", "application/json")
        .body(r#"{"sdp":"v=0"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(server.whip().is_empty());
}

#[tokio::test]
async fn whip_offer_negotiates_and_deletes() {
    let _env = ENV_LOCK.lock();
    let dir = tempfile::tempdir().unwrap();
    let debugger_port = spawn_fake_debugger().await;
    let _chrome = ChromePathGuard::set(&fake_chrome_script(dir.path(), debugger_port));

    let (base, server) = boot_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;
    let id = session["id"].as_str().unwrap().to_string();

    let offer = data_channel_offer().await;
    let resp = tokio::time::timeout(
        TIMEOUT,
        client
            .post(format!("{base}/sessions/{id}/whip"))
            .header("content-type", "application/sdp")
            .body(offer)
            .send(),
    )
    .await
    .expect("whip negotiation timed out")
    .unwrap();

    assert_eq!(resp.status(), 201);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/sdp"
    );
    let location = resp
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with(&format!("/sessions/{id}/whip/")));

    let answer = resp.text().await.unwrap();
    assert!(answer.contains("v=0"));
    assert_eq!(server.whip().len(), 1);

    // PATCH on the live resource is a no-content stub.
    let patched = client
        .patch(format!("{base}{location}"))
        .send()
        .await
        .unwrap();
    assert_eq!(patched.status(), 204);

    let deleted = client
        .delete(format!("{base}{location}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
    assert!(server.whip().is_empty());

    let second_delete = client
        .delete(format!("{base}{location}"))
        .send()
        .await
        .unwrap();
    assert_eq!(second_delete.status(), 404);
}
