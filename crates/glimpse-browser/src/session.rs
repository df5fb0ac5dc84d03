//! One browser subprocess: launch, DevTools discovery, lifetime, teardown.
//!
//! Chrome announces its debugger endpoint on stderr; everything else about
//! the subprocess is opaque to us. A session owns the process and its
//! private profile directory, and nothing else.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::BrowserError;

/// How long Chrome gets to announce its DevTools endpoint.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Chrome prints: `DevTools listening on ws://127.0.0.1:33693/devtools/browser/<uuid>`
static DEVTOOLS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DevTools listening on (ws://\S+)").expect("static regex"));

/// A single live browser subprocess.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    debugger_url: String,
    port: u16,
    data_dir: PathBuf,
    cancel: CancellationToken,
    closed: AtomicBool,
    /// Serializes `stop()` against its concurrent callers (timer, delete, reaper).
    stop_lock: Mutex<()>,
}

impl Session {
    /// Launch a headless Chrome and wait for its debugger endpoint.
    ///
    /// On success the subprocess is running, its DevTools URL is known, and
    /// three background tasks are live: the reaper (kills the process when
    /// the cancel token fires, or marks the session closed if the process
    /// exits on its own), the lifetime timer, and a stderr drain.
    pub async fn launch(chrome_path: &Path, lifetime: Duration) -> Result<Arc<Self>, BrowserError> {
        Self::launch_inner(chrome_path, lifetime, STARTUP_TIMEOUT).await
    }

    async fn launch_inner(
        chrome_path: &Path,
        lifetime: Duration,
        startup_timeout: Duration,
    ) -> Result<Arc<Self>, BrowserError> {
        let id = Uuid::now_v7().to_string();
        let data_dir = PathBuf::from(format!("/tmp/chrome-profile-{id}"));

        let mut child = Command::new(chrome_path)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", data_dir.display()))
            .arg("--window-size=1920,1080")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed {
                context: e.to_string(),
            })?;

        let stderr = child.stderr.take().ok_or_else(|| BrowserError::LaunchFailed {
            context: "stderr not captured".into(),
        })?;

        let discovered =
            tokio::time::timeout(startup_timeout, discover_debugger_url(stderr)).await;

        let (debugger_url, lines) = match discovered {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                abort_launch(&mut child, &data_dir).await;
                return Err(e);
            }
            Err(_) => {
                abort_launch(&mut child, &data_dir).await;
                return Err(BrowserError::StartupTimeout {
                    timeout_ms: startup_timeout.as_millis() as u64,
                });
            }
        };

        let port = url::Url::parse(&debugger_url)
            .ok()
            .and_then(|u| u.port())
            .ok_or_else(|| BrowserError::MalformedDebuggerUrl {
                url: debugger_url.clone(),
            });
        let port = match port {
            Ok(p) => p,
            Err(e) => {
                abort_launch(&mut child, &data_dir).await;
                return Err(e);
            }
        };

        let created_at = Utc::now();
        let session = Arc::new(Self {
            id,
            created_at,
            expires_at: created_at
                + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::zero()),
            debugger_url,
            port,
            data_dir,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            stop_lock: Mutex::new(()),
        });

        session.spawn_reaper(child);
        session.spawn_lifetime_timer(lifetime);
        spawn_stderr_drain(lines);

        tracing::info!(
            session_id = %session.id,
            port = session.port,
            lifetime_secs = lifetime.as_secs(),
            "browser session launched"
        );
        Ok(session)
    }

    /// Opaque session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Wall-clock deadline after which the session stops itself.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Browser-level DevTools websocket URL announced by Chrome.
    pub fn debugger_url(&self) -> &str {
        &self.debugger_url
    }

    /// TCP port of the DevTools endpoint.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Private profile directory owned by this session.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Whether the session has been stopped (or its subprocess has exited).
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the session: signal the subprocess, remove the profile
    /// directory, and set the closed flag.
    ///
    /// Safe to call from the lifetime timer, from an explicit delete, and
    /// from the reaper when the subprocess exits on its own, in any order.
    pub async fn stop(&self) {
        let _guard = self.stop_lock.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if let Err(e) = tokio::fs::remove_dir_all(&self.data_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(session_id = %self.id, error = %e, "profile dir cleanup failed");
            }
        }
        tracing::info!(session_id = %self.id, "browser session stopped");
    }

    /// Kill the subprocess when the cancel token fires; mark the session
    /// closed if the subprocess exits on its own.
    fn spawn_reaper(self: &Arc<Self>, mut child: Child) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    tracing::info!(session_id = %session.id, ?status, "browser exited on its own");
                    session.stop().await;
                }
                _ = session.cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        });
    }

    /// Single-shot deadline: when the lifetime elapses, stop the session.
    fn spawn_lifetime_timer(self: &Arc<Self>, lifetime: Duration) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(lifetime) => {
                    tracing::info!(session_id = %session.id, "session lifetime elapsed");
                    session.stop().await;
                }
                _ = session.cancel.cancelled() => {}
            }
        });
    }
}

/// Scan stderr line by line until Chrome announces its DevTools endpoint.
///
/// Returns the URL and the partially consumed line reader so the caller can
/// keep draining (Chrome blocks if its stderr pipe fills up).
async fn discover_debugger_url(
    stderr: ChildStderr,
) -> Result<(String, Lines<BufReader<ChildStderr>>), BrowserError> {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(caps) = DEVTOOLS_LINE.captures(&line) {
                    return Ok((caps[1].to_string(), lines));
                }
            }
            Ok(None) => return Err(BrowserError::StartupAborted),
            Err(e) => {
                return Err(BrowserError::LaunchFailed {
                    context: format!("stderr read: {e}"),
                })
            }
        }
    }
}

/// Consume the rest of stderr so the subprocess never blocks on a full pipe.
fn spawn_stderr_drain(mut lines: Lines<BufReader<ChildStderr>>) {
    tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });
}

/// Failed startup: kill the subprocess and remove whatever profile data it
/// already wrote.
async fn abort_launch(child: &mut Child, data_dir: &Path) {
    let _ = child.start_kill();
    let _ = child.wait().await;
    let _ = tokio::fs::remove_dir_all(data_dir).await;
}
