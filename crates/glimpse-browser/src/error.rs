//! Browser supervision error types.

use thiserror::Error;

/// Errors from launching and supervising browser subprocesses.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Chrome executable not found on the system.
    #[error("Chrome not found — install Google Chrome or set CHROME_PATH")]
    ChromeNotFound,

    /// Failed to spawn the Chrome subprocess.
    #[error("failed to launch browser: {context}")]
    LaunchFailed {
        /// What went wrong during launch.
        context: String,
    },

    /// Chrome never announced its DevTools endpoint within the startup window.
    #[error("timed out after {timeout_ms}ms waiting for the devtools endpoint")]
    StartupTimeout {
        /// How long we waited.
        timeout_ms: u64,
    },

    /// Chrome's stderr closed before the DevTools endpoint was announced.
    #[error("browser exited before announcing its devtools endpoint")]
    StartupAborted,

    /// The announced DevTools URL could not be parsed.
    #[error("malformed devtools url: {url}")]
    MalformedDebuggerUrl {
        /// The URL as announced on stderr.
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_not_found_display() {
        let err = BrowserError::ChromeNotFound;
        assert!(err.to_string().contains("Chrome not found"));
    }

    #[test]
    fn launch_failed_display() {
        let err = BrowserError::LaunchFailed {
            context: "binary not executable".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to launch browser: binary not executable"
        );
    }

    #[test]
    fn startup_timeout_display() {
        let err = BrowserError::StartupTimeout { timeout_ms: 5000 };
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn startup_aborted_display() {
        let err = BrowserError::StartupAborted;
        assert!(err.to_string().contains("before announcing"));
    }

    #[test]
    fn malformed_url_display() {
        let err = BrowserError::MalformedDebuggerUrl {
            url: "ws://".into(),
        };
        assert!(err.to_string().contains("ws://"));
    }
}
