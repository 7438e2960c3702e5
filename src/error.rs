//! Error kinds for the session daemon.
//!
//! Mirrors the seven-kind taxonomy the protocol design calls for: a client
//! argument can be malformed before it ever reaches the wire, the control
//! file can be missing or stale, framing can be violated, and so on. Action
//! handlers in [`crate::daemon::dispatcher`] catch the kinds that should
//! become an `{ok:false, error}` response; everything else bubbles up and
//! tears the owning task down.

use thiserror::Error;

/// All error kinds produced by the core (pty, screen, scrollback, codec,
/// control file, dispatcher).
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A client-supplied argument was malformed (bad flag, missing value).
    #[error("parse error: {0}")]
    Parse(String),

    /// The control file is absent or unreadable.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The control file parses but the advertised port refuses connections.
    #[error("session not running: {0}")]
    NotRunning(String),

    /// A framing violation: oversized length header, truncated body, or a
    /// per-connection deadline was exceeded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A well-formed request whose action, option, key, or pipe shape isn't
    /// supported.
    #[error("action rejected: {0}")]
    ActionRejected(String),

    /// A PTY primitive or pipe I/O call failed.
    #[error("system error: {0}")]
    System(String),

    /// An operation that requires a live child was issued after it exited.
    #[error("child exited")]
    ChildExited,
}

impl DaemonError {
    /// Wrap a [`std::io::Error`] as a [`DaemonError::System`].
    pub fn system(err: impl std::fmt::Display) -> Self {
        DaemonError::System(err.to_string())
    }
}

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        DaemonError::System(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
