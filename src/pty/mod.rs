//! Pseudo-terminal backend abstraction.
//!
//! [`PtyBackend`] is the seam between the daemon and the platform: a real
//! ConPTY-backed implementation on Windows ([`windows::ConPtyBackend`]), and
//! a `std::process::Command` + OS-pipe stand-in everywhere else so the
//! crate builds and its non-PTY logic is testable off Windows
//! ([`dev_stub::StubPtyBackend`]).
//!
//! Methods take `&self`, not `&mut self`: the output pump reads, handlers
//! write, and the exit watcher polls `exit_code` concurrently, and on the
//! real backend these touch three independent OS handles (output pipe,
//! input pipe, process handle) that don't need mutual exclusion from one
//! another. Each backend protects only the state that actually needs it
//! (the child's exit code, the idempotent-close flag) behind its own lock.

use std::path::Path;

use crate::error::Result;

#[cfg(windows)]
pub mod windows;

#[cfg(not(windows))]
pub mod dev_stub;

/// Spawn the platform backend: real ConPTY on Windows, the OS-pipe stand-in
/// everywhere else.
pub fn spawn(size: PtySize, command: &[String], cwd: &Path) -> Result<Box<dyn PtyBackend>> {
    #[cfg(windows)]
    {
        Ok(Box::new(windows::ConPtyBackend::spawn(size, command, cwd)?))
    }
    #[cfg(not(windows))]
    {
        Ok(Box::new(dev_stub::StubPtyBackend::spawn(size, command, cwd)?))
    }
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    pub cols: u16,
    pub rows: u16,
}

/// The pseudo-terminal primitive the daemon drives: a child process
/// attached to a console, with anonymous pipes for its combined
/// stdout/stderr stream and its stdin.
pub trait PtyBackend: Send + Sync {
    /// Poll-then-read up to `buf.len()` bytes of child output. Blocks the
    /// calling (dedicated) thread until data is available or the child has
    /// exited with nothing left to drain, in which case it returns
    /// [`crate::error::DaemonError::ChildExited`].
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write `data` to the child's input pipe. Short writes are surfaced as
    /// errors rather than retried internally; callers decide how to handle them.
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Resize the underlying console.
    fn resize(&self, size: PtySize) -> Result<()>;

    /// Block until the child exits.
    fn wait(&self) -> Result<()>;

    /// The child's exit code, once `wait` (or a `read`/`close` that
    /// observed the exit) has recorded it. `None` beforehand.
    fn exit_code(&self) -> Option<i32>;

    /// Idempotent teardown: close the console, terminate the child if still
    /// running, close pipe and process handles. Safe to call from any
    /// thread, concurrently with `read`/`write` from others.
    fn close(&self);
}
