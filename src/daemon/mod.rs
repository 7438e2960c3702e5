//! Session daemon: owns the PTY, scrollback, virtual screen, tee file, and
//! TCP listener for one session, and runs its lifecycle end to end.
//!
//! Grounded on `cco`'s daemon directory/logging helpers (`get_daemon_dir`,
//! `init_daemon_logging`) adapted from a single shared `~/.cco` directory to
//! a per-session control file and sibling log, and on the shared
//! `Arc<Mutex<...>>` state-struct idiom in `cco`'s `DaemonState`, adapted
//! from axum request handlers to the raw length-prefixed TCP protocol this
//! daemon speaks instead.

pub mod dispatcher;
pub mod pump;
pub mod watcher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::config::{ControlFile, SessionConfig};
use crate::error::{DaemonError, Result};
use crate::pty::{self, PtyBackend};
use crate::screen::parser::Screen;
use crate::scrollback::Scrollback;
use crate::tee::Tee;

const SCROLLBACK_DEFAULT_CAPACITY: usize = 2000;

/// Everything a per-connection handler, the pump, and the watcher share.
pub struct DaemonState {
    pub pty: Arc<dyn PtyBackend>,
    pub scrollback: Mutex<Scrollback>,
    pub screen: Mutex<Screen>,
    pub tee: Tee,
    /// Set once the output pump observes the child has exited.
    pub exited: AtomicBool,
    /// Signalled by the pump on exit; the watcher waits on this rather than
    /// blocking a thread on the PTY's own `wait`, so nothing needs to
    /// contend with the pump's read loop or a handler's write.
    pub exit_signal: Notify,
}

impl DaemonState {
    pub fn has_session(&self) -> bool {
        !self.exited.load(Ordering::Acquire)
    }
}

/// Run one session daemon to completion: build the PTY, bind the listener,
/// write the control file, start the long-lived tasks, accept connections
/// until the watcher closes things down, then clean up.
///
/// Returns once cleanup has finished (the socket path's control file and
/// log are the only durable traces left).
pub async fn run(config: SessionConfig) -> Result<()> {
    init_logging(&config)?;

    let backend = pty::spawn(
        pty::PtySize { cols: config.cols, rows: config.rows },
        &config.command,
        &config.working_dir,
    )?;

    let state = Arc::new(DaemonState {
        pty: Arc::from(backend),
        scrollback: Mutex::new(Scrollback::new(SCROLLBACK_DEFAULT_CAPACITY)),
        screen: Mutex::new(Screen::new(config.cols, config.rows)),
        tee: Tee::new(),
        exited: AtomicBool::new(false),
        exit_signal: Notify::new(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.map_err(DaemonError::system)?;
    let port = listener.local_addr().map_err(DaemonError::system)?.port();
    let pid = std::process::id();
    ControlFile::write(&config.socket_path, port, pid)?;

    info!(session = %config.session_name, port, pid, "session daemon started");

    let shutdown = Arc::new(Notify::new());

    let pump_handle = tokio::spawn(pump::run(state.clone()));
    let watcher_handle = tokio::spawn(watcher::run(state.clone(), shutdown.clone()));

    accept_loop(state.clone(), listener, shutdown).await;

    pump_handle.abort();
    watcher_handle.abort();

    cleanup(&state, &config.socket_path);

    info!(session = %config.session_name, "session daemon stopped");
    Ok(())
}

async fn accept_loop(state: Arc<DaemonState>, listener: TcpListener, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = dispatcher::handle_connection(state, stream).await {
                                warn!(error = %e, "connection handler failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
            _ = shutdown.notified() => {
                break;
            }
        }
    }
}

fn cleanup(state: &DaemonState, socket_path: &std::path::Path) {
    state.tee.close();
    state.pty.close();
    ControlFile::remove(socket_path);
}

/// Mirrors `cco`'s `init_daemon_logging`: a non-rotating file appender at
/// the session's log path, ANSI disabled, target/thread-id/line-number
/// simplified away since each daemon's log already covers one session.
fn init_logging(config: &SessionConfig) -> Result<()> {
    let log_path = config.log_path();
    let dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = log_path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "session.log".into());
    std::fs::create_dir_all(dir).map_err(DaemonError::system)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    tracing_subscriber::fmt()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_session_is_true_until_marked_exited() {
        let exited = AtomicBool::new(false);
        assert!(!exited.load(Ordering::Acquire));
        exited.store(true, Ordering::Release);
        assert!(exited.load(Ordering::Acquire));
    }
}
