//! Session configuration and the control file.
//!
//! The control file is the one piece of durable state a session daemon
//! leaves on disk: a small JSON document at the socket path advertising the
//! TCP port a client should dial and the daemon's process id. Clients that
//! want to talk to a running session read this file rather than guessing a
//! port.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

/// Immutable configuration a daemon is started with.
///
/// Built once by the CLI front-end from parsed arguments and handed to
/// [`crate::daemon::run`]; nothing in the core mutates it after that.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Filesystem path of the control file (the `-S` flag).
    pub socket_path: PathBuf,
    /// Opaque session label (the `-s` flag). Not interpreted by the core.
    pub session_name: String,
    /// Working directory the child process is spawned in.
    pub working_dir: PathBuf,
    /// Shell command line to execute (program + args).
    pub command: Vec<String>,
    /// Initial terminal width in columns.
    pub cols: u16,
    /// Initial terminal height in rows.
    pub rows: u16,
}

impl SessionConfig {
    /// The sibling log file this session's daemon writes to: `<socket_path>.log`.
    pub fn log_path(&self) -> PathBuf {
        let mut p = self.socket_path.clone().into_os_string();
        p.push(".log");
        PathBuf::from(p)
    }
}

/// Contents of the control file written at the socket path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlFile {
    pub port: u16,
    pub pid: u32,
}

impl ControlFile {
    /// Write `{port, pid}` as compact JSON to `path`, creating parent
    /// directories as needed.
    pub fn write(path: &Path, port: u16, pid: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DaemonError::system)?;
        }
        let body = serde_json::to_string(&ControlFile { port, pid })
            .map_err(|e| DaemonError::System(e.to_string()))?;
        std::fs::write(path, body).map_err(DaemonError::system)?;
        Ok(())
    }

    /// Read and parse the control file at `path`.
    ///
    /// A missing or unparsable file maps to [`DaemonError::NotFound`], per
    /// the protocol design's client-side mapping.
    pub fn read(path: &Path) -> Result<ControlFile> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::NotFound(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| DaemonError::NotFound(format!("{}: {}", path.display(), e)))
    }

    /// Remove the control file. Idempotent: a missing file is not an error.
    pub fn remove(path: &Path) {
        let _ = std::fs::remove_file(path);
    }

    /// Confirm the advertised port actually accepts a connection within
    /// `timeout`. A parsable control file whose port refuses within the
    /// deadline is reported as [`DaemonError::NotRunning`].
    pub async fn confirm_running(&self, timeout: Duration) -> Result<()> {
        let addr = format!("127.0.0.1:{}", self.port);
        match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(DaemonError::NotRunning(format!("{}: {}", addr, e))),
            Err(_) => Err(DaemonError::NotRunning(format!(
                "{} did not accept a connection within {:?}",
                addr, timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.sock");

        ControlFile::write(&path, 4242, 999).unwrap();
        let read_back = ControlFile::read(&path).unwrap();

        assert_eq!(read_back.port, 4242);
        assert_eq!(read_back.pid, 999);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");

        let err = ControlFile::read(&path).unwrap_err();
        assert!(matches!(err, DaemonError::NotFound(_)));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.sock");
        ControlFile::remove(&path);
        ControlFile::write(&path, 1, 2).unwrap();
        ControlFile::remove(&path);
        ControlFile::remove(&path);
        assert!(!path.exists());
    }

    #[test]
    fn log_path_is_sibling_with_log_suffix() {
        let cfg = SessionConfig {
            socket_path: PathBuf::from("/tmp/mysession.sock"),
            session_name: "s".into(),
            working_dir: PathBuf::from("."),
            command: vec!["bash".into()],
            cols: 120,
            rows: 40,
        };
        assert_eq!(cfg.log_path(), PathBuf::from("/tmp/mysession.sock.log"));
    }
}
