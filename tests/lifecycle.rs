//! End-to-end session lifecycle: start a daemon against a real ConPTY-backed
//! child, talk to it over the wire protocol, and watch it tear itself down
//! after the child exits. Windows-only since it exercises `ConPtyBackend`.

#![cfg(windows)]

use std::time::Duration;

use ptyd::codec::{Action, Request};
use ptyd::config::{ControlFile, SessionConfig};
use ptyd::{client, daemon};

fn temp_socket_path() -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap().into_path();
    dir.join("session.sock")
}

#[tokio::test]
async fn ping_has_session_then_exit_tears_daemon_down() {
    let socket_path = temp_socket_path();
    let config = SessionConfig {
        socket_path: socket_path.clone(),
        session_name: "lifecycle-test".into(),
        working_dir: std::env::temp_dir(),
        command: vec!["powershell.exe".into(), "-NoProfile".into(), "-Command".into(), "Start-Sleep -Seconds 1".into()],
        cols: 80,
        rows: 24,
    };

    let daemon_handle = tokio::spawn(daemon::run(config));

    // Wait for the control file to appear, up to 5s.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while ControlFile::read(&socket_path).is_err() {
        assert!(tokio::time::Instant::now() < deadline, "control file never appeared");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let ping = Request { action: Some(Action::Ping), ..Default::default() };
    let response = client::send(&socket_path, ping).await.expect("ping failed");
    assert!(response.ok);

    let has_session = Request { action: Some(Action::HasSession), ..Default::default() };
    let response = client::send(&socket_path, has_session.clone()).await.expect("has_session failed");
    assert_eq!(response.exists, Some(true));

    // The child (`sleep 1`) exits on its own; poll has_session until it
    // flips false within the grace window, then confirm cleanup.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(8);
    loop {
        assert!(tokio::time::Instant::now() < deadline, "daemon did not report exit in time");
        match client::send(&socket_path, has_session.clone()).await {
            Ok(response) if response.exists == Some(false) => break,
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }

    daemon_handle.await.expect("daemon task panicked").expect("daemon returned an error");
    assert!(!socket_path.exists(), "control file should be removed after shutdown");
}
