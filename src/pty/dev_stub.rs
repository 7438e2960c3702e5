//! Non-Windows development stand-in for [`super::windows::ConPtyBackend`].
//!
//! Spawns a child over plain OS pipes via `std::process::Command` rather
//! than a real pseudo-console. It satisfies [`PtyBackend`] so the rest of
//! the crate builds and its non-PTY logic (codec, scrollback, screen,
//! dispatcher) is testable off Windows, but it cannot exercise the virtual
//! screen the way a real console host does (no cursor-position queries, no
//! line-discipline echo); not meant to ship.
//!
//! Shell selection mirrors `cco`'s `detect_shell`: `$SHELL`, then
//! `/bin/bash`, then `/bin/sh`. Child, stdin and stdout each sit behind
//! their own mutex so a read in progress never blocks a concurrent write.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{PtyBackend, PtySize};
use crate::error::{DaemonError, Result};

pub struct StubPtyBackend {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<ChildStdout>,
    exit_code: Mutex<Option<i32>>,
    closed: AtomicBool,
}

impl StubPtyBackend {
    pub fn spawn(_size: PtySize, command: &[String], cwd: &Path) -> Result<Self> {
        let argv: Vec<String> = if command.is_empty() {
            vec![detect_shell()?]
        } else {
            command.to_vec()
        };

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if cwd.exists() {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(DaemonError::system)?;
        let stdin = child.stdin.take().ok_or_else(|| DaemonError::System("no child stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| DaemonError::System("no child stdout".into()))?;

        Ok(StubPtyBackend {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(stdout),
            exit_code: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }
}

impl PtyBackend for StubPtyBackend {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut stdout = self.stdout.lock().expect("stdout mutex poisoned");
        match stdout.read(buf) {
            Ok(0) => Err(DaemonError::ChildExited),
            Ok(n) => Ok(n),
            Err(e) => Err(DaemonError::system(e)),
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        let mut stdin = self.stdin.lock().expect("stdin mutex poisoned");
        stdin.write_all(data).map_err(DaemonError::system)?;
        Ok(data.len())
    }

    fn resize(&self, _size: PtySize) -> Result<()> {
        // No real console to resize; accepted as a no-op.
        Ok(())
    }

    fn wait(&self) -> Result<()> {
        let mut child = self.child.lock().expect("child mutex poisoned");
        let status = child.wait().map_err(DaemonError::system)?;
        *self.exit_code.lock().expect("exit code mutex poisoned") = status.code().or(Some(1));
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock().expect("exit code mutex poisoned")
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut child = self.child.lock().expect("child mutex poisoned");
        match child.try_wait() {
            Ok(None) => {
                let _ = child.kill();
            }
            Ok(Some(status)) => {
                *self.exit_code.lock().expect("exit code mutex poisoned") = status.code().or(Some(1));
            }
            Err(_) => {}
        }
        let _ = child.wait();
    }
}

impl Drop for StubPtyBackend {
    fn drop(&mut self) {
        self.close();
    }
}

fn detect_shell() -> Result<String> {
    if let Ok(shell) = std::env::var("SHELL") {
        if Path::new(&shell).exists() {
            return Ok(shell);
        }
    }
    if Path::new("/bin/bash").exists() {
        return Ok("/bin/bash".to_string());
    }
    if Path::new("/bin/sh").exists() {
        return Ok("/bin/sh".to_string());
    }
    Err(DaemonError::System(
        "no suitable shell found: checked $SHELL, /bin/bash, /bin/sh".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawns_true_and_reaches_eof() {
        let pty = StubPtyBackend::spawn(
            PtySize { cols: 80, rows: 24 },
            &["/bin/echo".to_string(), "hi".to_string()],
            Path::new("."),
        )
        .unwrap();

        let mut buf = [0u8; 64];
        let mut collected = Vec::new();
        loop {
            match pty.read(&mut buf) {
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(DaemonError::ChildExited) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(collected, b"hi\n");
    }

    #[test]
    fn close_is_idempotent() {
        let pty = StubPtyBackend::spawn(PtySize { cols: 80, rows: 24 }, &["/bin/sleep".to_string(), "5".to_string()], Path::new("."))
            .unwrap();
        pty.close();
        pty.close();
    }
}
