//! Output pump: the sole reader of the PTY output pipe, and the sole
//! writer into scrollback, the virtual screen, and the tee file.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use super::DaemonState;
use crate::error::DaemonError;

const READ_CHUNK: usize = 4096;

pub async fn run(state: Arc<DaemonState>) {
    loop {
        let pty = state.pty.clone();
        let read = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; READ_CHUNK];
            match pty.read(&mut buf) {
                Ok(n) => Ok(buf[..n].to_vec()),
                Err(e) => Err(e),
            }
        })
        .await;

        let bytes = match read {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(DaemonError::ChildExited)) => {
                debug!("output pump observed child exit");
                break;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "output pump read failed");
                break;
            }
            Err(join_err) => {
                warn!(error = %join_err, "output pump task panicked");
                break;
            }
        };

        if bytes.is_empty() {
            continue;
        }

        state.scrollback.lock().expect("scrollback mutex poisoned").write(&bytes);
        state.screen.lock().expect("screen mutex poisoned").write(&bytes);
        state.tee.write(&bytes);
    }

    state.exited.store(true, Ordering::Release);
    state.exit_signal.notify_one();
}
