//! Exit watcher: waits on the output pump's exit signal, then gives
//! callers a grace period for one final `capture_pane` before tearing the
//! accept loop down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use super::DaemonState;

const EXIT_GRACE_PERIOD: Duration = Duration::from_secs(5);

pub async fn run(state: Arc<DaemonState>, shutdown: Arc<Notify>) {
    state.exit_signal.notified().await;
    info!("child exited, entering grace period before shutdown");
    tokio::time::sleep(EXIT_GRACE_PERIOD).await;
    shutdown.notify_one();
}
