//! Background task that trims the idle set back towards `min_size`

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::pool::{PoolShared, close_quietly};

/// Spawn the reaper for `shared`
///
/// Every `reap_interval` it closes at most one idle connection, and only
/// while more than `min_size` are idle. The wait is cut short by the pool's
/// cancellation token, after which the task exits without reaping.
pub(crate) fn spawn(shared: Arc<PoolShared>) -> JoinHandle<()> {
    let interval = shared.config().reap_interval();
    let min_size = shared.config().min_size();
    let cancel = shared.cancel.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }

            let victim = {
                let mut state = shared.state.lock();
                if !state.is_running() {
                    break;
                }
                state.reap_one(min_size)
            };

            if let Some(conn) = victim {
                tracing::debug!(
                    idle = shared.state.lock().idle_len(),
                    min_size,
                    "reaping idle connection"
                );
                close_quietly(conn).await;
            }
        }
        tracing::trace!("reaper stopped");
    })
}
