//! Background eviction of idle sessions

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::store::SessionStore;

/// Shortest pass interval; `tokio::time::interval` rejects zero
pub(crate) const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running reaper task
#[derive(Debug)]
pub(crate) struct ReaperHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the reaper to stop without waiting for it
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the reaper and wait for the task to finish
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Session reaper task ended abnormally");
        }
    }
}

/// Spawn the reaper loop on the current runtime
///
/// The task holds only a weak reference, so dropping the store ends the loop
/// at its next tick.
pub(crate) fn spawn(store: Weak<SessionStore>, interval: Duration) -> ReaperHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(store) = store.upgrade() else {
                        break;
                    };
                    let evicted = store.evict_idle().await;
                    if evicted > 0 {
                        debug!(evicted = evicted, "Reaper pass evicted idle sessions");
                    }
                }
            }
        }

        debug!("Session reaper stopped");
    });

    ReaperHandle { cancel, join }
}
