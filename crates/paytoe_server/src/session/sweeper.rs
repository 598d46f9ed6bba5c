//! Background removal of expired sessions.

use super::locks::WalletLocks;
use super::store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, instrument};

/// Runs one sweep: expired sessions first, then idle wallet locks.
#[instrument(skip_all)]
pub async fn sweep_once(store: &dyn SessionStore, locks: &WalletLocks) -> usize {
    let removed = store.sweep_expired().await;
    let pruned = locks.prune();
    debug!(removed, pruned, "Sweep finished");
    removed
}

/// Spawns the periodic sweep. Abort the handle to stop it.
///
/// The first tick fires one full interval after spawning.
#[instrument(skip(store, locks))]
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    locks: WalletLocks,
    interval: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting session sweeper");
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(store.as_ref(), &locks).await;
        }
    })
}
