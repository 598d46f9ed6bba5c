//! Per-wallet critical sections.
//!
//! The store's own mutex makes each call atomic, but a move is a
//! read-decide-write sequence. Holding the wallet's guard across that
//! sequence keeps two concurrent moves from validating against the same
//! board. The guard is async so it can be held across facilitator calls.

use super::model::normalize_wallet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument, trace};

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Registry of one async mutex per wallet.
#[derive(Debug, Clone, Default)]
pub struct WalletLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Exclusive access to one wallet's session until dropped.
#[derive(Debug)]
pub struct WalletGuard {
    wallet: String,
    _guard: OwnedMutexGuard<()>,
}

impl WalletGuard {
    /// Normalized wallet this guard covers.
    pub fn wallet(&self) -> &str {
        &self.wallet
    }
}

impl WalletLocks {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for exclusive access to `wallet_address`.
    #[instrument(skip(self))]
    pub async fn acquire(&self, wallet_address: &str) -> WalletGuard {
        let wallet = normalize_wallet(wallet_address);
        let lock = {
            let mut map = self.map();
            Arc::clone(map.entry(wallet.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        trace!(wallet = %wallet, "Wallet lock acquired");
        WalletGuard {
            wallet,
            _guard: guard,
        }
    }

    /// Drops registry entries nobody holds or waits on.
    #[instrument(skip(self))]
    pub fn prune(&self) -> usize {
        let mut map = self.map();
        let before = map.len();
        // The map holds one reference; any other means a holder or waiter.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        let pruned = before - map.len();
        if pruned > 0 {
            debug!(pruned, remaining = map.len(), "Pruned idle wallet locks");
        }
        pruned
    }

    /// Number of registered wallets.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// Whether no wallet is registered.
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}
