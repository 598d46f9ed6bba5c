//! Per-wallet session storage with expiry.

use super::clock::{Clock, SystemClock};
use super::model::{Session, SessionUpdate, normalize_wallet};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

/// Storage for game sessions keyed by lowercased wallet address.
///
/// Every method lowercases the address itself; callers may pass any case.
/// Deleting an absent key is a no-op, so lazy expiry on read and the
/// periodic sweep can race freely.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Inserts a fresh session, replacing any existing entry for the wallet.
    async fn create(&self, wallet_address: &str, player_first: bool) -> Session;

    /// Returns the session, deleting it first if it has expired.
    async fn get(&self, wallet_address: &str) -> Option<Session>;

    /// Merges `update` into a live entry. Absent or expired entries stay absent.
    async fn update(&self, wallet_address: &str, update: SessionUpdate) -> Option<Session>;

    /// Removes the entry if present.
    async fn delete(&self, wallet_address: &str);

    /// Removes every expired entry and returns how many went.
    async fn sweep_expired(&self) -> usize;

    /// Number of stored entries, expired or not.
    async fn len(&self) -> usize;
}

/// Process-local store. One mutex guards the whole map, so a sweep can
/// never interleave with the read-merge-write of an update.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    /// Store using the wall clock.
    #[instrument]
    pub fn new(ttl: std::time::Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Store using an injected clock.
    #[instrument(skip(clock))]
    pub fn with_clock(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        info!(ttl_secs = ttl.as_secs(), "Creating in-memory session store");
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up a key, evicting it if expired. Caller holds the map lock.
    fn live_entry<'a>(
        &self,
        sessions: &'a mut HashMap<String, Session>,
        key: &str,
    ) -> Option<&'a mut Session> {
        let now = self.clock.now();
        if sessions.get(key).is_some_and(|s| s.is_expired(now)) {
            sessions.remove(key);
            debug!(wallet = key, "Session expired on access");
            return None;
        }
        sessions.get_mut(key)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self))]
    async fn create(&self, wallet_address: &str, player_first: bool) -> Session {
        let session = Session::new(wallet_address, player_first, self.clock.now(), self.ttl);
        let replaced = self
            .sessions()
            .insert(session.wallet_address.clone(), session.clone());
        info!(
            wallet = %session.wallet_address,
            player_first,
            expires_at = %session.expires_at,
            replaced = replaced.is_some(),
            "Session created"
        );
        session
    }

    #[instrument(skip(self))]
    async fn get(&self, wallet_address: &str) -> Option<Session> {
        let key = normalize_wallet(wallet_address);
        let mut sessions = self.sessions();
        self.live_entry(&mut sessions, &key).map(|s| s.clone())
    }

    #[instrument(skip(self))]
    async fn update(&self, wallet_address: &str, update: SessionUpdate) -> Option<Session> {
        let key = normalize_wallet(wallet_address);
        let mut sessions = self.sessions();
        let session = self.live_entry(&mut sessions, &key)?;
        update.apply_to(session);
        debug!(wallet = %key, status = %session.status, "Session updated");
        Some(session.clone())
    }

    #[instrument(skip(self))]
    async fn delete(&self, wallet_address: &str) {
        let key = normalize_wallet(wallet_address);
        if self.sessions().remove(&key).is_some() {
            debug!(wallet = %key, "Session deleted");
        }
    }

    #[instrument(skip(self))]
    async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Swept expired sessions");
        }
        removed
    }

    async fn len(&self) -> usize {
        self.sessions().len()
    }
}
