//! Paid game sessions: records, storage, expiry and per-wallet locking.

mod clock;
mod locks;
mod model;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use locks::{WalletGuard, WalletLocks};
pub use model::{Session, SessionUpdate, normalize_wallet};
pub use store::{InMemorySessionStore, SessionStore};
pub use sweeper::{spawn_sweeper, sweep_once};
