//! Session records kept per paying wallet.

use chrono::{DateTime, Utc};
use derive_setters::Setters;
use paytoe_tictactoe::{Board, GameStatus};
use serde::Serialize;

/// Canonical store key for a wallet address.
///
/// Addresses arrive checksummed, lowercased, or padded with whitespace
/// depending on the client; all of them key the same session.
pub fn normalize_wallet(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// One paid game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Lowercased wallet address; the store key.
    pub wallet_address: String,
    /// When the payment created this session.
    pub created_at: DateTime<Utc>,
    /// After this instant the session no longer exists.
    pub expires_at: DateTime<Utc>,
    /// Current board.
    pub board: Board,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Whether the human moved first.
    pub player_first: bool,
}

impl Session {
    /// Fresh session with an empty board.
    pub fn new(
        wallet_address: &str,
        player_first: bool,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            wallet_address: normalize_wallet(wallet_address),
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            board: Board::new(),
            status: GameStatus::Created,
            player_first,
        }
    }

    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Neither finished nor expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && !self.is_expired(now)
    }
}

/// Partial update merged into a stored session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Setters)]
#[setters(strip_option)]
pub struct SessionUpdate {
    /// Replacement board.
    pub board: Option<Board>,
    /// Replacement status.
    pub status: Option<GameStatus>,
}

impl SessionUpdate {
    /// Merges the present fields into `session`.
    pub fn apply_to(self, session: &mut Session) {
        if let Some(board) = self.board {
            session.board = board;
        }
        if let Some(status) = self.status {
            session.status = status;
        }
    }
}
