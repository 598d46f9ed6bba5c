//! Start, read and move operations over paid sessions.

use crate::error::ApiError;
use crate::payment::PaidWallet;
use crate::session::{Session, SessionStore, SessionUpdate, WalletLocks, normalize_wallet};
use chrono::{DateTime, Utc};
use derive_new::new;
use paytoe_tictactoe::{
    Board, GameStatus, Mark, OpponentStrategy, Position, apply_move, board_status,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Response to a successful start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    /// Normalized wallet address.
    pub wallet_address: String,
    /// Current board.
    pub board: Board,
    /// Whether the human moves first.
    pub player_first: bool,
    /// Opening reply when the opponent went first.
    pub opponent_move: Option<usize>,
    /// Session status.
    pub status: GameStatus,
    /// Session expiry.
    pub expires_at: DateTime<Utc>,
    /// Whether an existing session was handed back instead of a new one.
    pub restored: bool,
}

/// Read-only view of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Normalized wallet address.
    pub wallet_address: String,
    /// Current board.
    pub board: Board,
    /// Session status.
    pub status: GameStatus,
    /// Whether the human moved first.
    pub player_first: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Session expiry.
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionSnapshot {
    fn from(session: Session) -> Self {
        Self {
            wallet_address: session.wallet_address,
            board: session.board,
            status: session.status,
            player_first: session.player_first,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

/// Body of a move request. Both fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Wallet whose session to play in.
    pub wallet_address: Option<String>,
    /// Square index 0-8.
    pub position: Option<i64>,
}

impl MoveRequest {
    /// Both fields, or a validation error naming what is missing.
    pub fn into_parts(self) -> Result<(String, i64), ApiError> {
        match (self.wallet_address, self.position) {
            (Some(wallet), Some(position)) if !wallet.trim().is_empty() => Ok((wallet, position)),
            _ => Err(ApiError::Validation(
                "Missing required fields: walletAddress, position".into(),
            )),
        }
    }
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    /// Board after the human move and any reply.
    pub board: Board,
    /// Opponent reply, if one was played.
    pub opponent_move: Option<usize>,
    /// Status after both moves.
    pub status: GameStatus,
}

/// Orchestrates the store, wallet locks and the opponent.
#[derive(Debug)]
pub struct GameService {
    store: Arc<dyn SessionStore>,
    locks: WalletLocks,
    opponent: OpponentStrategy,
    rng: Mutex<StdRng>,
}

impl GameService {
    /// Service with OS-seeded randomness.
    #[instrument(skip(store, locks))]
    pub fn new(store: Arc<dyn SessionStore>, locks: WalletLocks, opponent: OpponentStrategy) -> Self {
        info!(
            optimal_probability = opponent.optimal_probability(),
            "Creating game service"
        );
        Self {
            store,
            locks,
            opponent,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Service with reproducible coin flips and opponent moves.
    pub fn with_seed(
        store: Arc<dyn SessionStore>,
        locks: WalletLocks,
        opponent: OpponentStrategy,
        seed: u64,
    ) -> Self {
        Self {
            store,
            locks,
            opponent,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Wallet lock registry shared with the payment gate and sweeper.
    pub fn locks(&self) -> &WalletLocks {
        &self.locks
    }

    fn coin_flip(&self) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_bool(0.5)
    }

    fn opponent_move(&self, board: &Board) -> Option<Position> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.opponent.next_move(board, &mut *rng)
    }

    /// Creates or restores the paid wallet's session.
    ///
    /// Runs under the wallet lock carried by `paid`.
    #[instrument(skip(self, paid), fields(wallet = %paid.address(), restoring = paid.is_restoring()))]
    pub async fn start(&self, paid: &PaidWallet) -> Result<StartResponse, ApiError> {
        let wallet = paid.address();

        let existing = self
            .store
            .get(wallet)
            .await
            .filter(|s| !s.status.is_terminal());
        if let Some(session) = existing {
            info!(status = %session.status, "Restoring session");
            return Ok(StartResponse {
                wallet_address: session.wallet_address,
                board: session.board,
                player_first: session.player_first,
                opponent_move: None,
                status: session.status,
                expires_at: session.expires_at,
                restored: true,
            });
        }

        if paid.is_restoring() {
            warn!("Session expired between payment check and start");
            return Err(ApiError::PaymentRequired(
                "Your session expired. Sign a new payment to start another game.".into(),
            ));
        }

        let player_first = self.coin_flip();
        let mut session = self.store.create(wallet, player_first).await;
        let mut opponent_move = None;

        if !player_first {
            let mut board = session.board.clone();
            if let Some(reply) = self.opponent_move(&board) {
                board.place(reply, Mark::Theirs)?;
                let status = board_status(&board);
                debug!(reply = %reply, status = %status, "Opponent opened");
                session = self
                    .store
                    .update(wallet, SessionUpdate::default().board(board).status(status))
                    .await
                    .ok_or_else(|| ApiError::Internal("Session vanished during creation".into()))?;
                opponent_move = Some(reply.to_index());
            }
        }

        info!(player_first, status = %session.status, "New game started");
        Ok(StartResponse {
            wallet_address: session.wallet_address,
            board: session.board,
            player_first: session.player_first,
            opponent_move,
            status: session.status,
            expires_at: session.expires_at,
            restored: false,
        })
    }

    /// Reads a live session.
    #[instrument(skip(self))]
    pub async fn get(&self, wallet_address: &str) -> Result<SessionSnapshot, ApiError> {
        self.store
            .get(wallet_address)
            .await
            .map(SessionSnapshot::from)
            .ok_or_else(|| ApiError::NotFound("No active session found for this wallet".into()))
    }

    /// Plays the human move and the opponent's reply.
    ///
    /// The wallet lock is held from the read through the write, so two
    /// concurrent moves never validate against the same board.
    #[instrument(skip(self))]
    pub async fn make_move(&self, wallet_address: &str, position: i64) -> Result<MoveResponse, ApiError> {
        let wallet = normalize_wallet(wallet_address);
        let _guard = self.locks.acquire(&wallet).await;

        let session = self.store.get(&wallet).await.ok_or_else(|| {
            ApiError::NotFound("Session not found or expired. Please start a new game.".into())
        })?;
        if session.status.is_terminal() {
            return Err(ApiError::GameOver);
        }
        let square = Position::try_from(position).inspect_err(|err| debug!(%err, "Rejected move"))?;

        // A first move leaves Created behind: the engine only reports live or finished boards.
        let mut board = session.board;
        let mut status = apply_move(&mut board, square, Mark::Mine)
            .inspect_err(|err| debug!(%err, "Rejected move"))?;

        let mut opponent_move = None;
        if status == GameStatus::Active
            && let Some(reply) = self.opponent_move(&board)
        {
            status = apply_move(&mut board, reply, Mark::Theirs)?;
            opponent_move = Some(reply.to_index());
        }

        let updated = self
            .store
            .update(&wallet, SessionUpdate::default().board(board).status(status))
            .await
            .ok_or_else(|| {
                ApiError::NotFound("Session not found or expired. Please start a new game.".into())
            })?;

        if status.is_terminal() {
            self.store.delete(&wallet).await;
            info!(status = %status, "Game finished, session closed");
        } else {
            debug!(square = %square, opponent_move = ?opponent_move, "Move applied");
        }

        Ok(MoveResponse::new(updated.board, opponent_move, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InMemorySessionStore, ManualClock};
    use paytoe_tictactoe::Cell;
    use std::time::Duration;

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    fn service(opponent: OpponentStrategy) -> (GameService, ManualClock) {
        let clock = ManualClock::default();
        let store = Arc::new(InMemorySessionStore::with_clock(
            Duration::from_secs(300),
            Arc::new(clock.clone()),
        ));
        (
            GameService::with_seed(store, WalletLocks::new(), opponent, 7),
            clock,
        )
    }

    async fn paid(service: &GameService, restoring: bool) -> PaidWallet {
        PaidWallet::new(service.locks().acquire(WALLET).await, restoring, None)
    }

    async fn seed_board(service: &GameService, board: Board, status: GameStatus) {
        service.store().create(WALLET, true).await;
        service
            .store()
            .update(WALLET, SessionUpdate::default().board(board).status(status))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_creates_non_terminal_session() {
        for seed in 0..20 {
            let store = Arc::new(InMemorySessionStore::new(Duration::from_secs(300)));
            let service =
                GameService::with_seed(store, WalletLocks::new(), OpponentStrategy::default(), seed);
            let paid = PaidWallet::new(service.locks().acquire(WALLET).await, false, None);
            let started = service.start(&paid).await.unwrap();

            assert!(!started.restored);
            assert!(!started.status.is_terminal());
            if started.player_first {
                assert_eq!(started.board.marks_placed(), 0);
                assert_eq!(started.status, GameStatus::Created);
                assert!(started.opponent_move.is_none());
            } else {
                assert_eq!(started.board.count(Mark::Theirs), 1);
                assert_eq!(started.board.count(Mark::Mine), 0);
                assert_eq!(started.status, GameStatus::Active);
                assert!(started.opponent_move.is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_second_start_restores_unchanged() {
        let (service, _clock) = service(OpponentStrategy::default());
        let first = {
            let paid = paid(&service, false).await;
            service.start(&paid).await.unwrap()
        };
        let paid = paid(&service, true).await;
        let second = service.start(&paid).await.unwrap();

        assert!(second.restored);
        assert_eq!(second.board, first.board);
        assert_eq!(second.expires_at, first.expires_at);
        assert!(second.opponent_move.is_none());
    }

    #[tokio::test]
    async fn test_restoring_vanished_session_requires_payment() {
        let (service, _clock) = service(OpponentStrategy::default());
        let paid = paid(&service, true).await;
        let err = service.start(&paid).await.unwrap_err();
        assert_eq!(err.kind(), "payment_required");
        assert_eq!(service.store().len().await, 0);
    }

    #[tokio::test]
    async fn test_move_validation() {
        let (service, _clock) = service(OpponentStrategy::default());
        assert_eq!(
            service.make_move(WALLET, 4).await.unwrap_err().kind(),
            "not_found"
        );

        let mut board = Board::new();
        board.set(Position::Center, Cell::THEIRS);
        seed_board(&service, board.clone(), GameStatus::Active).await;

        for bad in [4, -1, 9] {
            let err = service.make_move(WALLET, bad).await.unwrap_err();
            assert_eq!(err.kind(), "validation_error", "position {bad}");
        }
        assert_eq!(service.get(WALLET).await.unwrap().board, board);
    }

    #[tokio::test]
    async fn test_first_move_activates_and_gets_reply() {
        let (service, _clock) = service(OpponentStrategy::optimal());
        service.store().create(WALLET, true).await;

        let response = service.make_move(WALLET, 0).await.unwrap();
        assert_eq!(response.status, GameStatus::Active);
        assert_eq!(response.board.get(Position::TopLeft), Cell::MINE);
        // Greedy reply with no threats on the board takes the center.
        assert_eq!(response.opponent_move, Some(4));
        assert_eq!(service.get(WALLET).await.unwrap().status, GameStatus::Active);
    }

    #[tokio::test]
    async fn test_winning_move_deletes_session() {
        let (service, _clock) = service(OpponentStrategy::optimal());
        let board = Board::from_squares([
            Cell::MINE,
            Cell::MINE,
            Cell::Empty,
            Cell::THEIRS,
            Cell::THEIRS,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
        ]);
        seed_board(&service, board, GameStatus::Active).await;

        let response = service.make_move(WALLET, 2).await.unwrap();
        assert_eq!(response.status, GameStatus::PlayerWins);
        assert!(response.opponent_move.is_none());
        assert_eq!(
            service.get(WALLET).await.unwrap_err().kind(),
            "not_found"
        );
    }

    #[tokio::test]
    async fn test_opponent_win_deletes_session() {
        let (service, _clock) = service(OpponentStrategy::optimal());
        let board = Board::from_squares([
            Cell::MINE,
            Cell::Empty,
            Cell::Empty,
            Cell::THEIRS,
            Cell::THEIRS,
            Cell::Empty,
            Cell::MINE,
            Cell::Empty,
            Cell::Empty,
        ]);
        seed_board(&service, board, GameStatus::Active).await;

        let response = service.make_move(WALLET, 8).await.unwrap();
        assert_eq!(response.status, GameStatus::AiWins);
        assert_eq!(response.opponent_move, Some(5));
        assert!(service.store().get(WALLET).await.is_none());
    }

    #[tokio::test]
    async fn test_terminal_session_rejects_moves() {
        let (service, _clock) = service(OpponentStrategy::default());
        seed_board(&service, Board::new(), GameStatus::Draw).await;
        assert_eq!(service.make_move(WALLET, 0).await.unwrap_err(), ApiError::GameOver);

        // Stored status lags a finished board: the engine still refuses.
        let mut won = Board::new();
        for pos in [Position::TopLeft, Position::TopCenter, Position::TopRight] {
            won.set(pos, Cell::MINE);
        }
        seed_board(&service, won.clone(), GameStatus::Active).await;
        assert_eq!(service.make_move(WALLET, 4).await.unwrap_err(), ApiError::GameOver);
        assert_eq!(service.get(WALLET).await.unwrap().board, won);
    }

    #[tokio::test]
    async fn test_expired_session_is_not_found() {
        let (service, clock) = service(OpponentStrategy::default());
        service.store().create(WALLET, true).await;
        clock.advance(chrono::Duration::seconds(301));
        assert_eq!(service.get(WALLET).await.unwrap_err().kind(), "not_found");
        assert_eq!(service.make_move(WALLET, 0).await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_concurrent_moves_do_not_share_a_board() {
        let (service, _clock) = service(OpponentStrategy::random());
        let service = Arc::new(service);
        service.store().create(WALLET, true).await;

        let a = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.make_move(WALLET, 0).await }
        });
        let b = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.make_move(WALLET, 8).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        // Whatever the interleaving, every accepted move is on the final board.
        let accepted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert!(!accepted.is_empty());
        if let Some(session) = service.store().get(WALLET).await {
            let mine = session.board.count(Mark::Mine);
            assert_eq!(mine, accepted.len());
        }
    }

    #[test]
    fn test_move_request_requires_both_fields() {
        let missing = MoveRequest {
            wallet_address: Some(WALLET.into()),
            position: None,
        };
        assert_eq!(missing.into_parts().unwrap_err().kind(), "validation_error");
        let blank = MoveRequest {
            wallet_address: Some("  ".into()),
            position: Some(1),
        };
        assert!(blank.into_parts().is_err());
        let ok = MoveRequest {
            wallet_address: Some(WALLET.into()),
            position: Some(3),
        };
        assert_eq!(ok.into_parts().unwrap(), (WALLET.to_string(), 3));
    }
}
