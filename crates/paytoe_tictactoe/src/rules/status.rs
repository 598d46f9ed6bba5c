//! Board status and move validation.

use super::draw::is_full;
use super::win::check_winner;
use crate::action::MoveError;
use crate::position::Position;
use crate::types::{Board, GameStatus, Mark};
use tracing::instrument;

/// Evaluates the board: a completed line wins over a full board.
///
/// Never returns [`GameStatus::Created`]; that status only exists on
/// sessions nobody has moved in yet.
#[instrument(level = "trace")]
pub fn board_status(board: &Board) -> GameStatus {
    match check_winner(board) {
        Some(Mark::Mine) => GameStatus::PlayerWins,
        Some(Mark::Theirs) => GameStatus::AiWins,
        None if is_full(board) => GameStatus::Draw,
        None => GameStatus::Active,
    }
}

/// A move is valid when the index is 0-8 and the square is empty.
#[instrument(level = "trace")]
pub fn is_valid_move(board: &Board, pos: i64) -> bool {
    Position::from_signed(pos).is_some_and(|p| board.is_empty(p))
}

/// Places `mark` and returns the resulting status.
///
/// Refuses finished boards and occupied squares, leaving the board as it was.
#[instrument(level = "trace", skip(board))]
pub fn apply_move(board: &mut Board, pos: Position, mark: Mark) -> Result<GameStatus, MoveError> {
    if board_status(board).is_terminal() {
        return Err(MoveError::GameOver);
    }
    board.place(pos, mark)?;
    Ok(board_status(board))
}
