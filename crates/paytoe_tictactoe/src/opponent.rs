//! The house opponent.
//!
//! Plays a greedy line most of the time and a uniformly random square the
//! rest, so a paying player can actually win.

use crate::position::Position;
use crate::rules::check_winner;
use crate::types::{Board, Cell, Mark};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, instrument};

/// Probability of taking the greedy branch when none is configured.
pub const DEFAULT_OPTIMAL_PROBABILITY: f64 = 0.7;

/// Weighted greedy/random move picker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpponentStrategy {
    optimal_probability: f64,
}

impl OpponentStrategy {
    /// Creates a strategy that plays greedily with the given probability.
    ///
    /// Values outside `[0, 1]` are clamped; NaN falls back to the default.
    pub fn new(optimal_probability: f64) -> Self {
        let optimal_probability = if optimal_probability.is_nan() {
            DEFAULT_OPTIMAL_PROBABILITY
        } else {
            optimal_probability.clamp(0.0, 1.0)
        };
        Self {
            optimal_probability,
        }
    }

    /// Always takes the greedy branch.
    pub fn optimal() -> Self {
        Self::new(1.0)
    }

    /// Never takes the greedy branch.
    pub fn random() -> Self {
        Self::new(0.0)
    }

    /// Probability of the greedy branch.
    pub fn optimal_probability(&self) -> f64 {
        self.optimal_probability
    }

    /// Picks the opponent's next square, or `None` on a full board.
    ///
    /// Greedy branch: win now, else block the human's win, else center,
    /// else a random open corner. Otherwise a random open square.
    #[instrument(skip(self, board, rng), fields(p = self.optimal_probability))]
    pub fn next_move<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Position> {
        let open = Position::valid_moves(board);
        if open.is_empty() {
            return None;
        }

        if rng.random_bool(self.optimal_probability)
            && let Some(pos) = greedy_move(board, rng)
        {
            debug!(position = %pos, "Opponent plays greedy move");
            return Some(pos);
        }

        let pos = open.choose(rng).copied();
        debug!(position = ?pos, "Opponent plays random move");
        pos
    }
}

impl Default for OpponentStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_OPTIMAL_PROBABILITY)
    }
}

/// Picks a move with the default strategy and the thread-local RNG.
pub fn next_opponent_move(board: &Board) -> Option<Position> {
    OpponentStrategy::default().next_move(board, &mut rand::rng())
}

fn greedy_move<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<Position> {
    completing_move(board, Mark::Theirs)
        .or_else(|| completing_move(board, Mark::Mine))
        .or_else(|| board.is_empty(Position::Center).then_some(Position::Center))
        .or_else(|| {
            let corners: Vec<Position> = Position::CORNERS
                .iter()
                .copied()
                .filter(|pos| board.is_empty(*pos))
                .collect();
            corners.choose(rng).copied()
        })
}

/// First empty square that would complete a line for `mark`.
fn completing_move(board: &Board, mark: Mark) -> Option<Position> {
    Position::valid_moves(board).into_iter().find(|&pos| {
        let mut trial = board.clone();
        trial.set(pos, Cell::Occupied(mark));
        check_winner(&trial) == Some(mark)
    })
}
