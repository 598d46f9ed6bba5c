//! Core domain types for the pay-per-play board.

use crate::action::MoveError;
use crate::position::Position;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::instrument;

/// Which side owns a mark on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    /// The paying human player (rendered as `X`).
    Mine,
    /// The house opponent (rendered as `O`).
    Theirs,
}

impl Mark {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Mark::Mine => Mark::Theirs,
            Mark::Theirs => Mark::Mine,
        }
    }

    /// Wire and display symbol for this mark.
    pub fn symbol(self) -> &'static str {
        match self {
            Mark::Mine => "X",
            Mark::Theirs => "O",
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    /// Empty square.
    #[default]
    Empty,
    /// Square occupied by one side.
    Occupied(Mark),
}

impl Cell {
    /// The human player's mark.
    pub const MINE: Cell = Cell::Occupied(Mark::Mine);
    /// The opponent's mark.
    pub const THEIRS: Cell = Cell::Occupied(Mark::Theirs);

    /// Returns the mark in this square, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(mark) => Some(mark),
        }
    }
}

// Cells travel as "X", "O" or null so browser clients can render them directly.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.mark().map(Mark::symbol).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)?.as_deref() {
            None => Ok(Cell::Empty),
            Some("X") => Ok(Cell::MINE),
            Some("O") => Ok(Cell::THEIRS),
            Some(other) => Err(D::Error::custom(format!(
                "unknown cell value {other:?}, expected \"X\", \"O\" or null"
            ))),
        }
    }
}

/// 3x3 tic-tac-toe board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    /// Squares in row-major order (0-8).
    squares: [Cell; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            squares: [Cell::Empty; 9],
        }
    }

    /// Builds a board from raw squares in row-major order.
    pub fn from_squares(squares: [Cell; 9]) -> Self {
        Self { squares }
    }

    /// Gets the square at the given position.
    pub fn get(&self, pos: Position) -> Cell {
        self.squares[pos.to_index()]
    }

    /// Overwrites the square at the given position.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        self.squares[pos.to_index()] = cell;
    }

    /// Places a mark on an empty square.
    #[instrument(skip(self))]
    pub fn place(&mut self, pos: Position, mark: Mark) -> Result<(), MoveError> {
        if !self.is_empty(pos) {
            return Err(MoveError::SquareOccupied(pos));
        }
        self.set(pos, Cell::Occupied(mark));
        Ok(())
    }

    /// Checks if a square is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos) == Cell::Empty
    }

    /// Returns all squares as a slice.
    pub fn squares(&self) -> &[Cell; 9] {
        &self.squares
    }

    /// Counts the squares holding the given mark.
    pub fn count(&self, mark: Mark) -> usize {
        self.squares
            .iter()
            .filter(|cell| cell.mark() == Some(mark))
            .count()
    }

    /// Counts all occupied squares.
    pub fn marks_placed(&self) -> usize {
        self.squares.iter().filter(|cell| **cell != Cell::Empty).count()
    }
}

/// Lifecycle status of a paid game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Session paid for, nobody has moved yet.
    #[display("created")]
    Created,
    /// Game is ongoing.
    #[display("active")]
    Active,
    /// The human completed a line.
    #[display("player_wins")]
    PlayerWins,
    /// The opponent completed a line.
    #[display("ai_wins")]
    AiWins,
    /// Board filled with no line.
    #[display("draw")]
    Draw,
}

impl GameStatus {
    /// Whether the game can no longer accept moves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GameStatus::PlayerWins | GameStatus::AiWins | GameStatus::Draw
        )
    }
}
