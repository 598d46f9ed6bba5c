//! Board positions for tic-tac-toe moves.

use crate::action::MoveError;
use crate::types::Board;
use tracing::instrument;

/// One of the nine squares, numbered row-major as clients send them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum Position {
    /// Square 0.
    TopLeft = 0,
    /// Square 1.
    TopCenter = 1,
    /// Square 2.
    TopRight = 2,
    /// Square 3.
    MiddleLeft = 3,
    /// Square 4.
    Center = 4,
    /// Square 5.
    MiddleRight = 5,
    /// Square 6.
    BottomLeft = 6,
    /// Square 7.
    BottomCenter = 7,
    /// Square 8.
    BottomRight = 8,
}

impl Position {
    /// All 9 positions.
    pub const ALL: [Position; 9] = [
        Position::TopLeft,
        Position::TopCenter,
        Position::TopRight,
        Position::MiddleLeft,
        Position::Center,
        Position::MiddleRight,
        Position::BottomLeft,
        Position::BottomCenter,
        Position::BottomRight,
    ];

    /// The four corner squares.
    pub const CORNERS: [Position; 4] = [
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
    ];

    /// Short human name used in logs.
    pub fn label(self) -> &'static str {
        const LABELS: [&str; 9] = [
            "top left",
            "top",
            "top right",
            "left",
            "center",
            "right",
            "bottom left",
            "bottom",
            "bottom right",
        ];
        LABELS[self.to_index()]
    }

    /// Row-major board index.
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Square at a board index, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Creates position from an untrusted signed index, as sent by clients.
    #[instrument]
    pub fn from_signed(index: i64) -> Option<Self> {
        usize::try_from(index).ok().and_then(Self::from_index)
    }

    /// Returns only the empty squares, in board order.
    #[instrument(skip(board))]
    pub fn valid_moves(board: &Board) -> Vec<Position> {
        <Position as strum::IntoEnumIterator>::iter()
            .filter(|pos| board.is_empty(*pos))
            .collect()
    }
}

impl TryFrom<i64> for Position {
    type Error = MoveError;

    fn try_from(index: i64) -> Result<Self, Self::Error> {
        Self::from_signed(index).ok_or(MoveError::OutOfRange(index))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.to_index())
    }
}
