//! Pure tic-tac-toe board engine for paytoe.
//!
//! Everything here is free of I/O: win and draw detection, move
//! validation, and the house opponent's move picker. The server crate
//! layers payment and session handling on top.
//!
//! ```
//! use paytoe_tictactoe::{Board, GameStatus, Mark, Position, board_status};
//!
//! let mut board = Board::new();
//! board.place(Position::Center, Mark::Mine).unwrap();
//! assert_eq!(board_status(&board), GameStatus::Active);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod opponent;
mod position;
pub mod rules;
mod types;

pub use action::MoveError;
pub use opponent::{DEFAULT_OPTIMAL_PROBABILITY, OpponentStrategy, next_opponent_move};
pub use position::Position;
pub use rules::{apply_move, board_status, check_winner, is_draw, is_full, is_valid_move};
pub use types::{Board, Cell, GameStatus, Mark};
