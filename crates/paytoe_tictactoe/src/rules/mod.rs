//! Game rules for tic-tac-toe.
//!
//! Pure functions for evaluating a board. Rules are separated from board
//! storage so the session layer can compose them around its own state.

pub mod draw;
pub mod status;
pub mod win;

pub use draw::{is_draw, is_full};
pub use status::{apply_move, board_status, is_valid_move};
pub use win::{LINES, check_winner};
