//! Tests for the board engine's public surface.

use paytoe_tictactoe::{
    Board, Cell, GameStatus, Mark, OpponentStrategy, Position, board_status, check_winner,
    is_full, is_valid_move, next_opponent_move,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn test_position_to_index() {
    assert_eq!(Position::TopLeft.to_index(), 0);
    assert_eq!(Position::Center.to_index(), 4);
    assert_eq!(Position::BottomRight.to_index(), 8);
}

#[test]
fn test_position_from_index() {
    assert_eq!(Position::from_index(0), Some(Position::TopLeft));
    assert_eq!(Position::from_index(4), Some(Position::Center));
    assert_eq!(Position::from_index(8), Some(Position::BottomRight));
    assert_eq!(Position::from_index(9), None);
    assert_eq!(Position::from_signed(-3), None);
}

#[test]
fn test_valid_moves_filters_occupied() {
    let mut board = Board::new();
    board.place(Position::TopLeft, Mark::Mine).unwrap();
    board.place(Position::Center, Mark::Theirs).unwrap();

    let valid = Position::valid_moves(&board);
    assert_eq!(valid.len(), 7);
    assert!(!valid.contains(&Position::TopLeft));
    assert!(!valid.contains(&Position::Center));
    assert!(valid.contains(&Position::BottomRight));
}

/// Walks every reachable game from the empty board with alternating marks.
fn for_each_reachable(board: &Board, to_move: Mark, visit: &mut dyn FnMut(&Board)) {
    visit(board);
    if board_status(board) != GameStatus::Active {
        return;
    }
    for pos in Position::valid_moves(board) {
        let mut next = board.clone();
        next.set(pos, Cell::Occupied(to_move));
        for_each_reachable(&next, to_move.opponent(), visit);
    }
}

#[test]
fn test_draw_only_when_full_without_winner() {
    let mut boards = 0usize;
    for_each_reachable(&Board::new(), Mark::Mine, &mut |board| {
        boards += 1;
        let status = board_status(board);
        if status == GameStatus::Draw {
            assert!(check_winner(board).is_none());
            assert!(is_full(board));
        }
        if board.marks_placed() < 3 {
            assert_eq!(check_winner(board), None);
        }
        if status.is_terminal() {
            assert!(check_winner(board).is_some() || is_full(board));
        }
    });
    assert!(boards > 5000);
}

#[test]
fn test_occupied_and_out_of_range_moves_invalid() {
    let mut board = Board::new();
    board.place(Position::TopRight, Mark::Theirs).unwrap();
    assert!(!is_valid_move(&board, 2));
    assert!(!is_valid_move(&board, 9));
    assert!(!is_valid_move(&board, -1));
    assert!(is_valid_move(&board, 3));
}

#[test]
fn test_greedy_reply_after_center_never_loses_line() {
    // Human opens center, opponent replies; human then threatens a line.
    // The greedy branch must block it.
    let mut rng = StdRng::seed_from_u64(42);
    let strategy = OpponentStrategy::optimal();

    let mut board = Board::new();
    board.place(Position::Center, Mark::Mine).unwrap();
    let reply = strategy.next_move(&board, &mut rng).unwrap();
    assert!(Position::CORNERS.contains(&reply));
    board.place(reply, Mark::Theirs).unwrap();

    // Mirror of the reply corner through the center is the human's threat square.
    let threat = Position::from_index(8 - reply.to_index()).unwrap();
    let human = Position::valid_moves(&board)
        .into_iter()
        .find(|pos| *pos != threat && Position::from_index(8 - pos.to_index()).is_some_and(|m| board.is_empty(m)))
        .unwrap();
    board.place(human, Mark::Mine).unwrap();
    let block = Position::from_index(8 - human.to_index()).unwrap();

    let answer = strategy.next_move(&board, &mut rng).unwrap();
    assert_eq!(answer, block);
}

#[test]
fn test_default_opponent_returns_empty_square() {
    let mut board = Board::new();
    board.place(Position::TopLeft, Mark::Mine).unwrap();
    for _ in 0..20 {
        let pos = next_opponent_move(&board).unwrap();
        assert!(board.is_empty(pos));
    }
}
