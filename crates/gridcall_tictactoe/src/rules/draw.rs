//! Draw detection logic for tic-tac-toe.

use super::super::{Board, Player, Square};
use tracing::instrument;

/// Checks if the board is full (all squares occupied).
#[instrument(skip(board))]
pub fn is_full(board: &Board) -> bool {
    board.squares().iter().all(|s| *s != Square::Empty)
}

/// A draw is a full board with no winner.
///
/// `winner` is the result of [`compute_winner`](super::compute_winner) for
/// the same board.
#[instrument(skip(board))]
pub fn is_draw(board: &Board, winner: Option<Player>) -> bool {
    winner.is_none() && is_full(board)
}

#[cfg(test)]
mod tests {
    use super::super::win::compute_winner;
    use super::*;

    use crate::Player::{O, X};

    #[test]
    fn test_empty_board_not_full() {
        let board = Board::new();
        assert!(!is_full(&board));
        assert!(!is_draw(&board, None));
    }

    #[test]
    fn test_partial_board_not_full() {
        let mut cells = [None; 9];
        cells[4] = Some(X);
        assert!(!is_full(&Board::from_cells(cells)));
    }

    #[test]
    fn test_draw_detection() {
        // X O X / O X X / O X O
        let board = Board::from_cells([
            Some(X),
            Some(O),
            Some(X),
            Some(O),
            Some(X),
            Some(X),
            Some(O),
            Some(X),
            Some(O),
        ]);
        let winner = compute_winner(&board);
        assert_eq!(winner, None);
        assert!(is_draw(&board, winner));
    }

    #[test]
    fn test_full_board_with_winner_is_not_draw() {
        // X X X / O O X / X O O
        let board = Board::from_cells([
            Some(X),
            Some(X),
            Some(X),
            Some(O),
            Some(O),
            Some(X),
            Some(X),
            Some(O),
            Some(O),
        ]);
        let winner = compute_winner(&board);
        assert_eq!(winner, Some(X));
        assert!(is_full(&board));
        assert!(!is_draw(&board, winner));
    }
}
