//! Win detection logic for tic-tac-toe.

use super::super::{Board, Player, Square};
use tracing::instrument;

/// The eight winning lines, scanned in this order: rows, columns, diagonals.
pub const LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// Checks if there is a winner on the board.
///
/// Returns the mark of the first complete line found, `None` otherwise.
/// A board reached through legal play has at most one winning mark, so the
/// scan order only matters for hand-built boards.
#[instrument(skip(board))]
pub fn compute_winner(board: &Board) -> Option<Player> {
    let squares = board.squares();
    for [a, b, c] in LINES {
        let sq = squares[a];
        if sq != Square::Empty && sq == squares[b] && sq == squares[c] {
            return sq.player();
        }
    }

    None
}
