//! Move validation and application.

use super::super::{Board, MoveError, Player};
use tracing::instrument;

/// A move is valid when the position is on the board and the square is empty.
#[instrument(skip(board))]
pub fn is_valid_move(board: &Board, position: usize) -> bool {
    board.is_empty(position)
}

/// Returns a copy of `board` with `player` placed at `position`.
///
/// The input board is never modified.
///
/// # Errors
///
/// [`MoveError::OutOfBounds`] for positions above 8 and
/// [`MoveError::SquareOccupied`] for squares already taken.
#[instrument(skip(board))]
pub fn apply_move(board: &Board, position: usize, player: Player) -> Result<Board, MoveError> {
    let mut next = board.clone();
    next.place(position, player)?;
    Ok(next)
}
