//! Move rejection reasons.

use super::Player;

/// Error that can occur when validating or applying a move.
///
/// Every rejection happens before the state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// The game has already been won or drawn.
    #[display("Game is already over")]
    GameOver,

    /// The position is not on the board.
    #[display("Position {} is out of bounds (must be 0-8)", _0)]
    OutOfBounds(usize),

    /// The square at the position is already occupied.
    #[display("Square {} is already occupied", _0)]
    SquareOccupied(usize),

    /// The move's mark is not the player to move.
    #[display("It's {expected}'s turn, not {got}'s")]
    WrongPlayer {
        /// Player whose turn it is.
        expected: Player,
        /// Player that attempted the move.
        got: Player,
    },
}

impl MoveError {
    /// Short text suitable for a transient notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            MoveError::GameOver => "Game already finished!",
            MoveError::WrongPlayer { .. } => "Not your turn!",
            MoveError::OutOfBounds(_) | MoveError::SquareOccupied(_) => "Invalid move!",
        }
    }
}

impl std::error::Error for MoveError {}
