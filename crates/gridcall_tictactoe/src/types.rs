//! Core domain types for tic-tac-toe.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Player mark in the game.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter,
)]
pub enum Player {
    /// Player X (goes first).
    X,
    /// Player O (goes second).
    O,
}

impl Player {
    /// Returns the opponent player.
    pub fn opponent(self) -> Self {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }
}

/// A square on the tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Square {
    /// Empty square.
    Empty,
    /// Square occupied by a player.
    Occupied(Player),
}

impl Square {
    /// Returns the occupying player, if any.
    pub fn player(self) -> Option<Player> {
        match self {
            Square::Empty => None,
            Square::Occupied(player) => Some(player),
        }
    }
}

impl From<Option<Player>> for Square {
    fn from(cell: Option<Player>) -> Self {
        cell.map_or(Square::Empty, Square::Occupied)
    }
}

/// Cells as they travel on the wire: `null`, `"X"` or `"O"`.
pub type Cells = [Option<Player>; 9];

/// 3x3 tic-tac-toe board.
///
/// Serializes as a JSON array of nine cells (`null`, `"X"` or `"O"`) in
/// row-major order, which is the shape peers exchange in `game_over`
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Cells", into = "Cells")]
pub struct Board {
    squares: [Square; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            squares: [Square::Empty; 9],
        }
    }

    /// Builds a board from wire cells.
    pub fn from_cells(cells: Cells) -> Self {
        Self {
            squares: cells.map(Square::from),
        }
    }

    /// Returns the board as wire cells.
    pub fn cells(&self) -> Cells {
        self.squares.map(Square::player)
    }

    /// Gets the square at the given position (0-8).
    pub fn get(&self, pos: usize) -> Option<Square> {
        self.squares.get(pos).copied()
    }

    /// Marks an empty square. Rejects out-of-range and occupied positions.
    pub(crate) fn place(&mut self, pos: usize, player: Player) -> Result<(), crate::MoveError> {
        match self.squares.get_mut(pos) {
            None => Err(crate::MoveError::OutOfBounds(pos)),
            Some(Square::Occupied(_)) => Err(crate::MoveError::SquareOccupied(pos)),
            Some(square) => {
                *square = Square::Occupied(player);
                Ok(())
            }
        }
    }

    /// Checks if a square is empty. Out-of-range positions are never empty.
    pub fn is_empty(&self, pos: usize) -> bool {
        matches!(self.get(pos), Some(Square::Empty))
    }

    /// Returns all squares as a slice.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Number of occupied squares.
    pub fn occupied(&self) -> usize {
        self.squares.iter().filter(|s| **s != Square::Empty).count()
    }

    /// Formats the board as a human-readable string.
    ///
    /// Empty squares show their 1-based number so a player can type it.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let pos = row * 3 + col;
                let symbol = match self.squares[pos] {
                    Square::Empty => (pos + 1).to_string(),
                    Square::Occupied(player) => player.to_string(),
                };
                result.push_str(&symbol);
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Cells> for Board {
    fn from(cells: Cells) -> Self {
        Self::from_cells(cells)
    }
}

impl From<Board> for Cells {
    fn from(board: Board) -> Self {
        board.cells()
    }
}

/// Current status of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    /// Game is ongoing.
    InProgress,
    /// Game ended in a win.
    Won(Player),
    /// Game ended in a draw.
    Draw,
}

/// Complete replicated game state.
///
/// Serializes as `{ board, currentPlayer, winner, isGameOver }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GameSnapshot", into = "GameSnapshot")]
pub struct GameState {
    board: Board,
    current_player: Player,
    status: GameStatus,
}

impl GameState {
    /// Creates the initial state: empty board, X to move.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            current_player: Player::X,
            status: GameStatus::InProgress,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the player whose turn it is.
    pub fn current_player(&self) -> Player {
        self.current_player
    }

    /// Returns the game status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Returns the winner, if the game was won.
    pub fn winner(&self) -> Option<Player> {
        match self.status {
            GameStatus::Won(player) => Some(player),
            _ => None,
        }
    }

    /// True once the game is won or drawn.
    pub fn is_game_over(&self) -> bool {
        self.status != GameStatus::InProgress
    }

    pub(crate) fn from_parts(board: Board, current_player: Player, status: GameStatus) -> Self {
        Self {
            board,
            current_player,
            status,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat JSON shape of [`GameState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Board cells.
    pub board: Board,
    /// Player to move.
    pub current_player: Player,
    /// Winner, if any.
    pub winner: Option<Player>,
    /// Whether the game has ended.
    pub is_game_over: bool,
}

/// A snapshot whose fields contradict each other.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SnapshotError {
    /// A winner was reported for a game that is not over.
    #[display("winner {_0} reported but game is not over")]
    WinnerWithoutGameOver(Player),
}

impl std::error::Error for SnapshotError {}

impl From<GameState> for GameSnapshot {
    fn from(state: GameState) -> Self {
        Self {
            winner: state.winner(),
            is_game_over: state.is_game_over(),
            current_player: state.current_player,
            board: state.board,
        }
    }
}

impl TryFrom<GameSnapshot> for GameState {
    type Error = SnapshotError;

    fn try_from(snapshot: GameSnapshot) -> Result<Self, Self::Error> {
        let status = match (snapshot.winner, snapshot.is_game_over) {
            (Some(player), true) => GameStatus::Won(player),
            (Some(player), false) => return Err(SnapshotError::WinnerWithoutGameOver(player)),
            // An adopted game_over may end the game on an open board.
            (None, true) => GameStatus::Draw,
            (None, false) => GameStatus::InProgress,
        };
        Ok(Self::from_parts(
            snapshot.board,
            snapshot.current_player,
            status,
        ))
    }
}
