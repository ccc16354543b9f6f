//! Pure tic-tac-toe logic for gridcall.
//!
//! # Architecture
//!
//! - **Board engine** ([`rules`]): move validation, win and draw detection
//! - **Messages** ([`GameMessage`]): the JSON protocol peers exchange
//! - **State machine** ([`GameMachine`]): one participant's replicated copy
//!   of the game, fed by local moves and inbound messages
//!
//! Nothing here performs I/O; transports live in the `gridcall` crate.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod machine;
mod message;
mod position;
pub mod rules;
mod types;

pub use error::MoveError;
pub use machine::{GameMachine, Handled, TurnPolicy, reduce};
pub use message::{DecodeError, GameMessage, KNOWN_TYPES};
pub use position::Position;
pub use types::{Board, Cells, GameSnapshot, GameState, GameStatus, Player, SnapshotError, Square};

/// Alias for clarity when talking about the symbol on the board.
pub type Mark = Player;
