//! Game rules for tic-tac-toe.
//!
//! This module contains pure functions for evaluating a board. Rules are
//! separated from board storage so the state machine and any peer can
//! evaluate the same board the same way.

pub mod draw;
pub mod moves;
pub mod win;

pub use draw::{is_draw, is_full};
pub use moves::{apply_move, is_valid_move};
pub use win::{LINES, compute_winner};
