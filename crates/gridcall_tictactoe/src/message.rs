//! Game messages exchanged on a room's channel.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```json
//! { "type": "move", "position": 4, "player": "X" }
//! { "type": "game_over", "winner": "X", "finalBoard": ["X","X","X",null,"O","O",null,null,null] }
//! { "type": "reset" }
//! ```
//!
//! Inbound payloads are untrusted: decoding only establishes shape, the
//! state machine still validates every move.

use super::{Board, Player};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A message on the game channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameMessage {
    /// A player placed a mark. Peers replay it.
    Move {
        /// Board index, 0-8.
        position: usize,
        /// Mark that was placed.
        player: Player,
    },
    /// The sender's authoritative terminal state.
    GameOver {
        /// Winning mark, `null` for a draw.
        winner: Option<Player>,
        /// Board at the end of the game.
        #[serde(rename = "finalBoard")]
        final_board: Board,
    },
    /// Start over from an empty board.
    Reset,
}

/// Values of the `type` field this crate understands.
pub const KNOWN_TYPES: [&str; 3] = ["move", "game_over", "reset"];

/// Why an inbound payload was not turned into a [`GameMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum DecodeError {
    /// Not JSON, no `type`, or fields of the wrong shape.
    #[display("malformed game message: {_0}")]
    Malformed(String),
    /// Well-formed, but a `type` this version does not handle.
    #[display("unknown game message type {_0:?}")]
    UnknownType(String),
}

impl std::error::Error for DecodeError {}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

impl GameMessage {
    /// Parses an inbound payload.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnknownType`] for a well-formed message of a type not in
    /// [`KNOWN_TYPES`], [`DecodeError::Malformed`] for everything else that
    /// does not parse. Callers ignore both.
    #[instrument(skip(payload), fields(len = payload.len()))]
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope =
            serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if !KNOWN_TYPES.contains(&envelope.kind.as_str()) {
            return Err(DecodeError::UnknownType(envelope.kind));
        }
        serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Serializes the message for publishing.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            GameMessage::Move { .. } => "move",
            GameMessage::GameOver { .. } => "game_over",
            GameMessage::Reset => "reset",
        }
    }
}
