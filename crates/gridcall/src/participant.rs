//! Who takes part in a room.

use derive_new::new;
use gridcall_tictactoe::Mark;
use serde::{Deserialize, Serialize};

/// Unique identifier for a participant.
pub type ParticipantId = String;

/// Kind of participant, declared when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// A person at a client.
    #[default]
    Human,
    /// The AI player.
    Agent,
}

impl ParticipantRole {
    /// Lowercase name, as used in query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantRole::Human => "human",
            ParticipantRole::Agent => "agent",
        }
    }
}

/// Identity attached to every message a participant publishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, new)]
pub struct Sender {
    /// Participant ID.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Declared role.
    #[serde(default)]
    pub role: ParticipantRole,
}

/// The local participant of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Participant {
    /// Participant ID.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Declared role.
    pub role: ParticipantRole,
    /// Which mark this participant plays.
    pub mark: Mark,
}

impl Participant {
    /// Metadata other participants see on this participant's messages.
    pub fn sender(&self) -> Sender {
        Sender::new(self.id.clone(), self.name.clone(), self.role)
    }
}

/// Builds a participant ID from a room and display name.
pub fn participant_id(room: &str, name: &str) -> ParticipantId {
    format!("{}_{}", room, name.to_lowercase().replace(' ', "_"))
}
