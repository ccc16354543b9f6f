//! gridcall - tic-tac-toe played inside a video-call room
//!
//! Every participant keeps its own copy of the game and exchanges moves over
//! a room-scoped publish/subscribe channel.
//!
//! # Architecture
//!
//! - **Pub/sub** ([`pubsub`]): room topics, in-process or over a WebSocket relay
//! - **Session** ([`GameSession`]): one participant's game, driven by local
//!   commands and inbound channel messages
//! - **Agent** ([`AgentRegistry`]): the AI participant, one per room
//! - **Relay** ([`relay`]): axum server for rooms, channels and the agent
//! - **Clients** ([`RoomClient`], [`AgentInviter`]): REST calls to the relay
//!   or a hosted provider
//!
//! # Example
//!
//! ```no_run
//! use gridcall::{ChannelHub, GameSession, Participant, ParticipantRole};
//! use gridcall_tictactoe::{Player, TurnPolicy};
//!
//! # async fn example() -> Result<(), gridcall::SessionError> {
//! let hub = ChannelHub::default();
//! let ada = Participant::new("room1_ada".into(), "Ada".into(), ParticipantRole::Human, Player::X);
//! let channel = hub.join("room1", ada.sender());
//! let mut session = GameSession::new(ada, channel, TurnPolicy::Strict);
//! session.play(4).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod agent;
pub mod cli;
mod config;
mod notify;
mod participant;
pub mod pubsub;
pub mod relay;
mod rest_client;
mod session;
pub mod terminal;

// Crate-level exports - Configuration
pub use config::{
    AUTH_TOKEN_ENV, AgentConfig, AppConfig, ConfigError, GameConfig, ProviderConfig, RelayConfig,
    ServerConfig,
};

// Crate-level exports - Participants and notices
pub use notify::{Notice, NoticeLevel};
pub use participant::{Participant, ParticipantId, ParticipantRole, Sender, participant_id};

// Crate-level exports - Pub/sub
pub use pubsub::{
    Channel, ChannelError, ChannelHub, Delivery, HubOptions, PublishOptions, WsChannel,
};

// Crate-level exports - Sessions and the AI agent
pub use agent::{AGENT_MARK, AgentError, AgentHandle, AgentRegistry, FirstOpen, MoveStrategy};
pub use session::{GameSession, SessionCommand, SessionError};

// Crate-level exports - REST clients
pub use rest_client::{AgentInviter, JoinPlayerRequest, MessageResponse, RoomClient, RoomCreated};
