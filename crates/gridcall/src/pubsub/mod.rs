//! Room-scoped publish/subscribe.
//!
//! A [`Channel`] is one participant's membership in one topic. Anything
//! published is delivered to the other members together with the sender's
//! metadata; messages published with [`PublishOptions::persist`] are also
//! replayed to members who join later. Ordering and delivery guarantees are
//! those of the underlying transport.

mod hub;
mod ws;

pub use hub::{ChannelHub, HubChannel, HubOptions};
pub use ws::{WsChannel, channel_url};

use crate::participant::Sender;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Options for a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Retain the message for participants who join later.
    #[serde(default)]
    pub persist: bool,
}

impl PublishOptions {
    /// Options with `persist` set.
    pub fn persistent() -> Self {
        Self { persist: true }
    }
}

/// A message as received by a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Raw payload, exactly as published.
    pub payload: String,
    /// Who published it.
    pub sender: Sender,
}

/// What a relay client sends: a payload plus publish options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishFrame {
    /// Raw payload.
    pub payload: String,
    /// Retain for late joiners.
    #[serde(default)]
    pub persist: bool,
}

/// Pub/sub failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ChannelError {
    /// The topic or connection is gone.
    #[display("channel closed")]
    Closed,
    /// The transport failed.
    #[display("transport error: {_0}")]
    Transport(String),
    /// A frame could not be serialized.
    #[display("encode error: {_0}")]
    Encode(String),
}

impl std::error::Error for ChannelError {}

/// One participant's membership in a topic.
#[async_trait::async_trait]
pub trait Channel: Send {
    /// Publishes `payload` to the topic.
    async fn publish(&mut self, payload: String, options: PublishOptions)
    -> Result<(), ChannelError>;

    /// Waits for the next delivery; `None` once the channel is closed.
    async fn recv(&mut self) -> Option<Delivery>;

    /// The identity this channel publishes as.
    fn local(&self) -> &Sender;
}
