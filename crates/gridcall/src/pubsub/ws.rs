//! Channel membership held over a WebSocket to the relay server.

use super::{Channel, ChannelError, Delivery, PublishFrame, PublishOptions};
use crate::participant::Sender;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds the relay URL for joining `topic` as `sender`.
///
/// `http`/`https` bases are switched to `ws`/`wss`.
pub fn channel_url(relay_url: &str, topic: &str, sender: &Sender) -> Result<Url, ChannelError> {
    let mut url =
        Url::parse(relay_url).map_err(|e| ChannelError::Transport(format!("bad relay URL: {e}")))?;
    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|()| ChannelError::Transport(format!("cannot use {scheme} for {relay_url}")))?;
    }
    url.path_segments_mut()
        .map_err(|()| ChannelError::Transport(format!("relay URL cannot be a base: {relay_url}")))?
        .pop_if_empty()
        .extend(["channels", topic, "ws"]);
    url.query_pairs_mut()
        .append_pair("participant_id", &sender.id)
        .append_pair("name", &sender.name)
        .append_pair("role", sender.role.as_str());
    Ok(url)
}

/// A relay connection for one topic.
pub struct WsChannel {
    sender: Sender,
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WsChannel {
    /// Connects to the relay at `relay_url` and joins `topic`.
    #[instrument(skip(sender), fields(sender_id = %sender.id))]
    pub async fn connect(
        relay_url: &str,
        topic: &str,
        sender: Sender,
    ) -> Result<Self, ChannelError> {
        let url = channel_url(relay_url, topic, &sender)?;
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        info!(url = %url, "Connected to relay");
        let (sink, stream) = ws.split();
        Ok(Self {
            sender,
            sink,
            stream,
        })
    }

    /// Sends a close frame.
    pub async fn close(mut self) -> Result<(), ChannelError> {
        self.sink
            .close()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Channel for WsChannel {
    async fn publish(
        &mut self,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), ChannelError> {
        let frame = PublishFrame {
            payload,
            persist: options.persist,
        };
        let text = serde_json::to_string(&frame).map_err(|e| ChannelError::Encode(e.to_string()))?;
        self.sink
            .send(Message::text(text))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Delivery> {
        while let Some(msg_result) = self.stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<Delivery>(text.as_str()) {
                    Ok(delivery) => return Some(delivery),
                    Err(e) => warn!(error = %e, "Dropping unreadable relay frame"),
                },
                Ok(Message::Close(_)) => {
                    info!("Relay sent close frame");
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "Relay connection error");
                    return None;
                }
                Ok(other) => debug!(?other, "Ignoring non-text frame"),
            }
        }
        None
    }

    fn local(&self) -> &Sender {
        &self.sender
    }
}
