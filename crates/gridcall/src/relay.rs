//! Relay server: room allocation, AI agent control and the pub/sub bridge.
//!
//! Clients join a topic over `GET /channels/{topic}/ws`; every socket is
//! bridged onto the in-process [`ChannelHub`], so the relay itself never
//! looks inside game messages. The AI agent runs in-process and joins the
//! hub directly.

use crate::agent::{AgentError, AgentRegistry};
use crate::config::AppConfig;
use crate::participant::{ParticipantRole, Sender};
use crate::pubsub::{Channel, ChannelHub, HubOptions, PublishFrame, PublishOptions};
use crate::rest_client::{JoinPlayerRequest, MessageResponse, RoomCreated};
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use derive_more::Display;
use futures::{SinkExt, StreamExt};
use gridcall_tictactoe::GameState;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    hub: ChannelHub,
    agents: AgentRegistry,
    auth_token: Option<Arc<str>>,
    rooms_created: Arc<AtomicU64>,
}

impl AppState {
    /// Builds the hub and agent registry described by `config`.
    pub fn new(config: &AppConfig) -> Self {
        let hub = ChannelHub::new(HubOptions {
            retain_limit: *config.relay().retain_limit(),
            echo_to_sender: *config.relay().echo_to_sender(),
        });
        let agents = AgentRegistry::new(
            hub.clone(),
            config.agent().clone(),
            *config.game().turn_policy(),
        );
        Self {
            hub,
            agents,
            auth_token: config.auth_token().as_deref().map(Arc::from),
            rooms_created: Arc::default(),
        }
    }

    /// The hub sockets are bridged onto.
    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    /// Running agents.
    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Passes when no credential is configured or `presented` matches it.
    fn authorize(&self, presented: Option<&str>) -> Result<(), RelayError> {
        let Some(expected) = self.auth_token.as_deref() else {
            return Ok(());
        };
        let presented = presented.map(|p| p.strip_prefix("Bearer ").unwrap_or(p).trim());
        if presented == Some(expected) {
            Ok(())
        } else {
            warn!("Rejected request with wrong or missing credential");
            Err(RelayError::Unauthorized)
        }
    }

    fn authorize_headers(&self, headers: &HeaderMap) -> Result<(), RelayError> {
        self.authorize(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))
    }

    fn next_room_id(&self) -> String {
        let n = self.rooms_created.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        format!("{}-{}", base36(nanos), base36(n))
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Handler failure, rendered as `{ "message": ... }` with a status code.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RelayError {
    /// Credential missing or wrong.
    #[display("unauthorized")]
    Unauthorized,
    /// The room already has an agent.
    #[display("{_0}")]
    Conflict(String),
    /// Nothing by that name.
    #[display("{_0}")]
    NotFound(String),
}

impl std::error::Error for RelayError {}

impl From<AgentError> for RelayError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::AlreadyPresent(_) => RelayError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::Conflict(_) => StatusCode::CONFLICT,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(MessageResponse::new(self.to_string()))).into_response()
    }
}

/// Query string of a channel socket.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinParams {
    /// Participant ID.
    pub participant_id: String,
    /// Display name.
    pub name: String,
    /// Declared role.
    #[serde(default)]
    pub role: ParticipantRole,
}

/// Builds the relay's routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v2/rooms", post(create_room))
        .route("/join-player", post(join_player))
        .route("/agents/{room}", get(agent_state).delete(remove_agent))
        .route("/channels/{topic}/members", get(members))
        .route("/channels/{topic}/ws", get(channel_socket))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(state)
}

/// Binds the configured address and serves until the process stops.
#[instrument(skip(config), fields(host = %config.server().host(), port = *config.server().port()))]
pub async fn serve(config: AppConfig) -> Result<()> {
    let addr = (config.server().host().as_str(), *config.server().port());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}:{}", addr.0, addr.1))?;
    serve_on(listener, config).await
}

/// Serves on an already bound listener.
pub async fn serve_on(listener: TcpListener, config: AppConfig) -> Result<()> {
    let local = listener.local_addr().context("Listener has no local address")?;
    let state = AppState::new(&config);
    if state.auth_token.is_none() {
        warn!("No access credential configured; every request is accepted");
    }
    info!(address = %local, "Relay ready");
    axum::serve(listener, router(state))
        .await
        .context("Relay server stopped")
}

async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("ok"))
}

#[instrument(skip_all)]
async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RoomCreated>, RelayError> {
    state.authorize_headers(&headers)?;
    let room_id = state.next_room_id();
    info!(room_id = %room_id, "Room allocated");
    Ok(Json(RoomCreated { room_id }))
}

#[instrument(skip_all)]
async fn join_player(
    State(state): State<AppState>,
    Json(req): Json<JoinPlayerRequest>,
) -> Result<Json<MessageResponse>, RelayError> {
    state.authorize(Some(&req.token))?;
    let agent = state.agents.join(&req.meeting_id)?;
    info!(room = %req.meeting_id, agent = %agent.id, "AI agent joined");
    Ok(Json(MessageResponse::new("AI agent joined")))
}

async fn agent_state(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<GameState>, RelayError> {
    state
        .agents
        .state(&room)
        .map(Json)
        .ok_or_else(|| RelayError::NotFound(format!("no agent in room {room}")))
}

#[instrument(skip_all)]
async fn remove_agent(
    State(state): State<AppState>,
    Path(room): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, RelayError> {
    state.authorize_headers(&headers)?;
    match state.agents.leave(&room).await {
        Some(_) => {
            info!(room = %room, "AI agent removed");
            Ok(Json(MessageResponse::new("AI agent left")))
        }
        None => Err(RelayError::NotFound(format!("no agent in room {room}"))),
    }
}

async fn members(State(state): State<AppState>, Path(topic): Path<String>) -> Json<Vec<Sender>> {
    Json(state.hub.members(&topic))
}

async fn channel_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(params): Query<JoinParams>,
) -> Response {
    debug!(topic = %topic, participant = %params.participant_id, "Socket upgrade requested");
    let sender = Sender::new(params.participant_id, params.name, params.role);
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| bridge(socket, hub, topic, sender))
}

/// Pumps frames between one socket and its hub membership until either side
/// closes.
#[instrument(skip(socket, hub, sender), fields(participant = %sender.id))]
async fn bridge(socket: WebSocket, hub: ChannelHub, topic: String, sender: Sender) {
    let mut channel = hub.join(&topic, sender);
    let (mut sink, mut stream) = socket.split();
    info!("Socket joined topic");

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let frame = match serde_json::from_str::<PublishFrame>(text.as_str()) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "Dropping unreadable client frame");
                            continue;
                        }
                    };
                    let options = PublishOptions {
                        persist: frame.persist,
                    };
                    if let Err(e) = channel.publish(frame.payload, options).await {
                        warn!(error = %e, "Publish failed");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Socket error");
                    break;
                }
            },
            delivery = channel.recv() => {
                let Some(delivery) = delivery else { break };
                let text = match serde_json::to_string(&delivery) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode delivery");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            },
        }
    }
    info!("Socket left topic");
}
