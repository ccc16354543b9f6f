//! The AI participant.
//!
//! An agent is an ordinary [`GameSession`] with role
//! [`ParticipantRole::Agent`] playing `O`, plus a driver task that watches the
//! session's state and submits a move whenever it is the agent's turn.
//! Agents started by an [`AgentRegistry`] leave by themselves once they have
//! been alone in their room for the configured time.

use crate::config::AgentConfig;
use crate::participant::{Participant, ParticipantRole, Sender, participant_id};
use crate::pubsub::{Channel, ChannelHub};
use crate::session::{GameSession, SessionCommand};
use derive_more::Display;
use gridcall_tictactoe::{GameState, Player, Position, TurnPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// The mark every agent plays.
pub const AGENT_MARK: Player = Player::O;

/// Chooses the agent's next square.
pub trait MoveStrategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Board index to play, or `None` when there is nothing to play.
    fn pick(&self, state: &GameState) -> Option<usize>;
}

/// Picks the first empty square in reading order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOpen;

impl MoveStrategy for FirstOpen {
    fn name(&self) -> &str {
        "first-open"
    }

    fn pick(&self, state: &GameState) -> Option<usize> {
        Position::valid_moves(state.board())
            .first()
            .map(|pos| pos.to_index())
    }
}

/// Agent failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AgentError {
    /// The room already has an agent.
    #[display("an agent is already in room {_0}")]
    AlreadyPresent(String),
}

impl std::error::Error for AgentError {}

/// A running agent. Stops when dropped.
pub struct AgentHandle {
    room: String,
    participant: Participant,
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<GameState>,
    session: JoinHandle<GameState>,
    driver: JoinHandle<()>,
    generation: u64,
    reaper: Option<JoinHandle<()>>,
}

impl AgentHandle {
    /// Starts an agent on `channel`, playing as the channel's identity.
    #[instrument(skip(channel, config, strategy), fields(strategy = strategy.name()))]
    pub fn spawn<C>(
        room: &str,
        channel: C,
        config: &AgentConfig,
        policy: TurnPolicy,
        strategy: Arc<dyn MoveStrategy>,
    ) -> Self
    where
        C: Channel + 'static,
    {
        let local = channel.local().clone();
        let participant =
            Participant::new(local.id, local.name, ParticipantRole::Agent, AGENT_MARK);
        let mut session = GameSession::new(participant.clone(), channel, policy);
        // Nobody reads an agent's notices.
        drop(session.take_notices());

        let state = session.subscribe();
        let (commands, rx) = mpsc::channel(8);
        let session = tokio::spawn(session.run(rx));
        let driver = tokio::spawn(drive(
            strategy,
            Duration::from_millis(*config.think_ms()),
            state.clone(),
            commands.clone(),
        ));
        info!(room, agent = %participant.id, "Agent started");

        Self {
            room: room.to_string(),
            participant,
            commands,
            state,
            session,
            driver,
            generation: 0,
            reaper: None,
        }
    }

    /// Room the agent plays in.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// The agent's identity.
    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// The agent's current view of the game.
    pub fn state(&self) -> GameState {
        self.state.borrow().clone()
    }

    /// Leaves the room and returns the final state.
    #[instrument(skip(self), fields(room = %self.room))]
    pub async fn leave(mut self) -> GameState {
        self.driver.abort();
        // The session may already have stopped on its own.
        let _ = self.commands.send(SessionCommand::Leave).await;
        match (&mut self.session).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Agent session task failed");
                self.state()
            }
        }
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        self.driver.abort();
        self.session.abort();
        if let Some(reaper) = &self.reaper {
            reaper.abort();
        }
    }
}

/// Plays whenever the state says it is the agent's turn.
async fn drive(
    strategy: Arc<dyn MoveStrategy>,
    think: Duration,
    mut state: watch::Receiver<GameState>,
    commands: mpsc::Sender<SessionCommand>,
) {
    loop {
        let current = state.borrow_and_update().clone();
        if !current.is_game_over() && current.current_player() == AGENT_MARK {
            tokio::time::sleep(think).await;
            match state.has_changed() {
                // Something happened while thinking; look again.
                Ok(true) => continue,
                Ok(false) => {}
                Err(_) => break,
            }
            match strategy.pick(&current) {
                Some(position) => {
                    debug!(position, strategy = strategy.name(), "Agent plays");
                    if commands.send(SessionCommand::Play(position)).await.is_err() {
                        break;
                    }
                }
                None => debug!("No move available"),
            }
        }
        if state.changed().await.is_err() {
            break;
        }
    }
    debug!("Agent driver stopped");
}

/// Resolves `true` once the headcount has stayed at one or less for `grace`,
/// or `false` if the topic closes first.
async fn wait_until_alone(mut headcount: watch::Receiver<usize>, grace: Duration) -> bool {
    loop {
        while *headcount.borrow_and_update() > 1 {
            if headcount.changed().await.is_err() {
                return false;
            }
        }
        match tokio::time::timeout(grace, headcount.changed()).await {
            Err(_) => return true,
            Ok(Ok(())) => {}
            Ok(Err(_)) => return false,
        }
    }
}

/// Agents by room, at most one per room.
#[derive(Clone)]
pub struct AgentRegistry {
    hub: ChannelHub,
    config: AgentConfig,
    policy: TurnPolicy,
    strategy: Arc<dyn MoveStrategy>,
    agents: Arc<Mutex<HashMap<String, AgentHandle>>>,
    generations: Arc<AtomicU64>,
}

impl AgentRegistry {
    /// Creates an empty registry whose agents play [`FirstOpen`].
    pub fn new(hub: ChannelHub, config: AgentConfig, policy: TurnPolicy) -> Self {
        Self {
            hub,
            config,
            policy,
            strategy: Arc::new(FirstOpen),
            agents: Arc::default(),
            generations: Arc::default(),
        }
    }

    /// Uses `strategy` for agents started from now on.
    pub fn with_strategy(self, strategy: Arc<dyn MoveStrategy>) -> Self {
        Self { strategy, ..self }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AgentHandle>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity an agent uses in `room`.
    pub fn sender_for(&self, room: &str) -> Sender {
        let id = format!("{}#agent", participant_id(room, self.config.name()));
        Sender::new(id, self.config.name().clone(), ParticipantRole::Agent)
    }

    /// Starts an agent in `room`.
    ///
    /// # Errors
    ///
    /// [`AgentError::AlreadyPresent`] if the room has a live agent.
    #[instrument(skip(self))]
    pub fn join(&self, room: &str) -> Result<Participant, AgentError> {
        let mut agents = self.lock();
        if let Some(existing) = agents.get(room) {
            if !existing.session.is_finished() {
                warn!(room, "Agent already present");
                return Err(AgentError::AlreadyPresent(room.to_string()));
            }
            debug!(room, "Replacing stopped agent");
        }

        let channel = self.hub.join(room, self.sender_for(room));
        let headcount = self.hub.watch_headcount(room);
        let mut handle = AgentHandle::spawn(
            room,
            channel,
            &self.config,
            self.policy,
            Arc::clone(&self.strategy),
        );
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        handle.generation = generation;
        handle.reaper = headcount.map(|headcount| self.spawn_reaper(room, generation, headcount));
        let participant = handle.participant().clone();
        agents.insert(room.to_string(), handle);
        Ok(participant)
    }

    fn spawn_reaper(
        &self,
        room: &str,
        generation: u64,
        headcount: watch::Receiver<usize>,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        let room = room.to_string();
        let grace = Duration::from_millis(*self.config.alone_ms());
        tokio::spawn(async move {
            if wait_until_alone(headcount, grace).await {
                info!(room = %room, "Agent is alone; leaving");
                registry.retire(&room, generation).await;
            }
        })
    }

    /// Stops the agent in `room` if it is still the one started as
    /// `generation`.
    async fn retire(&self, room: &str, generation: u64) {
        let handle = {
            let mut agents = self.lock();
            let current = agents
                .get(room)
                .is_some_and(|handle| handle.generation == generation);
            if current { agents.remove(room) } else { None }
        };
        if let Some(handle) = handle {
            handle.leave().await;
        }
    }

    /// Removes the agent from `room`, returning its final state.
    #[instrument(skip(self))]
    pub async fn leave(&self, room: &str) -> Option<GameState> {
        let handle = self.lock().remove(room)?;
        let state = handle.leave().await;
        info!(room, "Agent left");
        Some(state)
    }

    /// The agent's view of the game in `room`.
    pub fn state(&self, room: &str) -> Option<GameState> {
        self.lock().get(room).map(AgentHandle::state)
    }

    /// Rooms with an agent.
    pub fn rooms(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}
