//! One participant's game session in a room.
//!
//! A session owns the participant's [`GameMachine`] and its channel
//! membership. All mutation happens on whichever task drives the session,
//! normally [`GameSession::run`]; the rest of the program observes state
//! through [`GameSession::subscribe`] and steers it with [`SessionCommand`]s.

use crate::notify::Notice;
use crate::participant::{Participant, ParticipantRole, Sender};
use crate::pubsub::{Channel, ChannelError, Delivery, PublishOptions};
use derive_more::{Display, From};
use gridcall_tictactoe::{GameMachine, GameMessage, GameState, Handled, MoveError, TurnPolicy};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Requests from whoever drives a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Play the local mark at a board index.
    Play(usize),
    /// Start a new game for everyone in the room.
    Reset,
    /// Leave the room.
    Leave,
}

/// Session failure.
#[derive(Debug, Display, From)]
pub enum SessionError {
    /// The move was rejected; nothing changed.
    #[display("move rejected: {_0}")]
    Move(MoveError),
    /// Publishing failed.
    #[display("channel failure: {_0}")]
    Channel(ChannelError),
    /// A message could not be encoded.
    #[display("encode failure: {_0}")]
    Encode(serde_json::Error),
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Move(e) => Some(e),
            SessionError::Channel(e) => Some(e),
            SessionError::Encode(e) => Some(e),
        }
    }
}

/// A participant playing in one room over one channel.
pub struct GameSession<C> {
    local: Participant,
    machine: GameMachine,
    channel: C,
    peers: HashMap<String, Sender>,
    state_tx: watch::Sender<GameState>,
    notice_tx: mpsc::UnboundedSender<Notice>,
    notice_rx: Option<mpsc::UnboundedReceiver<Notice>>,
}

impl<C: Channel> GameSession<C> {
    /// Creates a session with a fresh game.
    #[instrument(skip(channel), fields(participant = %local.id, mark = %local.mark))]
    pub fn new(local: Participant, channel: C, policy: TurnPolicy) -> Self {
        let machine = GameMachine::new(policy);
        let (state_tx, _) = watch::channel(machine.state().clone());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        info!("Session created");
        Self {
            local,
            machine,
            channel,
            peers: HashMap::new(),
            state_tx,
            notice_tx,
            notice_rx: Some(notice_rx),
        }
    }

    /// The local participant.
    pub fn participant(&self) -> &Participant {
        &self.local
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The underlying channel, for driving deliveries by hand.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Current game state.
    pub fn state(&self) -> &GameState {
        self.machine.state()
    }

    /// Receives every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state_tx.subscribe()
    }

    /// Hands out the notice stream. Only the first call gets it.
    pub fn take_notices(&mut self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notice_rx.take()
    }

    /// Participants seen on the channel, keyed by ID.
    pub fn peers(&self) -> &HashMap<String, Sender> {
        &self.peers
    }

    /// Whether an AI participant has shown up in the room.
    pub fn agent_present(&self) -> bool {
        self.peers
            .values()
            .any(|peer| peer.role == ParticipantRole::Agent)
    }

    fn notify(&self, notice: Notice) {
        debug!(%notice, "Notice");
        // Nobody listening is fine; notices are transient.
        let _ = self.notice_tx.send(notice);
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.machine.state().clone());
    }

    async fn publish(&mut self, message: &GameMessage) -> Result<(), SessionError> {
        let payload = message.encode()?;
        self.channel
            .publish(payload, PublishOptions::persistent())
            .await?;
        debug!(kind = message.kind(), "Message published");
        Ok(())
    }

    /// Plays the local mark at `position` and broadcasts the result.
    ///
    /// A rejected move leaves the state alone and raises a warning notice.
    #[instrument(skip(self), fields(participant = %self.local.id))]
    pub async fn play(&mut self, position: usize) -> Result<(), SessionError> {
        let outbound = match self.machine.apply_local_move(position, self.local.mark) {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!(error = %e, "Local move rejected");
                self.notify(Notice::warning(e.user_message()));
                return Err(e.into());
            }
        };
        self.publish_state();

        for message in &outbound {
            self.publish(message).await?;
        }
        if let Some(winner) = self.machine.state().winner() {
            info!(%winner, "Game won");
        }
        Ok(())
    }

    /// Starts a new game here and for every peer.
    #[instrument(skip(self), fields(participant = %self.local.id))]
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        let message = self.machine.reset_local();
        self.publish_state();
        self.publish(&message).await
    }

    /// Applies one inbound delivery.
    ///
    /// Payloads that do not decode, or carry a message type this version
    /// does not know, are dropped without telling the user.
    #[instrument(skip(self, delivery), fields(from = %delivery.sender.id))]
    pub fn handle_delivery(&mut self, delivery: Delivery) {
        if delivery.sender.id != self.local.id
            && !self.peers.contains_key(&delivery.sender.id)
        {
            info!(peer = %delivery.sender.name, role = ?delivery.sender.role, "Peer seen");
            if delivery.sender.role == ParticipantRole::Agent {
                self.notify(Notice::info(format!("{} is in the room", delivery.sender.name)));
            }
            self.peers
                .insert(delivery.sender.id.clone(), delivery.sender.clone());
        }

        let message = match GameMessage::decode(&delivery.payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Ignoring inbound payload");
                return;
            }
        };

        match self.machine.handle_message(&message) {
            Ok(Handled::Applied) => self.publish_state(),
            Ok(Handled::Skipped) => {}
            Err(e) => {
                warn!(error = %e, peer = %delivery.sender.id, "Peer move rejected");
                self.notify(Notice::warning(format!(
                    "Ignored move from {}: {}",
                    delivery.sender.name, e
                )));
            }
        }
    }

    /// Drives the session until `Leave`, until `commands` closes, or until
    /// the channel closes.
    ///
    /// Errors from individual commands are reported as notices; the loop
    /// keeps going.
    #[instrument(skip_all, fields(participant = %self.local.id))]
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> GameState {
        info!("Session running");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Play(position)) => match self.play(position).await {
                        // Already reported by `play`.
                        Ok(()) | Err(SessionError::Move(_)) => {}
                        Err(e) => self.notify(Notice::error(format!("Move not sent: {e}"))),
                    },
                    Some(SessionCommand::Reset) => {
                        if let Err(e) = self.reset().await {
                            self.notify(Notice::error(format!("Reset not sent: {e}")));
                        }
                    }
                    Some(SessionCommand::Leave) | None => {
                        info!("Leaving room");
                        break;
                    }
                },
                delivery = self.channel.recv() => match delivery {
                    Some(delivery) => self.handle_delivery(delivery),
                    None => {
                        warn!("Channel closed");
                        self.notify(Notice::error("Disconnected from room"));
                        break;
                    }
                },
            }
        }
        self.machine.state().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoticeLevel;
    use crate::pubsub::{ChannelHub, HubChannel};
    use gridcall_tictactoe::{GameStatus, Player, Square};
    use std::time::Duration;

    fn session(
        hub: &ChannelHub,
        name: &str,
        role: ParticipantRole,
        mark: Player,
    ) -> GameSession<HubChannel> {
        let local = Participant::new(format!("room_{name}"), name.to_string(), role, mark);
        let channel = hub.join("room", local.sender());
        GameSession::new(local, channel, TurnPolicy::Strict)
    }

    /// Feeds every delivery that arrives within a short window.
    async fn pump(session: &mut GameSession<HubChannel>) {
        while let Ok(Some(delivery)) =
            tokio::time::timeout(Duration::from_millis(100), session.channel.recv()).await
        {
            session.handle_delivery(delivery);
        }
    }

    #[tokio::test]
    async fn moves_reach_the_peer() {
        let hub = ChannelHub::default();
        let mut alice = session(&hub, "alice", ParticipantRole::Human, Player::X);
        let mut bob = session(&hub, "bob", ParticipantRole::Human, Player::O);
        let mut bob_state = bob.subscribe();

        alice.play(4).await.unwrap();
        pump(&mut bob).await;

        assert!(bob_state.has_changed().unwrap());
        let seen = bob_state.borrow_and_update().clone();
        assert_eq!(seen.board().get(4), Some(Square::Occupied(Player::X)));
        assert_eq!(seen, *alice.state());
        assert!(bob.peers().contains_key("room_alice"));
    }

    #[tokio::test]
    async fn winning_game_converges() {
        let hub = ChannelHub::default();
        let mut alice = session(&hub, "alice", ParticipantRole::Human, Player::X);
        let mut bob = session(&hub, "bob", ParticipantRole::Human, Player::O);

        for (who, pos) in [(0, 0), (1, 3), (0, 1), (1, 4), (0, 2)] {
            if who == 0 {
                alice.play(pos).await.unwrap();
                pump(&mut bob).await;
            } else {
                bob.play(pos).await.unwrap();
                pump(&mut alice).await;
            }
        }

        assert_eq!(alice.state().status(), GameStatus::Won(Player::X));
        assert_eq!(bob.state(), alice.state());
    }

    #[tokio::test]
    async fn reset_propagates() {
        let hub = ChannelHub::default();
        let mut alice = session(&hub, "alice", ParticipantRole::Human, Player::X);
        let mut bob = session(&hub, "bob", ParticipantRole::Human, Player::O);

        alice.play(0).await.unwrap();
        pump(&mut bob).await;
        bob.reset().await.unwrap();
        pump(&mut alice).await;

        assert_eq!(alice.state(), &GameState::new());
        assert_eq!(bob.state(), &GameState::new());
    }

    #[tokio::test]
    async fn rejected_local_move_warns_and_changes_nothing() {
        let hub = ChannelHub::default();
        let mut bob = session(&hub, "bob", ParticipantRole::Human, Player::O);
        let mut notices = bob.take_notices().unwrap();
        assert!(bob.take_notices().is_none());

        let err = bob.play(4).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Move(MoveError::WrongPlayer { .. })
        ));
        assert_eq!(bob.state(), &GameState::new());

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert_eq!(notice.text, "Not your turn!");
    }

    #[tokio::test]
    async fn local_move_after_game_over_warns() {
        let hub = ChannelHub::default();
        let mut alice = session(&hub, "alice", ParticipantRole::Human, Player::X);
        let mut notices = alice.take_notices().unwrap();
        let bob = Sender::new("room_bob".into(), "bob".into(), ParticipantRole::Human);

        let over = serde_json::json!({
            "type": "game_over",
            "winner": "O",
            "finalBoard": ["O", "O", "O", "X", "X", null, null, null, null],
        });
        alice.handle_delivery(Delivery {
            payload: over.to_string(),
            sender: bob,
        });
        assert_eq!(alice.state().winner(), Some(Player::O));
        let before = alice.state().clone();

        let err = alice.play(8).await.unwrap_err();
        assert!(matches!(err, SessionError::Move(MoveError::GameOver)));
        assert_eq!(alice.state(), &before);

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert_eq!(notice.text, "Game already finished!");
    }

    #[tokio::test]
    async fn players_with_the_same_name_still_converge() {
        let hub = ChannelHub::default();
        let mut first = session(&hub, "player", ParticipantRole::Human, Player::X);
        let mut second = session(&hub, "player", ParticipantRole::Human, Player::O);
        assert_eq!(first.participant().id, second.participant().id);

        first.play(4).await.unwrap();
        pump(&mut second).await;
        second.play(0).await.unwrap();
        pump(&mut first).await;

        assert_eq!(first.state().board().occupied(), 2);
        assert_eq!(first.state(), second.state());
        assert_eq!(first.state().current_player(), Player::X);
    }

    #[tokio::test]
    async fn garbage_and_unknown_payloads_are_ignored() {
        let hub = ChannelHub::default();
        let mut bob = session(&hub, "bob", ParticipantRole::Human, Player::O);
        let mut notices = bob.take_notices().unwrap();
        let noise = Sender::new("room_noise".into(), "Noise".into(), ParticipantRole::Human);

        for payload in ["not json", r#"{"type":"chat","text":"hi"}"#, r#"{"type":"move"}"#] {
            bob.handle_delivery(Delivery {
                payload: payload.to_string(),
                sender: noise.clone(),
            });
        }

        assert_eq!(bob.state(), &GameState::new());
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_peer_move_raises_warning() {
        let hub = ChannelHub::default();
        let mut bob = session(&hub, "bob", ParticipantRole::Human, Player::O);
        let mut notices = bob.take_notices().unwrap();
        let cheat = Sender::new("room_eve".into(), "Eve".into(), ParticipantRole::Human);

        bob.handle_delivery(Delivery {
            payload: r#"{"type":"move","position":12,"player":"X"}"#.into(),
            sender: cheat,
        });

        assert_eq!(bob.state(), &GameState::new());
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn agent_presence_follows_declared_role() {
        let hub = ChannelHub::default();
        let mut alice = session(&hub, "alice", ParticipantRole::Human, Player::X);
        let mut fan = session(&hub, "ai fan", ParticipantRole::Human, Player::O);

        fan.reset().await.unwrap();
        pump(&mut alice).await;
        assert!(!alice.agent_present());

        let mut agent = session(&hub, "ai", ParticipantRole::Agent, Player::O);
        agent.reset().await.unwrap();
        pump(&mut alice).await;
        assert!(alice.agent_present());
    }

    #[tokio::test]
    async fn late_joiner_catches_up_from_backlog() {
        let hub = ChannelHub::default();
        let mut alice = session(&hub, "alice", ParticipantRole::Human, Player::X);
        alice.play(0).await.unwrap();

        let mut bob = session(&hub, "bob", ParticipantRole::Human, Player::O);
        pump(&mut bob).await;
        assert_eq!(bob.state(), alice.state());
    }

    #[tokio::test]
    async fn run_stops_on_leave_and_returns_final_state() {
        let hub = ChannelHub::default();
        let alice = session(&hub, "alice", ParticipantRole::Human, Player::X);
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(alice.run(rx));

        tx.send(SessionCommand::Play(8)).await.unwrap();
        tx.send(SessionCommand::Leave).await.unwrap();
        let state = task.await.unwrap();
        assert_eq!(state.board().get(8), Some(Square::Occupied(Player::X)));
    }
}
