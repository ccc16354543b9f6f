//! Line-oriented terminal client.
//!
//! Reads commands from stdin, forwards them to a running [`GameSession`] and
//! prints the board whenever the session's state changes.

use crate::config::AppConfig;
use crate::notify::Notice;
use crate::participant::{Participant, ParticipantRole, participant_id};
use crate::pubsub::WsChannel;
use crate::rest_client::{AgentInviter, RoomClient};
use crate::session::{GameSession, SessionCommand};
use anyhow::{Context, Result};
use gridcall_tictactoe::{GameState, GameStatus, Player, Position};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// What the user asked for on one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Play the square at this board index.
    Play(usize),
    /// Start a new game.
    Reset,
    /// Invite the AI agent.
    Invite,
    /// Show the command list.
    Help,
    /// Leave.
    Quit,
    /// Blank line.
    Nothing,
}

impl Input {
    /// Parses one line; `None` when the line means nothing.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "" => Some(Input::Nothing),
            "reset" | "r" => Some(Input::Reset),
            "invite" | "i" => Some(Input::Invite),
            "help" | "h" | "?" => Some(Input::Help),
            "quit" | "q" | "exit" => Some(Input::Quit),
            _ => Position::parse_input(line).map(|pos| Input::Play(pos.to_index())),
        }
    }
}

/// Settings for one terminal game.
#[derive(Debug, Clone)]
pub struct PlayOptions {
    /// Display name.
    pub name: String,
    /// Room to join; a new one is allocated when absent.
    pub room: Option<String>,
    /// Mark to play.
    pub mark: Player,
    /// Invite the AI agent after connecting.
    pub invite_agent: bool,
    /// Relay URL override.
    pub relay: Option<String>,
}

const HELP: &str = "Commands: 1-9 or a square name (e.g. center) to play, \
                    reset, invite, quit";

/// One-line summary of whose turn it is or how the game ended.
pub fn status_line(state: &GameState, mark: Player) -> String {
    match state.status() {
        GameStatus::Won(winner) if winner == mark => "You win!".to_string(),
        GameStatus::Won(winner) => format!("{winner} wins."),
        GameStatus::Draw => "Draw.".to_string(),
        GameStatus::InProgress if state.current_player() == mark => {
            format!("Your move ({mark}).")
        }
        GameStatus::InProgress => format!("Waiting for {}.", state.current_player()),
    }
}

fn print_state(state: &GameState, mark: Player) {
    println!("\n{}\n{}", state.board().display(), status_line(state, mark));
}

fn print_notice(notice: &Notice) {
    println!("{notice}");
}

async fn invite(config: &AppConfig, room: &str) -> Notice {
    let token = config.auth_token().clone().unwrap_or_default();
    match AgentInviter::new(config.agent().endpoint().clone())
        .invite(room, &token)
        .await
    {
        Ok(message) => Notice::success(message),
        Err(e) => {
            warn!(error = %e, "Invite failed");
            Notice::error(format!("Could not invite the AI: {e:#}"))
        }
    }
}

/// Allocates a room through the configured provider.
#[instrument(skip(config))]
pub async fn create_room(config: &AppConfig) -> Result<String> {
    RoomClient::new(
        config.provider().api_base().clone(),
        config.auth_token().clone(),
    )
    .create_room()
    .await
}

/// Plays one terminal game until the user quits or the relay goes away.
#[instrument(skip(config))]
pub async fn run_play(config: AppConfig, options: PlayOptions) -> Result<()> {
    let room = match options.room {
        Some(room) => room,
        None => create_room(&config).await.context("Failed to create a room")?,
    };
    println!("Room: {room}");

    let local = Participant::new(
        participant_id(&room, &options.name),
        options.name.clone(),
        ParticipantRole::Human,
        options.mark,
    );
    let relay = options
        .relay
        .unwrap_or_else(|| config.relay().url().clone());
    let channel = WsChannel::connect(&relay, &room, local.sender())
        .await
        .with_context(|| format!("Failed to connect to relay at {}", relay))?;
    info!(room = %room, "Joined room");

    let mut session = GameSession::new(local, channel, *config.game().turn_policy());
    let mut notices = session
        .take_notices()
        .context("Session notices already taken")?;
    let mut states = session.subscribe();
    let mark = options.mark;
    let (commands, rx) = mpsc::channel(16);
    let task = tokio::spawn(session.run(rx));

    if options.invite_agent {
        print_notice(&invite(&config, &room).await);
    }
    print_state(&states.borrow_and_update(), mark);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    debug!("Stdin closed");
                    break;
                };
                match Input::parse(&line) {
                    Some(Input::Play(position)) => {
                        if commands.send(SessionCommand::Play(position)).await.is_err() {
                            break;
                        }
                    }
                    Some(Input::Reset) => {
                        if commands.send(SessionCommand::Reset).await.is_err() {
                            break;
                        }
                    }
                    Some(Input::Invite) => print_notice(&invite(&config, &room).await),
                    Some(Input::Help) => println!("{HELP}"),
                    Some(Input::Quit) => break,
                    Some(Input::Nothing) => {}
                    None => {
                        let text = format!("Unknown command: {}", line.trim());
                        print_notice(&Notice::warning(text));
                    }
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                print_state(&states.borrow_and_update(), mark);
            }
            Some(notice) = notices.recv() => print_notice(&notice),
        }
    }

    // The session may have stopped already.
    let _ = commands.send(SessionCommand::Leave).await;
    let final_state = task.await.context("Session task failed")?;
    info!(status = ?final_state.status(), "Left room");
    Ok(())
}
