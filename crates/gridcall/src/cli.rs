//! Command-line interface for gridcall.

use clap::{Parser, Subcommand};
use gridcall_tictactoe::Player;
use std::path::PathBuf;

/// gridcall - tic-tac-toe for video-call rooms
#[derive(Parser, Debug)]
#[command(name = "gridcall")]
#[command(about = "Tic-tac-toe played over a room's pub/sub channel", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server (rooms, channels, AI agent)
    Serve {
        /// Path to the config file
        #[arg(short, long, default_value = "gridcall.toml")]
        config: PathBuf,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Play in a room from the terminal
    Play {
        /// Path to the config file
        #[arg(short, long, default_value = "gridcall.toml")]
        config: PathBuf,

        /// Display name
        #[arg(long, default_value = "Player")]
        name: String,

        /// Join this room instead of creating one
        #[arg(long)]
        room: Option<String>,

        /// Mark to play (x or o)
        #[arg(long, default_value = "x", value_parser = parse_mark)]
        mark: Player,

        /// Invite the AI agent once connected
        #[arg(long)]
        invite_agent: bool,

        /// Relay URL (overrides config)
        #[arg(long)]
        relay: Option<String>,
    },

    /// Allocate a room and print its ID
    Room {
        /// Path to the config file
        #[arg(short, long, default_value = "gridcall.toml")]
        config: PathBuf,
    },
}

fn parse_mark(s: &str) -> Result<Player, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "x" => Ok(Player::X),
        "o" => Ok(Player::O),
        other => Err(format!("expected x or o, got {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_defaults() {
        let cli = Cli::parse_from(["gridcall", "play"]);
        match cli.command {
            Command::Play {
                name,
                room,
                mark,
                invite_agent,
                ..
            } => {
                assert_eq!(name, "Player");
                assert!(room.is_none());
                assert_eq!(mark, Player::X);
                assert!(!invite_agent);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn play_accepts_mark_and_room() {
        let cli = Cli::parse_from([
            "gridcall",
            "play",
            "--room",
            "abc",
            "--mark",
            "O",
            "--invite-agent",
        ]);
        match cli.command {
            Command::Play {
                mark,
                invite_agent,
                room,
                ..
            } => {
                assert_eq!(mark, Player::O);
                assert!(invite_agent);
                assert_eq!(room.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bad_mark_is_rejected() {
        assert!(Cli::try_parse_from(["gridcall", "play", "--mark", "z"]).is_err());
    }
}
