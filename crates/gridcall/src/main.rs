//! gridcall - unified CLI
//!
//! Relay server, terminal player and room allocation.

#![warn(missing_docs)]

use anyhow::Result;
use clap::Parser;
use gridcall::cli::{Cli, Command};
use gridcall::terminal::{self, PlayOptions};
use gridcall::{AppConfig, relay};
use tracing::{info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => {
            initialize_tracing("info,gridcall=debug");
            let config = AppConfig::load(&config)?.with_bind(host, port);
            run_server(config).await
        }
        Command::Play {
            config,
            name,
            room,
            mark,
            invite_agent,
            relay,
        } => {
            initialize_tracing("warn");
            let config = AppConfig::load(&config)?;
            let options = PlayOptions {
                name,
                room,
                mark,
                invite_agent,
                relay,
            };
            terminal::run_play(config, options).await
        }
        Command::Room { config } => {
            initialize_tracing("warn");
            let config = AppConfig::load(&config)?;
            let room = terminal::create_room(&config).await?;
            println!("{room}");
            Ok(())
        }
    }
}

/// Run the relay server
#[instrument(skip(config))]
async fn run_server(config: AppConfig) -> Result<()> {
    info!(
        host = %config.server().host(),
        port = *config.server().port(),
        "Starting gridcall relay"
    );
    relay::serve(config).await
}

fn initialize_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
