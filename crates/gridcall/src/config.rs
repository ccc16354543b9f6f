//! Application configuration.
//!
//! Settings come from an optional TOML file; every field has a default so an
//! empty or missing file is valid. The access credential is never read from
//! the file, only from [`AUTH_TOKEN_ENV`].

use derive_getters::Getters;
use derive_more::{Display, Error};
use gridcall_tictactoe::TurnPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Environment variable holding the access credential.
pub const AUTH_TOKEN_ENV: &str = "GRIDCALL_AUTH_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Relay server bind address.
    server: ServerConfig,
    /// Pub/sub relay behaviour and location.
    relay: RelayConfig,
    /// Conferencing provider used for room allocation.
    provider: ProviderConfig,
    /// AI participant settings.
    agent: AgentConfig,
    /// Game rules.
    game: GameConfig,
    /// Access credential, from the environment.
    #[serde(skip)]
    auth_token: Option<String>,
}

/// `[server]` section.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    host: String,
    /// Port to bind.
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// `[relay]` section.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL clients use to reach the relay (`ws://` or `http://`).
    url: String,
    /// Persisted messages kept per topic for late joiners.
    retain_limit: usize,
    /// Deliver a participant's own messages back to it.
    echo_to_sender: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".to_string(),
            retain_limit: 256,
            echo_to_sender: false,
        }
    }
}

/// `[provider]` section.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the room-allocation API.
    api_base: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8000".to_string(),
        }
    }
}

/// `[agent]` section.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Endpoint that admits the AI participant into a room.
    endpoint: String,
    /// Display name of the AI participant.
    name: String,
    /// Pause before the agent answers a move, in milliseconds.
    think_ms: u64,
    /// How long the agent stays once it is the only member of its room,
    /// in milliseconds.
    alone_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/join-player".to_string(),
            name: "AI".to_string(),
            think_ms: 500,
            alone_ms: 30_000,
        }
    }
}

/// `[game]` section.
#[derive(Debug, Clone, Default, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// `strict` enforces alternating turns for every move, `permissive`
    /// accepts either mark.
    turn_policy: TurnPolicy,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        if config.relay.retain_limit == 0 {
            debug!("Retention disabled; persisted messages will not reach late joiners");
        }
        Ok(config)
    }

    /// Loads `path` if it exists, defaults otherwise, then reads the
    /// credential from the environment.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };
        Ok(config.with_env_token())
    }

    /// Takes the credential from [`AUTH_TOKEN_ENV`], if set and non-empty.
    pub fn with_env_token(self) -> Self {
        let token = std::env::var(AUTH_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty());
        if token.is_none() {
            debug!(var = AUTH_TOKEN_ENV, "No access credential in environment");
        }
        Self {
            auth_token: token,
            ..self
        }
    }

    /// Replaces the access credential.
    pub fn with_auth_token(self, token: Option<String>) -> Self {
        Self {
            auth_token: token,
            ..self
        }
    }

    /// Overrides the bind address.
    pub fn with_bind(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
