//! Startup configuration: defaults, an optional JSON file, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::GameSettings;

/// Longest bid window a config may ask for, one day.
pub const MAX_BID_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Greedy Pirates game server", long_about = None)]
pub struct Args {
    /// Host or IP address to bind to
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Players needed before the first round starts
    #[arg(long)]
    pub min_players: Option<usize>,

    /// Largest roster the lobby accepts
    #[arg(long)]
    pub max_players: Option<usize>,

    /// Number of rounds in a game
    #[arg(short, long)]
    pub rounds: Option<u32>,

    /// Gold divided every round
    #[arg(long)]
    pub pool: Option<u64>,

    /// Seconds players have to bid before the round closes
    #[arg(short = 't', long)]
    pub bid_timeout: Option<u64>,

    /// JSON config file, overridden by any flag given here
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub host: String,
    pub port: u16,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host: shared::DEFAULT_HOST.to_string(),
            port: shared::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub rounds: u32,
    pub pool: u64,
    pub bid_timeout_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: shared::MIN_PLAYERS,
            max_players: shared::DEFAULT_MAX_PLAYERS,
            rounds: shared::DEFAULT_ROUNDS,
            pool: shared::DEFAULT_POOL,
            bid_timeout_secs: shared::DEFAULT_BID_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: NetworkSettings,
    pub game: GameConfig,
}

impl ServerConfig {
    /// Builds the effective configuration from parsed command-line arguments.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(min_players) = args.min_players {
            self.game.min_players = min_players;
        }
        if let Some(max_players) = args.max_players {
            self.game.max_players = max_players;
        }
        if let Some(rounds) = args.rounds {
            self.game.rounds = rounds;
        }
        if let Some(pool) = args.pool {
            self.game.pool = pool;
        }
        if let Some(bid_timeout) = args.bid_timeout {
            self.game.bid_timeout_secs = bid_timeout;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let game = &self.game;
        if game.min_players < shared::MIN_PLAYERS {
            return Err(ConfigError::Invalid(format!(
                "min_players must be at least {}",
                shared::MIN_PLAYERS
            )));
        }
        if game.max_players < game.min_players {
            return Err(ConfigError::Invalid(
                "max_players must not be below min_players".to_string(),
            ));
        }
        if game.rounds == 0 {
            return Err(ConfigError::Invalid("rounds must be positive".to_string()));
        }
        if game.pool == 0 {
            return Err(ConfigError::Invalid("pool must be positive".to_string()));
        }
        if game.bid_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "bid_timeout_secs must be positive".to_string(),
            ));
        }
        if game.bid_timeout_secs > MAX_BID_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "bid_timeout_secs must be at most {}",
                MAX_BID_TIMEOUT_SECS
            )));
        }
        // A single player could win every pool
        if game.pool.checked_mul(u64::from(game.rounds)).is_none() {
            return Err(ConfigError::Invalid(
                "pool times rounds must fit in a 64-bit total".to_string(),
            ));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            min_players: self.game.min_players,
            rounds: self.game.rounds,
            pool: self.game.pool,
            bid_timeout: Duration::from_secs(self.game.bid_timeout_secs),
        }
    }
}
