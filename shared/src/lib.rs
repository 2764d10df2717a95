use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_POOL: u64 = 100;
pub const DEFAULT_ROUNDS: u32 = 10;
pub const MIN_PLAYERS: usize = 3;
pub const DEFAULT_MAX_PLAYERS: usize = 8;
pub const DEFAULT_BID_TIMEOUT_SECS: u64 = 30;
pub const MAX_NAME_LEN: usize = 24;

pub const HELP_LINES: [&str; 5] = [
    "join <name>   enter the game under a display name",
    "bid <amount>  submit a secret bid for the current round",
    "status        show the round, who has bid and running totals",
    "help          show this list",
    "quit          leave the game (remaining bids count as 0)",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing name")]
    MissingName,
    #[error("invalid name")]
    InvalidName,
    #[error("invalid amount")]
    InvalidAmount,
}

/// A command sent by a player, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join { name: String },
    Bid { amount: i64 },
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let keyword = parts.next().ok_or(ProtocolError::Empty)?.to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        match keyword.as_str() {
            "join" => {
                let name = match args.as_slice() {
                    [] => return Err(ProtocolError::MissingName),
                    [name] => *name,
                    _ => return Err(ProtocolError::InvalidName),
                };
                if !is_valid_name(name) {
                    return Err(ProtocolError::InvalidName);
                }
                Ok(Command::Join {
                    name: name.to_string(),
                })
            }
            "bid" => match args.as_slice() {
                [amount] => amount
                    .parse::<i64>()
                    .map(|amount| Command::Bid { amount })
                    .map_err(|_| ProtocolError::InvalidAmount),
                _ => Err(ProtocolError::InvalidAmount),
            },
            "status" if args.is_empty() => Ok(Command::Status),
            "help" if args.is_empty() => Ok(Command::Help),
            "quit" | "exit" if args.is_empty() => Ok(Command::Quit),
            _ => Err(ProtocolError::UnknownCommand(keyword)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Join { name } => write!(f, "join {}", name),
            Command::Bid { amount } => write!(f, "bid {}", amount),
            Command::Status => write!(f, "status"),
            Command::Help => write!(f, "help"),
            Command::Quit => write!(f, "quit"),
        }
    }
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// One player's line in a round result broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub name: String,
    pub bid: u64,
    pub payout: u64,
    pub total: u64,
    pub defaulted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingRow {
    pub name: String,
    pub total: u64,
}

/// Everything the server writes to a connection. Rendering may span lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    Welcome {
        client_id: u32,
    },
    Joined {
        name: String,
        joined: usize,
        needed: usize,
    },
    PlayerJoined {
        name: String,
        joined: usize,
        needed: usize,
    },
    PlayerLeft {
        name: String,
    },
    RoundStarted {
        round: u32,
        total_rounds: u32,
        pool: u64,
        timeout_secs: u64,
    },
    BidAccepted {
        round: u32,
        amount: u64,
    },
    RoundResults {
        round: u32,
        rows: Vec<ResultRow>,
    },
    GameOver {
        winners: Vec<String>,
        top_total: u64,
        standings: Vec<StandingRow>,
    },
    Help,
    Info(String),
    Error(String),
    Goodbye,
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerLine::Welcome { client_id } => write!(
                f,
                "welcome: connected as client {}, send `join <name>` to play",
                client_id
            ),
            ServerLine::Joined {
                name,
                joined,
                needed,
            } => write!(f, "ok: joined as {} ({}/{} players)", name, joined, needed),
            ServerLine::PlayerJoined {
                name,
                joined,
                needed,
            } => write!(f, "lobby: {} joined ({}/{} players)", name, joined, needed),
            ServerLine::PlayerLeft { name } => write!(f, "player: {} left the game", name),
            ServerLine::RoundStarted {
                round,
                total_rounds,
                pool,
                timeout_secs,
            } => write!(
                f,
                "round {}/{} started: pool {}, bids close in {}s",
                round, total_rounds, pool, timeout_secs
            ),
            ServerLine::BidAccepted { round, amount } => {
                write!(f, "ok: bid {} recorded for round {}", amount, round)
            }
            ServerLine::RoundResults { round, rows } => {
                write!(f, "round {} results:", round)?;
                for row in rows {
                    write!(
                        f,
                        "\n  {} bid {}{} payout {} total {}",
                        row.name,
                        row.bid,
                        if row.defaulted { " (no bid)" } else { "" },
                        row.payout,
                        row.total
                    )?;
                }
                Ok(())
            }
            ServerLine::GameOver {
                winners,
                top_total,
                standings,
            } => {
                match winners.as_slice() {
                    [winner] => write!(f, "game over: winner {} with {}", winner, top_total)?,
                    _ => write!(
                        f,
                        "game over: tie between {} with {}",
                        winners.join(", "),
                        top_total
                    )?,
                }
                for (place, row) in standings.iter().enumerate() {
                    write!(f, "\n  {}. {} {}", place + 1, row.name, row.total)?;
                }
                Ok(())
            }
            ServerLine::Help => {
                write!(f, "commands:")?;
                for line in HELP_LINES {
                    write!(f, "\n  {}", line)?;
                }
                Ok(())
            }
            ServerLine::Info(message) => write!(f, "info: {}", message),
            ServerLine::Error(reason) => write!(f, "error: {}", reason),
            ServerLine::Goodbye => write!(f, "goodbye"),
        }
    }
}
