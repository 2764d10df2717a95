//! Errors raised by the game core and the lobby.
//!
//! The `Display` text of every variant is the reason sent back to the player
//! after `error: `, so it stays short and lowercase.

use thiserror::Error;

use crate::PlayerId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid amount")]
    InvalidBid { amount: i64 },
    #[error("already bid")]
    AlreadyBid { player: PlayerId, round: u32 },
    #[error("round closed")]
    RoundClosed { round: u32 },
    #[error("round not open")]
    RoundNotOpen { round: u32 },
    #[error("unknown player")]
    UnknownPlayer { player: PlayerId },
    #[error("payout for round {round} already recorded")]
    DuplicateRound { player: PlayerId, round: u32 },
    #[error("total overflow")]
    TotalOverflow { player: PlayerId },
    #[error("bid timeout too long")]
    DeadlineOverflow,
    #[error("need at least {required} players, have {actual}")]
    InsufficientPlayers { required: usize, actual: usize },
    #[error("duplicate player")]
    DuplicatePlayer { player: PlayerId },
    #[error("game not started")]
    GameNotStarted,
    #[error("game ended")]
    GameEnded,
    #[error("name taken")]
    NameTaken,
    #[error("already joined")]
    AlreadyJoined,
    #[error("game in progress")]
    GameInProgress,
    #[error("server full")]
    ServerFull,
}
