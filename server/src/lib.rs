//! # Greedy Pirates Server Library
//!
//! This library provides the authoritative server for Greedy Pirates, a
//! turn-based bidding game. Every round each player secretly bids against a
//! fixed pool of gold, the pool is divided in proportion to the bids, and after
//! the last round the player with the most gold wins.
//!
//! ## Core Responsibilities
//!
//! ### Hidden Bid Collection
//! Bids are collected simultaneously from every connected player. A bid is
//! acknowledged only to the player who made it; nobody sees another player's
//! amount until the round has closed and its results are broadcast.
//!
//! ### Exact Distribution
//! Each round pays out the whole pool, no more and no less. Rounding remainders
//! are assigned deterministically rather than dropped.
//!
//! ### Round Sequencing
//! Rounds close as soon as every player has bid or the bid deadline passes,
//! whichever comes first. A player who leaves mid-round is counted as bidding
//! 0 so the game never stalls on a missing connection.
//!
//! ## Module Organization
//!
//! ### Game Core (`ledger`, `distribution`, `round`, `session`)
//! Pure game logic with no I/O:
//! - `ledger`: cumulative gold per player and standings
//! - `distribution`: proportional split of the pool
//! - `round`: the per-round state machine and bid validation
//! - `session`: roster, round sequencing and winner determination
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, the pre-game lobby and outbound line queues.
//!
//! ### Network Module (`network`)
//! TCP listener, per-connection reader/writer tasks and the main loop that
//! owns the game session.
//!
//! ### Configuration (`config`) and Errors (`error`)
//! Command-line and JSON configuration, and the error types whose messages are
//! shown to players.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!
//!     // Runs the lobby, then the game, until every player has left
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! Each connection has its own reader and writer task, but the game session is
//! owned by a single main loop that handles one message at a time. Concurrent
//! bids are therefore applied one after another and never interleave.

pub mod client_manager;
pub mod config;
pub mod distribution;
pub mod error;
pub mod ledger;
pub mod network;
pub mod round;
pub mod session;

/// Identity of a connected client, and of the player it becomes after joining.
pub type PlayerId = u32;
