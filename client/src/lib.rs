//! # Greedy Pirates Client Library
//!
//! A terminal client for the Greedy Pirates bidding game. It joins the game
//! under a display name, forwards whatever the player types to the server and
//! prints every line the server sends back.
//!
//! ## Module Organization
//!
//! ### Console Module (`console`)
//! Maps typed input to protocol commands:
//! - Bare numbers become `bid <number>`
//! - Detection of `quit` and of the end-of-game broadcast
//!
//! ### Network Module (`network`)
//! Owns the TCP connection:
//! - Line-based sending and receiving
//! - The interactive loop racing stdin against server output
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("localhost:8888").await?;
//!     client.send_line("join redbeard").await?;
//!     client.send_line("bid 25").await?;
//!
//!     while let Some(line) = client.next_line().await? {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```

pub mod console;
pub mod network;
