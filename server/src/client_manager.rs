//! Connection tracking and the pre-game lobby
//!
//! This module handles the server-side view of connected clients, including:
//! - Client id assignment and peer address tracking
//! - Display names and join order for players entering the lobby
//! - Per-client outbound line queues used for replies and broadcasts
//!
//! The client manager knows nothing about rounds or bids; it only decides who
//! is connected and who has joined, and delivers lines to them.

use crate::error::GameError;
use crate::PlayerId;
use log::{debug, info};
use shared::ServerLine;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A connected client and its outbound queue
///
/// Each client maintains:
/// - Connection metadata (ID, address)
/// - The display name and join position once `join` has succeeded
/// - A channel drained by the connection's writer task
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: PlayerId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Display name, set by a successful join
    pub name: Option<String>,
    /// Position in the lobby, lower joined earlier
    pub join_seq: Option<u64>,
    sender: mpsc::UnboundedSender<String>,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            addr,
            name: None,
            join_seq: None,
            sender,
        }
    }

    pub fn has_joined(&self) -> bool {
        self.name.is_some()
    }

    /// Queues a line for the writer task. Returns false once the writer is gone.
    pub fn send(&self, line: &ServerLine) -> bool {
        self.sender.send(line.to_string()).is_ok()
    }
}

/// Manages all connected clients and the lobby roster
///
/// Connections are unlimited, but at most `max_players` of them may join.
/// Joined clients form the roster handed to a new game in join order.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<PlayerId, Client>,
    /// Next available client ID for new connections
    next_client_id: PlayerId,
    next_join_seq: u64,
    /// Maximum number of joined players
    max_players: usize,
}

impl ClientManager {
    pub fn new(max_players: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            next_join_seq: 0,
            max_players,
        }
    }

    /// Registers a new connection and returns its id.
    pub fn add_client(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> PlayerId {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));
        client_id
    }

    /// Removes a client, returning it if it was still known.
    pub fn remove_client(&mut self, client_id: &PlayerId) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    /// Enters a client into the lobby under `name`; returns the joined count.
    pub fn join(&mut self, client_id: PlayerId, name: &str) -> Result<usize, GameError> {
        let already_joined = self
            .clients
            .get(&client_id)
            .ok_or(GameError::UnknownPlayer { player: client_id })?
            .has_joined();
        if already_joined {
            return Err(GameError::AlreadyJoined);
        }
        if self
            .clients
            .values()
            .any(|c| c.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
        {
            return Err(GameError::NameTaken);
        }
        if self.joined_count() >= self.max_players {
            return Err(GameError::ServerFull);
        }

        let seq = self.next_join_seq;
        self.next_join_seq += 1;
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.name = Some(name.to_string());
            client.join_seq = Some(seq);
        }
        info!("Client {} joined as {}", client_id, name);
        Ok(self.joined_count())
    }

    pub fn name_of(&self, client_id: PlayerId) -> Option<&str> {
        self.clients.get(&client_id)?.name.as_deref()
    }

    pub fn joined_count(&self) -> usize {
        self.clients.values().filter(|c| c.has_joined()).count()
    }

    /// Joined clients as (id, name), earliest join first.
    pub fn roster(&self) -> Vec<(PlayerId, String)> {
        let mut joined: Vec<&Client> = self.clients.values().filter(|c| c.has_joined()).collect();
        joined.sort_by_key(|c| c.join_seq);
        joined
            .into_iter()
            .filter_map(|c| c.name.clone().map(|name| (c.id, name)))
            .collect()
    }

    pub fn send_to(&self, client_id: PlayerId, line: &ServerLine) {
        if let Some(client) = self.clients.get(&client_id) {
            if !client.send(line) {
                debug!("Dropped line for client {}, writer closed", client_id);
            }
        }
    }

    pub fn broadcast(&self, line: &ServerLine) {
        self.broadcast_except(line, None);
    }

    pub fn broadcast_except(&self, line: &ServerLine, exclude: Option<PlayerId>) {
        for (client_id, client) in &self.clients {
            if Some(*client_id) == exclude {
                continue;
            }
            if !client.send(line) {
                debug!("Dropped broadcast for client {}, writer closed", client_id);
            }
        }
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
