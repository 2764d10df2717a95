//! Server network layer handling TCP connections and round coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::GameError;
use crate::session::{GameSession, Player, SessionEvent, SessionPhase};
use crate::PlayerId;
use log::{debug, error, info, warn};
use shared::{Command, ResultRow, ServerLine, StandingRow};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected { client_id: PlayerId },
    LineReceived { client_id: PlayerId, line: String },
    ClientDisconnected { client_id: PlayerId },
    Shutdown,
}

/// Asks a running server to stop from another task
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server coordinating connections and the game session
///
/// The session lives only in the main loop, so every bid is applied one
/// message at a time no matter how many connections are sending.
pub struct Server {
    listener: Arc<TcpListener>,
    clients: Arc<RwLock<ClientManager>>,
    config: ServerConfig,
    session: Option<GameSession>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let address = config.address();
        let listener = Arc::new(TcpListener::bind(&address).await?);
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: Arc::new(RwLock::new(ClientManager::new(config.game.max_players))),
            config,
            session: None,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that accepts connections and registers them
    fn spawn_acceptor(&self) {
        let listener = Arc::clone(&self.listener);
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let (line_tx, line_rx) = mpsc::unbounded_channel();
                        let client_id = {
                            let mut clients_guard = clients.write().await;
                            clients_guard.add_client(addr, line_tx)
                        };

                        Self::spawn_connection(stream, client_id, line_rx, server_tx.clone());

                        if server_tx
                            .send(ServerMessage::ClientConnected { client_id })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the reader and writer tasks for one connection
    fn spawn_connection(
        stream: TcpStream,
        client_id: PlayerId,
        mut line_rx: mpsc::UnboundedReceiver<String>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let (read_half, mut write_half) = stream.into_split();

        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                let mut data = line.into_bytes();
                data.push(b'\n');
                if let Err(e) = write_half.write_all(&data).await {
                    debug!("Failed to write to client {}: {}", client_id, e);
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if server_tx
                            .send(ServerMessage::LineReceived { client_id, line })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Error reading from client {}: {}", client_id, e);
                        break;
                    }
                }
            }
            let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
        });
    }

    async fn reply(&self, client_id: PlayerId, line: ServerLine) {
        let clients = self.clients.read().await;
        clients.send_to(client_id, &line);
    }

    async fn broadcast(&self, line: ServerLine) {
        let clients = self.clients.read().await;
        clients.broadcast(&line);
    }

    /// Processes one message from a connection task
    async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ClientConnected { client_id } => {
                self.reply(client_id, ServerLine::Welcome { client_id }).await;
            }
            ServerMessage::LineReceived { client_id, line } => {
                self.handle_line(client_id, &line).await;
            }
            ServerMessage::ClientDisconnected { client_id } => {
                self.disconnect(client_id).await;
            }
            ServerMessage::Shutdown => {}
        }
    }

    async fn handle_line(&mut self, client_id: PlayerId, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                debug!("Client {} sent bad command: {}", client_id, e);
                self.reply(client_id, ServerLine::Error(e.to_string())).await;
                return;
            }
        };

        match command {
            Command::Join { name } => self.handle_join(client_id, &name).await,
            Command::Bid { amount } => self.handle_bid(client_id, amount).await,
            Command::Status => self.handle_status(client_id).await,
            Command::Help => self.reply(client_id, ServerLine::Help).await,
            Command::Quit => {
                self.reply(client_id, ServerLine::Goodbye).await;
                self.disconnect(client_id).await;
            }
        }
    }

    async fn handle_join(&mut self, client_id: PlayerId, name: &str) {
        if self.session.is_some() {
            self.reply(client_id, ServerLine::Error(GameError::GameInProgress.to_string()))
                .await;
            return;
        }

        let needed = self.config.game.min_players;
        let joined = {
            let mut clients = self.clients.write().await;
            clients.join(client_id, name)
        };

        match joined {
            Ok(joined) => {
                let clients = self.clients.read().await;
                clients.send_to(
                    client_id,
                    &ServerLine::Joined {
                        name: name.to_string(),
                        joined,
                        needed,
                    },
                );
                clients.broadcast_except(
                    &ServerLine::PlayerJoined {
                        name: name.to_string(),
                        joined,
                        needed,
                    },
                    Some(client_id),
                );
            }
            Err(e) => {
                self.reply(client_id, ServerLine::Error(e.to_string())).await;
                return;
            }
        }

        self.try_start_game().await;
    }

    /// Starts the game once enough players have joined the lobby
    async fn try_start_game(&mut self) {
        if self.session.is_some() {
            return;
        }

        let roster: Vec<Player> = {
            let clients = self.clients.read().await;
            clients
                .roster()
                .into_iter()
                .map(|(id, name)| Player::new(id, name))
                .collect()
        };

        match GameSession::start(roster, self.config.game_settings()) {
            Ok(mut session) => match session.advance(Instant::now()) {
                Ok(events) => {
                    self.session = Some(session);
                    self.broadcast_events(&events).await;
                }
                Err(e) => error!("Failed to open first round: {}", e),
            },
            Err(GameError::InsufficientPlayers { required, actual }) => {
                debug!("Lobby has {}/{} players", actual, required);
            }
            Err(e) => error!("Failed to start game: {}", e),
        }
    }

    async fn handle_bid(&mut self, client_id: PlayerId, amount: i64) {
        let result = match self.session.as_mut() {
            Some(session) => session.submit_bid(client_id, amount),
            None => Err(GameError::GameNotStarted),
        };

        match result {
            Ok(amount) => {
                let round = self
                    .session
                    .as_ref()
                    .and_then(|s| s.current_round())
                    .map(|r| r.number())
                    .unwrap_or(0);
                let name = {
                    let clients = self.clients.read().await;
                    clients.name_of(client_id).unwrap_or("unknown").to_string()
                };
                info!("{} bid in round {}", name, round);
                debug!("Client {} bid {} in round {}", client_id, amount, round);
                self.reply(client_id, ServerLine::BidAccepted { round, amount })
                    .await;
            }
            Err(e) => {
                debug!("Rejected bid from client {}: {:?}", client_id, e);
                self.reply(client_id, ServerLine::Error(e.to_string())).await;
            }
        }

        self.advance_if_ready(Instant::now()).await;
    }

    async fn handle_status(&self, client_id: PlayerId) {
        let text = match &self.session {
            None => {
                let clients = self.clients.read().await;
                format!(
                    "waiting for players, {}/{} joined",
                    clients.joined_count(),
                    self.config.game.min_players
                )
            }
            Some(session) => describe_status(session, Instant::now()),
        };
        self.reply(client_id, ServerLine::Info(text)).await;
    }

    async fn disconnect(&mut self, client_id: PlayerId) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id)
        };
        let Some(client) = removed else {
            return;
        };
        let Some(name) = client.name else {
            return;
        };

        if let Some(session) = self.session.as_mut() {
            if session.phase() == SessionPhase::Ended || !session.player_left(client_id) {
                return;
            }
            info!("{} left mid-game, remaining bids count as 0", name);
        }
        self.broadcast(ServerLine::PlayerLeft { name }).await;

        let abandoned = self
            .session
            .as_ref()
            .is_some_and(|s| s.phase() != SessionPhase::Ended && s.active_players() == 0);
        if abandoned {
            warn!("Every player left, ending the game early");
            if let Some(session) = self.session.as_mut() {
                if let Err(e) = session.finalize() {
                    error!("Failed to end abandoned game: {}", e);
                }
            }
            return;
        }

        self.advance_if_ready(Instant::now()).await;
    }

    /// Closes the open round if every bid is in or its deadline passed
    async fn advance_if_ready(&mut self, now: Instant) {
        loop {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if !session.ready_to_close(now) {
                return;
            }
            match session.advance(now) {
                Ok(events) => self.broadcast_events(&events).await,
                Err(e) => {
                    error!("Failed to advance round: {}", e);
                    return;
                }
            }
        }
    }

    async fn broadcast_events(&self, events: &[SessionEvent]) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let clients = self.clients.read().await;
        for event in events {
            clients.broadcast(&event_line(session, event));
        }
    }

    fn is_finished(&self, clients: &ClientManager) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.phase() == SessionPhase::Ended)
            && clients.is_empty()
    }

    /// Main server loop: stops on shutdown, or once the game is over and
    /// every client has left
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        info!(
            "Server started, waiting for {} players",
            self.config.game.min_players
        );

        loop {
            let deadline = self.session.as_ref().and_then(|s| s.deadline());

            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            self.broadcast(ServerLine::Info("server shutting down".to_string())).await;
                            break;
                        }
                        Some(message) => self.handle_message(message).await,
                    }
                },

                _ = wait_until(deadline) => {
                    debug!("Bid deadline reached");
                    self.advance_if_ready(Instant::now()).await;
                },
            }

            let finished = {
                let clients = self.clients.read().await;
                self.is_finished(&clients)
            };
            if finished {
                info!("Game finished and all clients left");
                break;
            }
        }

        Ok(())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn player_name(session: &GameSession, player: PlayerId) -> String {
    session
        .name_of(player)
        .map(str::to_string)
        .unwrap_or_else(|| format!("client{}", player))
}

/// Renders a session event as the line broadcast to every client
pub fn event_line(session: &GameSession, event: &SessionEvent) -> ServerLine {
    match event {
        SessionEvent::RoundStarted {
            round,
            total_rounds,
            pool,
            timeout,
            ..
        } => ServerLine::RoundStarted {
            round: *round,
            total_rounds: *total_rounds,
            pool: *pool,
            timeout_secs: timeout.as_secs(),
        },
        SessionEvent::RoundClosed(result) => ServerLine::RoundResults {
            round: result.number,
            rows: result
                .entries
                .iter()
                .map(|entry| ResultRow {
                    name: player_name(session, entry.player),
                    bid: entry.bid,
                    payout: entry.payout,
                    total: entry.total,
                    defaulted: entry.defaulted,
                })
                .collect(),
        },
        SessionEvent::GameEnded(outcome) => ServerLine::GameOver {
            winners: outcome
                .winners
                .iter()
                .map(|player| player_name(session, *player))
                .collect(),
            top_total: outcome.top_total(),
            standings: outcome
                .standings
                .iter()
                .map(|standing| StandingRow {
                    name: player_name(session, standing.player),
                    total: standing.total,
                })
                .collect(),
        },
    }
}

/// One-line summary for the `status` command; reveals who bid, not amounts
pub fn describe_status(session: &GameSession, now: Instant) -> String {
    let status = session.status(now);
    let totals = status
        .standings
        .iter()
        .map(|s| format!("{} {}", player_name(session, s.player), s.total))
        .collect::<Vec<_>>()
        .join(", ");

    match status.phase {
        SessionPhase::Ready => format!("game starting; totals: {}", totals),
        SessionPhase::Ended => {
            let winners = session
                .outcome()
                .map(|outcome| {
                    outcome
                        .winners
                        .iter()
                        .map(|player| player_name(session, *player))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            format!(
                "game over after {} rounds, won by {}; totals: {}",
                session.history().len(),
                winners,
                totals
            )
        }
        SessionPhase::Playing => {
            let waiting: Vec<String> = status
                .has_bid
                .iter()
                .filter(|(_, has_bid)| !has_bid)
                .map(|(player, _)| player_name(session, *player))
                .collect();
            format!(
                "round {}/{}, {}s left, waiting on: {}; totals: {}",
                status.round,
                status.total_rounds,
                status.time_left.map(|d| d.as_secs()).unwrap_or(0),
                if waiting.is_empty() {
                    "nobody".to_string()
                } else {
                    waiting.join(", ")
                },
                totals
            )
        }
    }
}
