//! Round sequencing and winner determination for one game.
//!
//! `GameSession` is a plain value owned by whoever drives it (the network main
//! loop in the server binary). It never performs I/O: every state change is
//! reported back as a list of [`SessionEvent`]s for the caller to broadcast.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::info;

use crate::error::GameError;
use crate::ledger::{RoundLedger, Standing};
use crate::round::{RoundCoordinator, RoundResult, RoundStatus};
use crate::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    pub min_players: usize,
    pub rounds: u32,
    pub pool: u64,
    pub bid_timeout: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_players: shared::MIN_PLAYERS,
            rounds: shared::DEFAULT_ROUNDS,
            pool: shared::DEFAULT_POOL,
            bid_timeout: Duration::from_secs(shared::DEFAULT_BID_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Roster fixed, no round opened yet
    Ready,
    Playing,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    pub standings: Vec<Standing>,
    pub winners: Vec<PlayerId>,
}

impl GameOutcome {
    fn from_standings(standings: Vec<Standing>) -> Self {
        let top = standings.first().map(|s| s.total).unwrap_or(0);
        let winners = standings
            .iter()
            .take_while(|s| s.total == top)
            .map(|s| s.player)
            .collect();
        Self { standings, winners }
    }

    pub fn is_tie(&self) -> bool {
        self.winners.len() > 1
    }

    pub fn top_total(&self) -> u64 {
        self.standings.first().map(|s| s.total).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RoundStarted {
        round: u32,
        total_rounds: u32,
        pool: u64,
        deadline: Instant,
        timeout: Duration,
    },
    RoundClosed(RoundResult),
    GameEnded(GameOutcome),
}

/// Snapshot for the `status` command. Shows who has bid, never how much.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub round: u32,
    pub total_rounds: u32,
    pub time_left: Option<Duration>,
    pub has_bid: Vec<(PlayerId, bool)>,
    pub standings: Vec<Standing>,
}

#[derive(Debug)]
pub struct GameSession {
    settings: GameSettings,
    roster: Vec<Player>,
    departed: HashSet<PlayerId>,
    ledger: RoundLedger,
    history: Vec<RoundResult>,
    current: Option<RoundCoordinator>,
    phase: SessionPhase,
    outcome: Option<GameOutcome>,
}

impl GameSession {
    pub fn start(roster: Vec<Player>, settings: GameSettings) -> Result<Self, GameError> {
        if roster.len() < settings.min_players {
            return Err(GameError::InsufficientPlayers {
                required: settings.min_players,
                actual: roster.len(),
            });
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for player in &roster {
            if !ids.insert(player.id) || !names.insert(player.name.as_str()) {
                return Err(GameError::DuplicatePlayer { player: player.id });
            }
        }

        let ids: Vec<PlayerId> = roster.iter().map(|p| p.id).collect();
        info!(
            "Starting game with {} players, {} rounds",
            roster.len(),
            settings.rounds
        );

        Ok(Self {
            ledger: RoundLedger::new(&ids),
            settings,
            roster,
            departed: HashSet::new(),
            history: Vec::new(),
            current: None,
            phase: SessionPhase::Ready,
            outcome: None,
        })
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn name_of(&self, player: PlayerId) -> Option<&str> {
        self.roster
            .iter()
            .find(|p| p.id == player)
            .map(|p| p.name.as_str())
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.roster.iter().any(|p| p.id == player)
    }

    /// Roster players still connected.
    pub fn active_players(&self) -> usize {
        self.roster
            .iter()
            .filter(|p| !self.departed.contains(&p.id))
            .count()
    }

    /// Closed rounds, oldest first.
    pub fn history(&self) -> &[RoundResult] {
        &self.history
    }

    pub fn current_round(&self) -> Option<&RoundCoordinator> {
        self.current.as_ref()
    }

    pub fn total_for(&self, player: PlayerId) -> Option<u64> {
        self.ledger.total_for(player)
    }

    pub fn standings(&self) -> Vec<Standing> {
        self.ledger.standings()
    }

    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.current
            .as_ref()
            .filter(|round| round.status() == RoundStatus::Collecting)
            .and_then(|round| round.deadline())
    }

    pub fn ready_to_close(&self, now: Instant) -> bool {
        self.current
            .as_ref()
            .is_some_and(|round| round.ready_to_close(now))
    }

    pub fn submit_bid(&mut self, player: PlayerId, amount: i64) -> Result<u64, GameError> {
        match self.phase {
            SessionPhase::Ready => Err(GameError::GameNotStarted),
            SessionPhase::Ended => Err(GameError::GameEnded),
            SessionPhase::Playing => match self.current.as_mut() {
                Some(round) => round.submit_bid(player, amount),
                None => Err(GameError::GameNotStarted),
            },
        }
    }

    /// Marks a roster player as gone. Their bid in the open round is 0 and
    /// later rounds are divided among the remaining players.
    pub fn player_left(&mut self, player: PlayerId) -> bool {
        if !self.is_member(player) {
            return false;
        }
        self.departed.insert(player);
        if let Some(round) = self.current.as_mut() {
            round.forfeit(player);
        }
        true
    }

    /// Closes the open round, then opens the next one or ends the game.
    pub fn advance(&mut self, now: Instant) -> Result<Vec<SessionEvent>, GameError> {
        if self.phase == SessionPhase::Ended {
            return Err(GameError::GameEnded);
        }

        let mut events = Vec::new();

        if let Some(round) = self.current.as_mut() {
            let result = round.close(&mut self.ledger)?.clone();
            self.current = None;
            info!(
                "Round {} closed, {} gold paid out",
                result.number,
                result.total_paid()
            );
            self.history.push(result.clone());
            events.push(SessionEvent::RoundClosed(result));
        }

        if (self.history.len() as u32) < self.settings.rounds {
            events.push(self.open_round(now)?);
        } else {
            events.push(SessionEvent::GameEnded(self.finalize()?));
        }

        Ok(events)
    }

    fn open_round(&mut self, now: Instant) -> Result<SessionEvent, GameError> {
        let number = self.history.len() as u32 + 1;
        // Departed players sit out every round after the one they left in
        let ids: Vec<PlayerId> = self
            .roster
            .iter()
            .filter(|p| !self.departed.contains(&p.id))
            .map(|p| p.id)
            .collect();
        let mut round = RoundCoordinator::new(number, &ids, self.settings.pool);

        let deadline = now
            .checked_add(self.settings.bid_timeout)
            .ok_or(GameError::DeadlineOverflow)?;
        round.begin_collecting(deadline)?;

        info!("Round {}/{} open", number, self.settings.rounds);
        self.current = Some(round);
        self.phase = SessionPhase::Playing;

        Ok(SessionEvent::RoundStarted {
            round: number,
            total_rounds: self.settings.rounds,
            pool: self.settings.pool,
            deadline,
            timeout: self.settings.bid_timeout,
        })
    }

    /// Ends the game with the rounds closed so far and picks the winners.
    ///
    /// A round still collecting is abandoned without payouts.
    pub fn finalize(&mut self) -> Result<GameOutcome, GameError> {
        if self.phase == SessionPhase::Ended {
            return Err(GameError::GameEnded);
        }

        self.current = None;
        self.phase = SessionPhase::Ended;

        let outcome = GameOutcome::from_standings(self.ledger.standings());
        info!(
            "Game over after {} rounds, {} winner(s) with {}",
            self.history.len(),
            outcome.winners.len(),
            outcome.top_total()
        );
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    pub fn status(&self, now: Instant) -> SessionStatus {
        let (round, time_left, has_bid) = match &self.current {
            Some(round) => (round.number(), round.time_left(now), round.bid_status()),
            None => (self.ledger.current_round(), None, Vec::new()),
        };

        SessionStatus {
            phase: self.phase,
            round,
            total_rounds: self.settings.rounds,
            time_left,
            has_bid,
            standings: self.ledger.standings(),
        }
    }
}
