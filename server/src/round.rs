//! A single round of bid collection.
//!
//! A round moves through `Open -> Collecting -> Closing -> Closed`. Bids are
//! write-only while collecting: nothing here exposes another player's amount
//! until the round has closed and produced a [`RoundResult`].

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use log::debug;

use crate::distribution::DistributionEngine;
use crate::error::GameError;
use crate::ledger::RoundLedger;
use crate::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    Open,
    Collecting,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundEntry {
    pub player: PlayerId,
    pub bid: u64,
    pub payout: u64,
    /// Ledger total after this round's payout
    pub total: u64,
    /// True when the player never submitted and was counted as bidding 0
    pub defaulted: bool,
}

/// Frozen outcome of a closed round, entries in roster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub number: u32,
    pub pool: u64,
    pub entries: Vec<RoundEntry>,
}

impl RoundResult {
    pub fn entry_for(&self, player: PlayerId) -> Option<&RoundEntry> {
        self.entries.iter().find(|entry| entry.player == player)
    }

    pub fn payout_for(&self, player: PlayerId) -> Option<u64> {
        self.entry_for(player).map(|entry| entry.payout)
    }

    pub fn total_paid(&self) -> u64 {
        self.entries.iter().map(|entry| entry.payout).sum()
    }
}

#[derive(Debug)]
pub struct RoundCoordinator {
    number: u32,
    pool: u64,
    roster: Vec<PlayerId>,
    bids: HashMap<PlayerId, u64>,
    /// Players who left mid-round; they hold a standing bid of 0
    forfeited: HashSet<PlayerId>,
    status: RoundStatus,
    deadline: Option<Instant>,
    result: Option<RoundResult>,
}

impl RoundCoordinator {
    pub fn new(number: u32, roster: &[PlayerId], pool: u64) -> Self {
        Self {
            number,
            pool,
            roster: roster.to_vec(),
            bids: HashMap::new(),
            forfeited: HashSet::new(),
            status: RoundStatus::Open,
            deadline: None,
            result: None,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn pool(&self) -> u64 {
        self.pool
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    /// Opens the collection window. Only valid from `Open`.
    pub fn begin_collecting(&mut self, deadline: Instant) -> Result<(), GameError> {
        match self.status {
            RoundStatus::Open => {
                self.status = RoundStatus::Collecting;
                self.deadline = Some(deadline);
                debug!("Round {} collecting bids", self.number);
                Ok(())
            }
            _ => Err(GameError::RoundClosed { round: self.number }),
        }
    }

    /// Records a player's bid. Either the bid is stored whole or nothing changes.
    pub fn submit_bid(&mut self, player: PlayerId, amount: i64) -> Result<u64, GameError> {
        match self.status {
            RoundStatus::Collecting => {}
            RoundStatus::Open => return Err(GameError::RoundNotOpen { round: self.number }),
            RoundStatus::Closing | RoundStatus::Closed => {
                return Err(GameError::RoundClosed { round: self.number })
            }
        }

        if !self.roster.contains(&player) {
            return Err(GameError::UnknownPlayer { player });
        }

        let amount = u64::try_from(amount).map_err(|_| GameError::InvalidBid { amount })?;

        if self.has_bid(player) {
            return Err(GameError::AlreadyBid {
                player,
                round: self.number,
            });
        }

        self.bids.insert(player, amount);
        Ok(amount)
    }

    /// Gives a departed player a standing bid of 0. Keeps a bid already made.
    pub fn forfeit(&mut self, player: PlayerId) {
        if self.roster.contains(&player) && !self.bids.contains_key(&player) {
            self.forfeited.insert(player);
        }
    }

    pub fn has_bid(&self, player: PlayerId) -> bool {
        self.bids.contains_key(&player) || self.forfeited.contains(&player)
    }

    pub fn all_bids_in(&self) -> bool {
        self.roster.iter().all(|player| self.has_bid(*player))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn ready_to_close(&self, now: Instant) -> bool {
        self.status == RoundStatus::Collecting && (self.all_bids_in() || self.is_expired(now))
    }

    pub fn time_left(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Which roster players have bid, in roster order. Amounts stay hidden.
    pub fn bid_status(&self) -> Vec<(PlayerId, bool)> {
        self.roster
            .iter()
            .map(|player| (*player, self.has_bid(*player)))
            .collect()
    }

    /// Fills missing bids with 0, divides the pool and pays the ledger.
    pub fn close(&mut self, ledger: &mut RoundLedger) -> Result<&RoundResult, GameError> {
        if matches!(self.status, RoundStatus::Closing | RoundStatus::Closed) {
            return Err(GameError::RoundClosed { round: self.number });
        }
        let previous = self.status;
        self.status = RoundStatus::Closing;

        let bids: Vec<(PlayerId, u64)> = self
            .roster
            .iter()
            .map(|player| (*player, self.bids.get(player).copied().unwrap_or(0)))
            .collect();

        let payouts = DistributionEngine::new(self.pool).distribute(&bids);

        // The ledger applies the whole round or nothing, so a failed close
        // leaves the round as it was
        if let Err(e) = ledger.record_round(self.number, &payouts) {
            self.status = previous;
            return Err(e);
        }

        let mut entries = Vec::with_capacity(payouts.len());
        for (payout, (player, bid)) in payouts.iter().zip(&bids) {
            entries.push(RoundEntry {
                player: *player,
                bid: *bid,
                payout: payout.amount,
                total: ledger.total_for(*player).unwrap_or(0),
                defaulted: !self.bids.contains_key(player),
            });
        }

        debug!(
            "Round {} closed, {} of {} players bid",
            self.number,
            self.bids.len(),
            self.roster.len()
        );

        self.status = RoundStatus::Closed;
        Ok(&*self.result.insert(RoundResult {
            number: self.number,
            pool: self.pool,
            entries,
        }))
    }
}
