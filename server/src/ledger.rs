//! Cumulative gold per player across closed rounds.

use std::collections::{HashMap, HashSet};

use crate::distribution::Payout;
use crate::error::GameError;
use crate::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub player: PlayerId,
    pub total: u64,
}

/// Running totals for a fixed roster.
///
/// Each (player, round) pair may be paid exactly once, so the total for a
/// player is always the sum of their payouts over closed rounds.
#[derive(Debug, Clone)]
pub struct RoundLedger {
    /// Roster in join order, used to break ties in standings
    order: Vec<PlayerId>,
    totals: HashMap<PlayerId, u64>,
    recorded: HashSet<(PlayerId, u32)>,
    current_round: u32,
}

impl RoundLedger {
    pub fn new(roster: &[PlayerId]) -> Self {
        Self {
            order: roster.to_vec(),
            totals: roster.iter().map(|id| (*id, 0)).collect(),
            recorded: HashSet::new(),
            current_round: 0,
        }
    }

    pub fn record_payout(
        &mut self,
        player: PlayerId,
        round: u32,
        amount: u64,
    ) -> Result<(), GameError> {
        self.record_round(round, &[Payout { player, amount }])
    }

    /// Pays every entry of one round, or none of them if any entry fails.
    pub fn record_round(&mut self, round: u32, payouts: &[Payout]) -> Result<(), GameError> {
        let mut updated: Vec<(PlayerId, u64)> = Vec::with_capacity(payouts.len());
        for payout in payouts {
            let player = payout.player;
            let total = self
                .totals
                .get(&player)
                .ok_or(GameError::UnknownPlayer { player })?;

            if self.recorded.contains(&(player, round))
                || updated.iter().any(|(seen, _)| *seen == player)
            {
                return Err(GameError::DuplicateRound { player, round });
            }

            let total = total
                .checked_add(payout.amount)
                .ok_or(GameError::TotalOverflow { player })?;
            updated.push((player, total));
        }

        if updated.is_empty() {
            return Ok(());
        }
        for (player, total) in updated {
            self.totals.insert(player, total);
            self.recorded.insert((player, round));
        }
        self.current_round = self.current_round.max(round);
        Ok(())
    }

    /// Cumulative gold for a roster player, `None` for anyone else.
    pub fn total_for(&self, player: PlayerId) -> Option<u64> {
        self.totals.get(&player).copied()
    }

    /// Highest round with a recorded payout, 0 before the first close.
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .order
            .iter()
            .map(|player| Standing {
                player: *player,
                total: self.totals.get(player).copied().unwrap_or(0),
            })
            .collect();
        // sort_by is stable, so join order survives among equal totals
        standings.sort_by(|a, b| b.total.cmp(&a.total));
        standings
    }
}
