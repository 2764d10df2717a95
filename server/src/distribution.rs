//! Proportional division of the round pool.
//!
//! Every player receives `pool * bid / total` rounded down, then the units lost
//! to rounding are handed out one at a time by largest fractional remainder,
//! ties going to the earlier player in roster order. When nobody bids, every
//! player is weighted equally, which makes the same rule produce an even split
//! with the remainder going to the first players in the roster.

use crate::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub player: PlayerId,
    pub amount: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct DistributionEngine {
    pool: u64,
}

impl DistributionEngine {
    pub fn new(pool: u64) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> u64 {
        self.pool
    }

    /// Splits the pool across `bids`, which must be in roster order.
    ///
    /// The returned payouts keep the input order and always sum to the pool
    /// (unless `bids` is empty, in which case nothing is paid).
    pub fn distribute(&self, bids: &[(PlayerId, u64)]) -> Vec<Payout> {
        if bids.is_empty() {
            return Vec::new();
        }

        let total: u128 = bids.iter().map(|(_, bid)| *bid as u128).sum();
        let weights: Vec<u128> = if total == 0 {
            vec![1; bids.len()]
        } else {
            bids.iter().map(|(_, bid)| *bid as u128).collect()
        };
        let denominator = if total == 0 { bids.len() as u128 } else { total };
        let pool = self.pool as u128;

        let mut payouts = Vec::with_capacity(bids.len());
        let mut remainders = Vec::with_capacity(bids.len());
        let mut assigned: u128 = 0;

        for (index, ((player, _), weight)) in bids.iter().zip(&weights).enumerate() {
            let exact = pool * weight;
            let floor = exact / denominator;
            assigned += floor;
            payouts.push(Payout {
                player: *player,
                amount: floor as u64,
            });
            remainders.push((exact % denominator, index));
        }

        // Largest remainder first, roster order among equals
        remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let leftover = (pool - assigned) as usize;
        for (_, index) in remainders.into_iter().take(leftover) {
            payouts[index].amount += 1;
        }

        payouts
    }
}

impl Default for DistributionEngine {
    fn default() -> Self {
        Self::new(shared::DEFAULT_POOL)
    }
}
