//! Per-rank payouts for a graded block.

use crate::{GradedRecord, REWARD_SCALE};
use serde::{Deserialize, Serialize};

/// The reward for a 0-indexed rank, in fixed-point units with 8 decimals.
/// Only the top ten are paid.
pub fn reward_for_place(place: usize) -> u64 {
    match place {
        0 => 800 * REWARD_SCALE,
        1 => 600 * REWARD_SCALE,
        2..=9 => 450 * REWARD_SCALE,
        _ => 0,
    }
}

/// What one winner is owed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub rank: usize,
    pub short_hash: String,
    pub reward: u64,
}

/// Payouts for winners listed best first.
pub fn payouts(winners: &[GradedRecord]) -> Vec<Payout> {
    winners
        .iter()
        .enumerate()
        .map(|(rank, winner)| Payout {
            rank,
            short_hash: winner.record.short_hash(),
            reward: reward_for_place(rank),
        })
        .collect()
}
