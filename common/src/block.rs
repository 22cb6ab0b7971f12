//! The graded outcome for one block height.

use crate::grading::{GradingOutcome, GradingRound};
use crate::rewards::{self, Payout};
use crate::{GradedRecord, GraderVersion, winners};
use serde::{Deserialize, Serialize};

/// A graded submission set. `empty` marks a height without an honest quorum,
/// in which case nothing else is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedBlock {
    pub height: i32,
    pub version: GraderVersion,
    /// Distinct submissions after duplicate filtering.
    pub unique_count: usize,
    /// Honest records kept by the difficulty check, malformed ones included.
    pub honest_count: usize,
    /// Every record that entered grading, in final rank order.
    pub graded: Vec<GradedRecord>,
    /// The top of `graded`, best first.
    pub winners: Vec<GradedRecord>,
    pub rounds: Vec<GradingRound>,
    pub empty: bool,
}

impl GradedBlock {
    /// A height where fewer honest records than the minimum were found.
    pub fn without_quorum(
        height: i32,
        version: GraderVersion,
        unique_count: usize,
        honest_count: usize,
    ) -> Self {
        Self {
            height,
            version,
            unique_count,
            honest_count,
            graded: Vec::new(),
            winners: Vec::new(),
            rounds: Vec::new(),
            empty: true,
        }
    }

    pub fn from_outcome(
        height: i32,
        version: GraderVersion,
        unique_count: usize,
        honest_count: usize,
        outcome: GradingOutcome,
    ) -> Self {
        let winners = outcome.winners();
        let graded = outcome.ranked();
        Self {
            height,
            version,
            unique_count,
            honest_count,
            graded,
            winners,
            rounds: outcome.rounds,
            empty: false,
        }
    }

    /// Short hashes of the winners as the next height will reference them.
    pub fn winner_short_hashes(&self) -> Vec<String> {
        self.winners
            .iter()
            .map(|w| winners::short_hash(&w.record.entry_id))
            .collect()
    }

    pub fn payouts(&self) -> Vec<Payout> {
        rewards::payouts(&self.winners)
    }
}
