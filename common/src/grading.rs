//! Iterative grading of honest records against the consensus average.
//!
//! Each round computes fresh averages over the surviving set, grades every survivor
//! by its quartic relative deviation, re-ranks, and drops the worst record. This
//! repeats until only the minimum set is left. Rounds never share grades.
//!
//! The record arena is never mutated: every round is an immutable snapshot that
//! refers to records by their arena index.

use crate::{GradedRecord, GradingParams, HonestRecord};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Drop honest records whose price vector does not have one slot per asset.
/// They have already taken their place in the difficulty check.
pub fn retain_well_formed(arena: Vec<HonestRecord>, assets: usize) -> Vec<HonestRecord> {
    let verified = arena.len();
    let kept: Vec<HonestRecord> = arena
        .into_iter()
        .filter(|h| h.record.prices.len() == assets)
        .collect();
    if kept.len() < verified {
        warn!(
            "Excluded {} records with a price vector that is not {} long",
            verified - kept.len(),
            assets
        );
    }
    kept
}

/// The average price magnitude of each asset over `survivors`, summed in survivor order.
/// Negative prices count by their absolute value.
pub fn average(arena: &[HonestRecord], survivors: &[usize], assets: usize) -> Vec<f64> {
    let mut avg = vec![0.0; assets];
    for &index in survivors {
        for (sum, price) in avg.iter_mut().zip(&arena[index].record.prices) {
            *sum += price.abs();
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let count = survivors.len() as f64;
    for sum in &mut avg {
        *sum /= count;
    }
    avg
}

/// Grade one price vector against the averages: the sum over assets with a positive
/// average of the relative deviation to the fourth power. With a non-zero band the
/// deviation magnitude is reduced by the band first and never goes below zero.
pub fn calculate_grade(averages: &[f64], prices: &[f64], tolerance_band: f64) -> f64 {
    let mut grade = 0.0;
    for (avg, price) in averages.iter().zip(prices) {
        if *avg > 0.0 {
            let mut d = (price - avg) / avg;
            if tolerance_band > 0.0 {
                d = (d.abs() - tolerance_band).max(0.0);
            }
            grade += d * d * d * d;
        }
    }
    grade
}

/// A survivor's position in a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Index into the grading arena.
    pub index: usize,
    pub grade: f64,
}

/// One narrowing round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRound {
    /// Number of records graded in this round.
    pub size: usize,
    pub averages: Vec<f64>,
    /// Survivors best first. The last entry is dropped before the next round.
    pub ranking: Vec<RankedEntry>,
}

/// Everything the grading rounds produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingOutcome {
    pub arena: Vec<HonestRecord>,
    /// Rounds from the full honest set down to the minimum set.
    pub rounds: Vec<GradingRound>,
}

impl GradingOutcome {
    fn graded(&self, entry: &RankedEntry) -> GradedRecord {
        let honest = &self.arena[entry.index];
        GradedRecord {
            record: honest.record.clone(),
            verified_difficulty: honest.verified_difficulty,
            grade: entry.grade,
        }
    }

    /// The minimum set from the last round, best first.
    pub fn winners(&self) -> Vec<GradedRecord> {
        self.rounds
            .last()
            .map(|round| round.ranking.iter().map(|e| self.graded(e)).collect())
            .unwrap_or_default()
    }

    /// Every graded record in final rank order: the last round's ranking, then the
    /// dropped records with the most recently dropped first.
    pub fn ranked(&self) -> Vec<GradedRecord> {
        let Some((last, earlier)) = self.rounds.split_last() else {
            return Vec::new();
        };
        let mut ranked: Vec<GradedRecord> = last.ranking.iter().map(|e| self.graded(e)).collect();
        ranked.extend(
            earlier
                .iter()
                .rev()
                .filter_map(|round| round.ranking.last())
                .map(|e| self.graded(e)),
        );
        ranked
    }
}

/// Grade an honest, duplicate-free set in the order the difficulty check found it.
/// Malformed records are dropped first. Returns `None` when fewer than
/// `params.minimum` well-formed records remain.
pub fn grade_honest(
    arena: Vec<HonestRecord>,
    params: &GradingParams,
    assets: usize,
) -> Option<GradingOutcome> {
    let arena = retain_well_formed(arena, assets);
    let floor = params.minimum.max(1);
    if arena.len() < floor {
        debug!(
            "Only {} honest records, need {} to grade",
            arena.len(),
            floor
        );
        return None;
    }

    let mut survivors: Vec<usize> = (0..arena.len()).collect();
    let mut rounds = Vec::with_capacity(arena.len() - floor + 1);
    for size in (floor..=arena.len()).rev() {
        survivors.truncate(size);
        let averages = average(&arena, &survivors, assets);

        let mut ranking: Vec<RankedEntry> = survivors
            .iter()
            .map(|&index| RankedEntry {
                index,
                grade: calculate_grade(
                    &averages,
                    &arena[index].record.prices,
                    params.tolerance_band,
                ),
            })
            .collect();
        // Two stable sorts: grade ascending, equal grades keep difficulty descending
        ranking.sort_by(|a, b| {
            arena[b.index]
                .verified_difficulty
                .cmp(&arena[a.index].verified_difficulty)
        });
        ranking.sort_by(|a, b| a.grade.total_cmp(&b.grade));

        survivors = ranking.iter().map(|e| e.index).collect();
        debug!(
            "Round of {}: best grade {:?}, worst grade {:?}",
            size,
            ranking.first().map(|e| e.grade),
            ranking.last().map(|e| e.grade)
        );
        rounds.push(GradingRound {
            size,
            averages,
            ranking,
        });
    }

    Some(GradingOutcome { arena, rounds })
}
