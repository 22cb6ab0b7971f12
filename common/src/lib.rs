//! A library for grading oracle price record submissions for a single block height.
//!
//! Every node runs the same pipeline over the same submissions and must reach
//! bit-identical results: duplicate filtering, a self-reported difficulty check,
//! iterative grading against the consensus average, then winner and reward selection.

pub mod block;
pub mod dedup;
pub mod difficulty;
pub mod grader;
pub mod grading;
pub mod rewards;
pub mod serde_hex;
pub mod winners;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// The most honest records any version will consider for grading.
pub const DEFAULT_LIMIT: usize = 50;
/// The smallest honest set that can be graded, which is also the number of winners.
pub const DEFAULT_MINIMUM: usize = 10;
/// Number of leading `entry_id` bytes exposed as a short hash.
pub const SHORT_HASH_BYTES: usize = 8;
/// Rewards are fixed-point with 8 implied decimal digits.
pub const REWARD_SCALE: u64 = 100_000_000;

/// Everything that can go wrong while configuring or feeding a grader.
/// Bad submissions are not errors: they are dropped and only show up as missing records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraderError {
    #[error("unsupported grader version {0}")]
    UnknownVersion(u8),
    #[error("block at height {height} has already been graded")]
    AlreadyGraded { height: i32 },
    #[error("invalid asset registry: {0}")]
    Registry(String),
}

/// Each grading rule-set the network has used.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
pub enum GraderVersion {
    /// Top 50 honest records, plain quartic deviation.
    V1,
    /// Top 25 honest records, deviations inside a 1% band are free.
    V2,
}

impl GraderVersion {
    /// The rule-set constants for this version.
    pub fn params(self) -> GradingParams {
        match self {
            GraderVersion::V1 => GradingParams {
                limit: DEFAULT_LIMIT,
                minimum: DEFAULT_MINIMUM,
                tolerance_band: 0.0,
            },
            GraderVersion::V2 => GradingParams {
                limit: 25,
                minimum: DEFAULT_MINIMUM,
                tolerance_band: 0.01,
            },
        }
    }

    /// The protocol number this version is registered under.
    pub fn number(self) -> u8 {
        match self {
            GraderVersion::V1 => 1,
            GraderVersion::V2 => 2,
        }
    }
}

impl TryFrom<u8> for GraderVersion {
    type Error = GraderError;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        match version {
            1 => Ok(GraderVersion::V1),
            2 => Ok(GraderVersion::V2),
            other => Err(GraderError::UnknownVersion(other)),
        }
    }
}

impl fmt::Display for GraderVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Constants that vary between grader versions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradingParams {
    /// Stop verifying difficulties once this many honest records are found.
    pub limit: usize,
    /// Narrow the graded set down to this size; fewer honest records means no winners.
    pub minimum: usize,
    /// Relative deviation from the average that costs nothing. Zero disables the band.
    pub tolerance_band: f64,
}

impl Default for GradingParams {
    fn default() -> Self {
        GraderVersion::V1.params()
    }
}

/// The ordered list of assets every price vector is aligned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AssetRegistry {
    assets: Vec<String>,
}

impl AssetRegistry {
    /// Build a registry from asset identifiers in price-slot order.
    ///
    /// # Errors
    /// Returns an error if the list is empty or names an asset twice.
    pub fn new(assets: Vec<String>) -> Result<Self, GraderError> {
        if assets.is_empty() {
            return Err(GraderError::Registry("no assets".to_string()));
        }
        let mut seen = HashSet::new();
        for asset in &assets {
            if !seen.insert(asset.as_str()) {
                return Err(GraderError::Registry(format!("duplicate asset {asset}")));
            }
        }
        Ok(Self { assets })
    }

    /// Number of price slots a record must carry.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Always false for a constructed registry.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// The price slot of an asset, if it is registered.
    pub fn position(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// True if a price vector has exactly one slot per registered asset.
    pub fn fits(&self, prices: &[f64]) -> bool {
        prices.len() == self.assets.len()
    }
}

impl TryFrom<Vec<String>> for AssetRegistry {
    type Error = GraderError;

    fn try_from(assets: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(assets)
    }
}

impl From<AssetRegistry> for Vec<String> {
    fn from(registry: AssetRegistry) -> Self {
        registry.assets
    }
}

/// An oracle price record as handed over by the intake layer.
/// Identity fields are never changed by grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(with = "serde_hex")]
    pub nonce: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub record_hash: Vec<u8>,
    pub claimed_difficulty: u64,
    /// One price per asset, in asset registry order.
    pub prices: Vec<f64>,
    /// Short hashes of the previous height's winners, one per winner slot.
    #[serde(default)]
    pub prior_winner_refs: Vec<String>,
    #[serde(with = "serde_hex")]
    pub entry_id: Vec<u8>,
}

impl Record {
    /// The bytes two submissions must share to count as duplicates: nonce then record hash.
    pub fn identity_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.nonce.len() + self.record_hash.len());
        key.extend_from_slice(&self.nonce);
        key.extend_from_slice(&self.record_hash);
        key
    }

    /// The short hash later records use to reference this one.
    pub fn short_hash(&self) -> String {
        winners::short_hash(&self.entry_id)
    }
}

/// A record whose recomputed difficulty matched the one it claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HonestRecord {
    pub record: Record,
    pub verified_difficulty: u64,
}

/// A record with the grade it earned in the last grading round it took part in.
/// Lower is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedRecord {
    pub record: Record,
    pub verified_difficulty: u64,
    pub grade: f64,
}
