//! Check self-reported difficulties without hashing the whole submission set.

use crate::{HonestRecord, Record};
use log::{debug, warn};
use sha2::{Digest, Sha256};

/// The proof-of-work hash. Only the first 8 bytes of the output are used.
pub trait DifficultyHash {
    fn hash(&self, data: &[u8]) -> Vec<u8>;
}

impl<F> DifficultyHash for F
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    fn hash(&self, data: &[u8]) -> Vec<u8> {
        self(data)
    }
}

/// SHA-256 as a stand-in primitive for tooling.
/// Networks plug their own primitive through [`DifficultyHash`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hash;

impl DifficultyHash for Sha256Hash {
    fn hash(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }
}

/// Recompute a record's difficulty: the leading 8 bytes of `hash(record_hash ++ nonce)`
/// read as a big-endian integer. Returns `None` if the primitive gave back fewer than 8 bytes.
pub fn compute_difficulty<H: DifficultyHash + ?Sized>(hasher: &H, record: &Record) -> Option<u64> {
    let mut data = Vec::with_capacity(record.record_hash.len() + record.nonce.len());
    data.extend_from_slice(&record.record_hash);
    data.extend_from_slice(&record.nonce);
    let hash = hasher.hash(&data);
    let prefix: [u8; 8] = hash.get(..8)?.try_into().ok()?;
    Some(u64::from_be_bytes(prefix))
}

/// Sort by claimed difficulty, highest first. Equal claims are ordered by identity key
/// so the result does not depend on submission order.
pub fn sort_by_claimed_difficulty(records: &mut [Record]) {
    records.sort_by(|a, b| {
        b.claimed_difficulty
            .cmp(&a.claimed_difficulty)
            .then_with(|| {
                a.nonce
                    .iter()
                    .chain(&a.record_hash)
                    .cmp(b.nonce.iter().chain(&b.record_hash))
            })
    });
}

/// The result of a verification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    /// Honest records in the order they were found.
    pub honest: Vec<HonestRecord>,
    /// How many records were hashed.
    pub hashed: usize,
    /// How many hashed records misreported their difficulty.
    pub dishonest: usize,
}

/// Walk records sorted by claimed difficulty and keep the honest ones until `limit` are found.
///
/// Hashing stops at the limit, so the cost is `limit` plus the number of misreported
/// records seen before then, not the size of the submission set.
pub fn verify_top_difficulty<H: DifficultyHash + ?Sized>(
    sorted: Vec<Record>,
    limit: usize,
    hasher: &H,
) -> Verification {
    let mut honest = Vec::with_capacity(limit.min(sorted.len()));
    let mut hashed = 0;
    let mut dishonest = 0;

    for record in sorted {
        if honest.len() >= limit {
            break;
        }
        hashed += 1;
        match compute_difficulty(hasher, &record) {
            Some(verified) if verified == record.claimed_difficulty => {
                honest.push(HonestRecord {
                    record,
                    verified_difficulty: verified,
                });
            }
            Some(_) => dishonest += 1,
            None => {
                warn!("Hash primitive returned fewer than 8 bytes, treating record as dishonest");
                dishonest += 1;
            }
        }
    }

    debug!(
        "Verified {} honest records from {} hashed ({} dishonest)",
        honest.len(),
        hashed,
        dishonest
    );
    Verification {
        honest,
        hashed,
        dishonest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echo the input back so the difficulty is the first 8 bytes of the record hash.
    fn echo(data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn record(difficulty: u64, claimed: u64, nonce: u8) -> Record {
        Record {
            nonce: vec![nonce],
            record_hash: difficulty.to_be_bytes().to_vec(),
            claimed_difficulty: claimed,
            prices: vec![1.0],
            prior_winner_refs: vec![],
            entry_id: vec![nonce],
        }
    }

    #[test]
    fn test_compute_difficulty_reads_big_endian_prefix() {
        let r = record(0x0102_0304_0506_0708, 0, 9);
        assert_eq!(compute_difficulty(&echo, &r), Some(0x0102_0304_0506_0708));
    }

    #[test]
    fn test_compute_difficulty_hashes_record_hash_then_nonce() {
        let r = Record {
            nonce: vec![0xaa; 8],
            record_hash: vec![0xbb; 2],
            ..record(0, 0, 0)
        };
        assert_eq!(
            compute_difficulty(&echo, &r),
            Some(u64::from_be_bytes([0xbb, 0xbb, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa]))
        );
    }

    #[test]
    fn test_compute_difficulty_short_output() {
        let short = |_: &[u8]| vec![1u8, 2, 3];
        assert_eq!(compute_difficulty(&short, &record(5, 5, 0)), None);
    }

    #[test]
    fn test_sha256_is_deterministic() {
        let r = record(42, 0, 1);
        let a = compute_difficulty(&Sha256Hash, &r);
        let b = compute_difficulty(&Sha256Hash, &r);
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_sort_descending_with_identity_tiebreak() {
        let mut records = vec![record(1, 10, 3), record(2, 30, 1), record(3, 10, 2)];
        sort_by_claimed_difficulty(&mut records);
        let order: Vec<(u64, u8)> = records
            .iter()
            .map(|r| (r.claimed_difficulty, r.nonce[0]))
            .collect();
        assert_eq!(order, vec![(30, 1), (10, 2), (10, 3)]);
    }

    #[test]
    fn test_verify_skips_dishonest_and_stops_at_limit() {
        let sorted = vec![
            record(90, 100, 0), // claims more than it did
            record(90, 90, 1),
            record(85, 95, 2), // claims more than it did
            record(80, 80, 3),
            record(70, 70, 4),
            record(60, 60, 5),
        ];
        let result = verify_top_difficulty(sorted, 3, &echo);
        let nonces: Vec<u8> = result.honest.iter().map(|h| h.record.nonce[0]).collect();
        assert_eq!(nonces, vec![1, 3, 4]);
        assert_eq!(result.hashed, 5);
        assert_eq!(result.dishonest, 2);
        assert!(
            result
                .honest
                .iter()
                .all(|h| h.verified_difficulty == h.record.claimed_difficulty)
        );
    }

    #[test]
    fn test_verify_fewer_honest_than_limit() {
        let sorted = vec![record(5, 6, 0), record(4, 4, 1)];
        let result = verify_top_difficulty(sorted, 50, &echo);
        assert_eq!(result.honest.len(), 1);
        assert_eq!(result.hashed, 2);
    }

    #[test]
    fn test_verify_zero_limit_hashes_nothing() {
        let result = verify_top_difficulty(vec![record(1, 1, 0)], 0, &echo);
        assert!(result.honest.is_empty());
        assert_eq!(result.hashed, 0);
    }
}
