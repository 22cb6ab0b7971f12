//! Remove repeated submissions.

use crate::Record;
use itertools::Itertools;
use log::warn;

/// Keep only the first occurrence of each identity key (nonce followed by record hash).
/// Survivors keep their relative order.
pub fn remove_duplicate_submissions(records: Vec<Record>) -> Vec<Record> {
    let submitted = records.len();
    let unique: Vec<Record> = records
        .into_iter()
        .unique_by(Record::identity_key)
        .collect();
    if unique.len() < submitted {
        warn!(
            "Dropped {} duplicate submissions, {} remain",
            submitted - unique.len(),
            unique.len()
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(nonce: &[u8], hash: &[u8], price: f64) -> Record {
        Record {
            nonce: nonce.to_vec(),
            record_hash: hash.to_vec(),
            claimed_difficulty: 0,
            prices: vec![price],
            prior_winner_refs: vec![],
            entry_id: vec![],
        }
    }

    #[test]
    fn test_keeps_first_occurrence_in_order() {
        let records = vec![
            record(b"a", b"1", 1.0),
            record(b"b", b"1", 2.0),
            record(b"a", b"1", 3.0),
            record(b"c", b"2", 4.0),
            record(b"b", b"1", 5.0),
        ];
        let unique = remove_duplicate_submissions(records);
        let prices: Vec<f64> = unique.iter().map(|r| r.prices[0]).collect();
        assert_eq!(prices, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_same_nonce_different_hash_is_unique() {
        let records = vec![record(b"n", b"1", 1.0), record(b"n", b"2", 2.0)];
        assert_eq!(remove_duplicate_submissions(records).len(), 2);
    }

    #[test]
    fn test_key_collision_across_field_boundary() {
        // "ab" ++ "c" and "a" ++ "bc" produce the same identity bytes
        let records = vec![record(b"ab", b"c", 1.0), record(b"a", b"bc", 2.0)];
        let unique = remove_duplicate_submissions(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].prices[0], 1.0);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            record(b"x", b"1", 1.0),
            record(b"x", b"1", 1.0),
            record(b"y", b"1", 2.0),
        ];
        let once = remove_duplicate_submissions(records);
        let twice = remove_duplicate_submissions(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty() {
        assert!(remove_duplicate_submissions(vec![]).is_empty());
    }
}
