//! Cross-height winner references.

use crate::SHORT_HASH_BYTES;

/// Hex of the first 8 bytes of an entry id. Shorter ids are encoded whole.
pub fn short_hash(entry_id: &[u8]) -> String {
    hex::encode(&entry_id[..entry_id.len().min(SHORT_HASH_BYTES)])
}

/// Check that a record's references name the previous height's winners, slot for slot.
///
/// With no previous winners, every reference must be empty.
pub fn verify_winners(prior_winner_refs: &[String], previous_winners: &[String]) -> bool {
    if previous_winners.is_empty() {
        return prior_winner_refs.iter().all(String::is_empty);
    }
    prior_winner_refs.len() == previous_winners.len()
        && prior_winner_refs
            .iter()
            .zip(previous_winners)
            .all(|(claimed, actual)| claimed == actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(
            short_hash(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02, 0x03, 0xff, 0xff]),
            "deadbeef00010203"
        );
        assert_eq!(short_hash(&[0xab]), "ab");
        assert_eq!(short_hash(&[]), "");
    }

    #[test]
    fn test_matching_references_pass() {
        let previous = strings(&["a1", "b1", "c1"]);
        assert!(verify_winners(&strings(&["a1", "b1", "c1"]), &previous));
    }

    #[test]
    fn test_any_differing_reference_fails() {
        let previous = strings(&["a1", "b1", "c1"]);
        assert!(!verify_winners(&strings(&["a1", "b1", "c2"]), &previous));
        assert!(!verify_winners(&strings(&["x1", "b1", "c1"]), &previous));
        assert!(!verify_winners(&strings(&["b1", "a1", "c1"]), &previous));
    }

    #[test]
    fn test_length_mismatch_fails() {
        let previous = strings(&["a1", "b1", "c1"]);
        assert!(!verify_winners(&strings(&["a1", "b1"]), &previous));
        assert!(!verify_winners(&strings(&["a1", "b1", "c1", "d1"]), &previous));
        assert!(!verify_winners(&[], &previous));
    }

    #[test]
    fn test_no_previous_winners() {
        assert!(verify_winners(&strings(&["", "", ""]), &[]));
        assert!(!verify_winners(&strings(&["", "a1", ""]), &[]));
    }
}
