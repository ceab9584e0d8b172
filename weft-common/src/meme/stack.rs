//! Meme stack: the full compatibility theorem over meme sets
//!
//! Aggregates the pairwise axioms ([`Meme::anti_conflict`],
//! [`Meme::unique_conflict`], [`Meme::strong_satisfied_by`]) and the
//! [`Taxonomy`] into one admission test, plus a self-validity test over an
//! already-accumulated set and the order-independent constellation
//! fingerprint used to identify distinct combinations.

use std::collections::BTreeSet;

use super::taxonomy::Taxonomy;
use super::{Meme, MemeForm};

/// Delimiter joining bodies in a constellation fingerprint.
///
/// `_` cannot occur inside a parsed body, so the fingerprint splits back
/// unambiguously.
pub const CONSTELLATION_DELIMITER: &str = "_";

/// Compatibility theorem over meme sets
///
/// Holds the taxonomy; the pairwise axioms are stateless. One stack is
/// shared read-only by every craft in a work unit.
#[derive(Debug, Clone, Default)]
pub struct MemeStack {
    taxonomy: Taxonomy,
}

impl MemeStack {
    /// Stack with an empty taxonomy
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack applying the given taxonomy after the pairwise axioms
    pub fn with_taxonomy(taxonomy: Taxonomy) -> Self {
        Self { taxonomy }
    }

    /// Admission test: may `incoming` legally join `existing`?
    ///
    /// All four conditions must hold; failure of any one rejects the
    /// incoming set as a whole:
    ///
    /// 1. no anti conflict between any existing/incoming pair (either order)
    /// 2. no unique conflict between any existing/incoming pair
    /// 3. every incoming strong meme finds its plain body in `existing`
    /// 4. the taxonomy allows the union
    pub fn is_allowed(&self, existing: &[Meme], incoming: &[Meme]) -> bool {
        self.allowed_inner(existing, incoming, true)
    }

    /// Self-validity test over an accumulated set
    ///
    /// Re-inserts each meme against the rest of the set, catching
    /// contradictions introduced by the union of choices regardless of the
    /// order they were filtered in. The strong-pairing axiom is an
    /// admission-time rule and is not re-applied here, which keeps validity
    /// monotonic under subset (removing memes never invalidates a set).
    pub fn is_valid(&self, set: &[Meme]) -> bool {
        for (idx, meme) in set.iter().enumerate() {
            let rest: Vec<Meme> = set
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, m)| m.clone())
                .collect();
            if !self.allowed_inner(&rest, std::slice::from_ref(meme), false) {
                return false;
            }
        }
        true
    }

    fn allowed_inner(&self, existing: &[Meme], incoming: &[Meme], enforce_strong: bool) -> bool {
        for held in existing {
            for candidate in incoming {
                if held.anti_conflict(candidate) || held.unique_conflict(candidate) {
                    return false;
                }
            }
        }

        if enforce_strong {
            for candidate in incoming {
                if candidate.form() == MemeForm::Strong && !candidate.strong_satisfied_by(existing)
                {
                    return false;
                }
            }
        }

        let mut union: Vec<Meme> = Vec::with_capacity(existing.len() + incoming.len());
        union.extend_from_slice(existing);
        union.extend_from_slice(incoming);
        self.taxonomy.is_allowed(&union)
    }
}

/// Canonical fingerprint of a meme set
///
/// Deduplicates bodies (form markers dropped), sorts lexicographically, and
/// joins with [`CONSTELLATION_DELIMITER`]. Order-independent by
/// construction; used to identify distinct combinations observed across
/// many segments.
pub fn constellation(memes: &[Meme]) -> String {
    let bodies: BTreeSet<&str> = memes.iter().map(|m| m.body()).collect();
    bodies
        .into_iter()
        .collect::<Vec<_>>()
        .join(CONSTELLATION_DELIMITER)
}

/// Split a constellation back into its body set
pub fn constellation_bodies(fingerprint: &str) -> BTreeSet<String> {
    fingerprint
        .split(CONSTELLATION_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meme::taxonomy::Category;

    fn memes(raw: &[&str]) -> Vec<Meme> {
        Meme::parse_all(raw.iter().copied()).unwrap()
    }

    #[test]
    fn test_strong_requires_plain_partner() {
        let stack = MemeStack::new();
        assert!(stack.is_allowed(&memes(&["LEMONS"]), &memes(&["LEMONS!"])));
        assert!(!stack.is_allowed(&[], &memes(&["LEMONS!"])));
    }

    #[test]
    fn test_anti_rejected_both_orders() {
        let stack = MemeStack::new();
        assert!(!stack.is_allowed(&memes(&["X"]), &memes(&["!X"])));
        assert!(!stack.is_allowed(&memes(&["!X"]), &memes(&["X"])));
    }

    #[test]
    fn test_unique_exclusion() {
        let stack = MemeStack::new();
        assert!(!stack.is_allowed(&memes(&["$KEY-C"]), &memes(&["$KEY-C"])));
        assert!(stack.is_allowed(&memes(&["$KEY-C"]), &memes(&["$KEY-G"])));
    }

    #[test]
    fn test_incoming_rejected_as_a_whole() {
        // one bad meme in the incoming set rejects all of it
        let stack = MemeStack::new();
        assert!(!stack.is_allowed(&memes(&["X"]), &memes(&["FINE", "!X"])));
    }

    #[test]
    fn test_taxonomy_applied_over_union() {
        let stack = MemeStack::with_taxonomy(Taxonomy::new(vec![Category::new(
            "SEASON",
            ["WINTER", "SUMMER"],
        )]));
        assert!(!stack.is_allowed(&memes(&["WINTER"]), &memes(&["SUMMER"])));
        assert!(stack.is_allowed(&memes(&["WINTER"]), &memes(&["COLD"])));
    }

    #[test]
    fn test_is_valid_catches_contradiction() {
        let stack = MemeStack::new();
        assert!(stack.is_valid(&memes(&["A", "B", "C"])));
        assert!(!stack.is_valid(&memes(&["A", "!A"])));
        assert!(!stack.is_valid(&memes(&["$K", "$K"])));
    }

    #[test]
    fn test_is_valid_monotonic_under_subset() {
        let stack = MemeStack::with_taxonomy(Taxonomy::new(vec![Category::new(
            "SEASON",
            ["WINTER", "SUMMER"],
        )]));
        let set = memes(&["LEMONS", "LEMONS!", "WINTER", "$KEY-C", "!TANGERINES"]);
        assert!(stack.is_valid(&set));

        // every subset of a valid set stays valid
        for mask in 0..(1u32 << set.len()) {
            let subset: Vec<Meme> = set
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, m)| m.clone())
                .collect();
            assert!(stack.is_valid(&subset), "subset {:?} became invalid", subset);
        }
    }

    #[test]
    fn test_constellation_order_independent() {
        let ab = constellation(&memes(&["B", "A"]));
        let ba = constellation(&memes(&["A", "B"]));
        assert_eq!(ab, ba);
        assert_eq!(ab, "A_B");
    }

    #[test]
    fn test_constellation_dedupes_bodies() {
        // plain and strong of the same body collapse to one entry
        let c = constellation(&memes(&["LEMONS", "LEMONS!", "APPLES"]));
        assert_eq!(c, "APPLES_LEMONS");
    }

    #[test]
    fn test_constellation_round_trip() {
        let set = memes(&["DELTA", "ALPHA", "$KEY-C"]);
        let bodies = constellation_bodies(&constellation(&set));
        let expected: BTreeSet<String> =
            ["ALPHA", "DELTA", "KEY-C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(bodies, expected);
    }
}
