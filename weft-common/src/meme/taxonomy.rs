//! Meme taxonomy: named categories of mutually exclusive plain bodies
//!
//! A category groups bodies that describe the same musical dimension (a key
//! signature group, a season group). At most one member of each category may
//! be active across a combined meme set. Category contents are supplied by
//! the caller; nothing is hardwired here.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::Meme;

/// One named group of mutually exclusive bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Display name, used in diagnostics
    pub name: String,

    /// Member bodies, stored upper-cased
    pub members: HashSet<String>,
}

impl Category {
    /// Build a category, upper-casing each member body
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            name: name.into(),
            members: members
                .into_iter()
                .map(|m| m.as_ref().to_uppercase())
                .collect(),
        }
    }
}

/// Static grouping of bodies into mutually exclusive categories
///
/// Evaluated over the union of all memes being tested, after the pairwise
/// axioms. An empty taxonomy allows everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    /// Taxonomy with no categories (allows any combination)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Taxonomy over the given categories
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Test whether a combined meme set activates at most one member of
    /// every category
    pub fn is_allowed(&self, combined: &[Meme]) -> bool {
        self.categories.iter().all(|category| {
            let mut seen: Option<&str> = None;
            for meme in combined {
                if category.members.contains(meme.body()) {
                    match seen {
                        None => seen = Some(meme.body()),
                        Some(prior) if prior != meme.body() => return false,
                        Some(_) => {}
                    }
                }
            }
            true
        })
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    fn season_taxonomy() -> Taxonomy {
        Taxonomy::new(vec![Category::new(
            "SEASON",
            ["WINTER", "SPRING", "SUMMER", "FALL"],
        )])
    }

    fn memes(raw: &[&str]) -> Vec<Meme> {
        Meme::parse_all(raw.iter().copied()).unwrap()
    }

    #[test]
    fn test_empty_taxonomy_allows_everything() {
        let tx = Taxonomy::empty();
        assert!(tx.is_allowed(&memes(&["WINTER", "SUMMER", "ANYTHING"])));
    }

    #[test]
    fn test_single_member_allowed() {
        let tx = season_taxonomy();
        assert!(tx.is_allowed(&memes(&["WINTER", "COLD"])));
    }

    #[test]
    fn test_two_members_rejected() {
        let tx = season_taxonomy();
        assert!(!tx.is_allowed(&memes(&["WINTER", "SUMMER"])));
    }

    #[test]
    fn test_repeated_member_allowed() {
        // the same body twice is one active member, not two
        let tx = season_taxonomy();
        assert!(tx.is_allowed(&memes(&["WINTER", "WINTER"])));
    }

    #[test]
    fn test_members_case_folded() {
        let tx = Taxonomy::new(vec![Category::new("SEASON", ["winter", "summer"])]);
        assert!(!tx.is_allowed(&memes(&["WINTER", "SUMMER"])));
    }
}
