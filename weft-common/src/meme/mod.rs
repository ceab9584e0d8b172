//! Meme parsing and pairwise compatibility axioms
//!
//! A meme is a normalized tag attached to musical content (programs,
//! sequence bindings, instruments) that controls what may legally sound
//! together. Four syntactic forms carry distinct semantics:
//!
//! - Plain `WORD` — no special rule
//! - Anti `!WORD` — never coexists with plain `WORD`
//! - Unique `$WORD` — at most one `$WORD` across a combined set
//! - Strong `WORD!` — admitted only when plain `WORD` is already present
//!
//! Parsing is stateless and the parsed value is immutable. The pairwise
//! axioms here are aggregated into a full set-level theorem by
//! [`stack::MemeStack`].

pub mod stack;
pub mod taxonomy;

pub use stack::MemeStack;
pub use taxonomy::Taxonomy;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Syntactic form of a meme, recognized by prefix/suffix marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemeForm {
    /// `WORD` — combines freely, subject to the taxonomy
    Plain,

    /// `!WORD` — mutually exclusive with plain `WORD`
    Anti,

    /// `WORD!` — requires plain `WORD` on the other side of the comparison
    Strong,

    /// `$WORD` — at most one per body across the combined set
    Unique,
}

/// A parsed, normalized meme
///
/// The body is upper-cased and holds only `A-Z`, `0-9`, and `-`; the form
/// marker is stripped during parse. Two memes are equal when both form and
/// body match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meme {
    form: MemeForm,
    body: String,
}

impl Meme {
    /// Parse raw tag text into a classified meme
    ///
    /// Leading `!` marks Anti, leading `$` marks Unique, trailing `!` marks
    /// Strong; anything else is Plain. Whitespace is trimmed and the body
    /// upper-cased. A tag carrying both a prefix and a suffix marker fails
    /// the body character check and is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMeme`] for an empty body, a bare marker, or a
    /// body containing characters outside `A-Z`, `0-9`, `-`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        let (form, body_text) = if let Some(rest) = trimmed.strip_prefix('!') {
            (MemeForm::Anti, rest)
        } else if let Some(rest) = trimmed.strip_prefix('$') {
            (MemeForm::Unique, rest)
        } else if let Some(rest) = trimmed.strip_suffix('!') {
            (MemeForm::Strong, rest)
        } else {
            (MemeForm::Plain, trimmed)
        };

        let body = body_text.trim().to_uppercase();
        if body.is_empty() {
            return Err(Error::InvalidMeme(format!("empty body in {:?}", raw)));
        }
        if !body.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidMeme(format!(
                "body {:?} contains characters outside A-Z, 0-9, '-'",
                body
            )));
        }

        Ok(Self { form, body })
    }

    /// Parse a whole list of raw tags, rejecting the list on the first bad one
    pub fn parse_all<I, S>(raw: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter().map(|s| Meme::parse(s.as_ref())).collect()
    }

    /// Construct a plain meme directly from an already-normalized body
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            form: MemeForm::Plain,
            body: body.into().to_uppercase(),
        }
    }

    /// Syntactic form
    pub fn form(&self) -> MemeForm {
        self.form
    }

    /// Normalized body text (marker stripped, upper-cased)
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Anti-exclusion axiom: a plain and an anti meme sharing a body may
    /// never coexist. Symmetric; callers test each cross-set pair once.
    pub fn anti_conflict(&self, other: &Meme) -> bool {
        if self.body != other.body {
            return false;
        }
        matches!(
            (self.form, other.form),
            (MemeForm::Plain, MemeForm::Anti) | (MemeForm::Anti, MemeForm::Plain)
        )
    }

    /// Unique-exclusion axiom: two unique memes sharing a body are mutually
    /// exclusive, even when one is not yet committed.
    pub fn unique_conflict(&self, other: &Meme) -> bool {
        self.form == MemeForm::Unique && other.form == MemeForm::Unique && self.body == other.body
    }

    /// Strong-pairing axiom: a strong meme is admissible only when some meme
    /// on the other side of the comparison carries its plain body.
    pub fn strong_satisfied_by(&self, other_side: &[Meme]) -> bool {
        debug_assert_eq!(self.form, MemeForm::Strong);
        other_side
            .iter()
            .any(|m| m.form == MemeForm::Plain && m.body == self.body)
    }
}

impl std::fmt::Display for Meme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.form {
            MemeForm::Plain => write!(f, "{}", self.body),
            MemeForm::Anti => write!(f, "!{}", self.body),
            MemeForm::Strong => write!(f, "{}!", self.body),
            MemeForm::Unique => write!(f, "${}", self.body),
        }
    }
}

// ========================================
// Tests
// ========================================
