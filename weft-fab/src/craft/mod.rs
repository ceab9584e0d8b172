//! Craft pipeline: the ordered musical decisions for one segment
//!
//! Each craft owns one category of decision — the macro arc, the main
//! program, then one instrument-backed craft per instrument type. The
//! pipeline is a closed enumeration driven in order; every craft is
//! independently skippable when no content serves its slot, and a craft
//! that finds content but no *qualifying* content records a segment
//! message and moves on. Only malformed content aborts the segment.

pub mod instrument;
pub mod macro_craft;
pub mod main_craft;

use crate::error::Result;
use crate::fabricator::Fabricator;
use tracing::debug;
use weft_common::content::{InstrumentType, Program, ProgramType, SequenceBinding};
use weft_common::error::Error as CommonError;
use weft_common::meme::Meme;

/// The closed set of crafts, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CraftKind {
    Macro,
    Main,
    Rhythm,
    PercLoop,
    Hook,
    Transition,
    Detail,
}

impl CraftKind {
    /// Pipeline order: program crafts first, then instrument crafts
    pub const ALL: [CraftKind; 7] = [
        CraftKind::Macro,
        CraftKind::Main,
        CraftKind::Rhythm,
        CraftKind::PercLoop,
        CraftKind::Hook,
        CraftKind::Transition,
        CraftKind::Detail,
    ];

    /// Run this craft's handler against the fabricator
    pub fn craft(self, fab: &mut Fabricator) -> Result<()> {
        debug!("segment {}: {:?} craft", fab.segment().offset, self);
        match self {
            CraftKind::Macro => macro_craft::craft(fab),
            CraftKind::Main => main_craft::craft(fab),
            CraftKind::Rhythm => {
                instrument::craft(fab, ProgramType::Rhythm, InstrumentType::Rhythm)
            }
            CraftKind::PercLoop => {
                instrument::craft(fab, ProgramType::PercLoop, InstrumentType::PercLoop)
            }
            CraftKind::Hook => instrument::craft(fab, ProgramType::Hook, InstrumentType::Hook),
            CraftKind::Transition => {
                instrument::craft(fab, ProgramType::Transition, InstrumentType::Transition)
            }
            CraftKind::Detail => {
                instrument::craft(fab, ProgramType::Detail, InstrumentType::Detail)
            }
        }
    }
}

/// Run the whole pipeline for one segment
pub fn run_pipeline(fab: &mut Fabricator) -> Result<()> {
    for kind in CraftKind::ALL {
        kind.craft(fab)?;
    }
    Ok(())
}

/// Parse an entity's tag list, mapping malformed tags to a fabrication
/// error (malformed content fails the segment, not the chain)
pub(crate) fn parse_memes(raw: &[String], what: &str) -> Result<Vec<Meme>> {
    Meme::parse_all(raw).map_err(|e: CommonError| {
        crate::error::Error::Fabrication(format!("{} carries a malformed tag: {}", what, e))
    })
}

/// The combined tag set a program + binding would add to the segment
pub(crate) fn program_binding_memes(
    program: &Program,
    binding: &SequenceBinding,
) -> Result<Vec<Meme>> {
    let mut memes = parse_memes(&program.memes, &format!("program {}", program.name))?;
    for meme in parse_memes(&binding.memes, &format!("binding {}", binding.id))? {
        if !memes.contains(&meme) {
            memes.push(meme);
        }
    }
    Ok(memes)
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order_starts_with_programs() {
        assert_eq!(CraftKind::ALL[0], CraftKind::Macro);
        assert_eq!(CraftKind::ALL[1], CraftKind::Main);
        assert_eq!(CraftKind::ALL.len(), 7);
    }

    #[test]
    fn test_parse_memes_flags_malformed_content() {
        let raw = vec!["FINE".to_string(), "two words".to_string()];
        let err = parse_memes(&raw, "program X").unwrap_err();
        assert!(matches!(err, crate::error::Error::Fabrication(_)));
        assert!(err.to_string().contains("program X"));
    }
}
