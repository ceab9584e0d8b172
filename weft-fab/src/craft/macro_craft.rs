//! Macro craft: the long-range arc of the chain
//!
//! Continues the prior segment's macro program at its next sequence
//! binding when one exists and stays tag-compatible; otherwise rolls the
//! weighted selector over every compatible macro program and starts it at
//! binding offset 0.

use crate::craft::program_binding_memes;
use crate::error::Result;
use crate::fabricator::Fabricator;
use uuid::Uuid;
use weft_common::content::ProgramType;
use weft_common::segment::SegmentChoice;
use weft_common::Selector;

pub fn craft(fab: &mut Fabricator) -> Result<()> {
    // continuity: advance the prior macro program to its next binding
    let prior = fab
        .retrospective()
        .prior_choice(ProgramType::Macro, None, None)
        .cloned();
    if let Some(prior) = prior {
        if let (Some(program_id), Some(prior_offset)) = (prior.program_id, prior.binding_offset) {
            if try_continue(fab, program_id, prior_offset + 1)? {
                return Ok(());
            }
        }
    }

    // fresh selection among tag-compatible macro programs
    let mut pool: Selector<Uuid> = Selector::new();
    let candidates = fab.content().programs_of_type(ProgramType::Macro);
    if candidates.is_empty() {
        fab.report_gap("no macro programs in content");
        return Ok(());
    }
    for program in &candidates {
        let Some(binding) = fab.content().binding_at_offset(program.id, 0) else {
            continue; // a macro program without bindings cannot start
        };
        let memes = program_binding_memes(program, binding)?;
        if fab.is_allowed(&memes) {
            pool.add(program.density.max(0.0), program.id);
        }
    }

    let Some(program_id) = pool.pick(fab.rng()) else {
        fab.report_gap("no tag-compatible macro program qualifies");
        return Ok(());
    };
    commit(fab, program_id, 0)
}

/// Carry the macro program forward at `offset` when a compatible binding
/// exists there; false means the arc is exhausted
fn try_continue(fab: &mut Fabricator, program_id: Uuid, offset: u32) -> Result<bool> {
    let Some(program) = fab.content().program(program_id) else {
        fab.report_gap(format!("prior macro program {} missing from content", program_id));
        return Ok(false);
    };
    let Some(binding) = fab.content().binding_at_offset(program_id, offset) else {
        return Ok(false);
    };
    let memes = program_binding_memes(program, binding)?;
    if !fab.is_allowed(&memes) {
        return Ok(false);
    }
    commit(fab, program_id, offset)?;
    Ok(true)
}

fn commit(fab: &mut Fabricator, program_id: Uuid, offset: u32) -> Result<()> {
    let Some(program) = fab.content().program(program_id) else {
        fab.report_gap(format!("macro program {} missing from content", program_id));
        return Ok(());
    };
    let Some(binding) = fab.content().binding_at_offset(program_id, offset) else {
        fab.report_gap(format!(
            "macro program {} has no binding at offset {}",
            program.name, offset
        ));
        return Ok(());
    };
    let sequence_id = binding.sequence_id;
    let memes = program_binding_memes(program, binding)?;

    fab.add_memes(memes)?;
    let choice_id = fab.add_choice(SegmentChoice {
        id: Uuid::new_v4(),
        segment_id: fab.segment().id,
        program_type: ProgramType::Macro,
        program_id: Some(program_id),
        instrument_id: None,
        instrument_type: None,
        instrument_mode: None,
        binding_offset: Some(offset),
        transpose: 0,
    })?;
    fab.add_arrangement(choice_id, Some(sequence_id))?;
    Ok(())
}
