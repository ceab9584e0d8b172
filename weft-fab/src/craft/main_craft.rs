//! Main craft: this segment's key, tempo, density, and chord progression
//!
//! Continues the prior segment's main program at its next sequence binding
//! when one exists and stays tag-compatible; otherwise rolls the weighted
//! selector over every compatible main program. The chosen binding's
//! sequence stamps the segment's key, tempo, density, and duration, and its
//! chord changes are copied onto the segment with their voicings so the
//! instrument crafts can place events against them.

use crate::craft::program_binding_memes;
use crate::error::{Error, Result};
use crate::fabricator::Fabricator;
use uuid::Uuid;
use weft_common::content::{ProgramType, Sequence};
use weft_common::segment::{SegmentChoice, SegmentChord, SegmentChordVoicing};
use weft_common::timing::beats_to_micros;
use weft_common::Selector;

pub fn craft(fab: &mut Fabricator) -> Result<()> {
    // continuity: advance the prior main program to its next binding
    let prior = fab
        .retrospective()
        .prior_choice(ProgramType::Main, None, None)
        .cloned();
    if let Some(prior) = prior {
        if let (Some(program_id), Some(prior_offset)) = (prior.program_id, prior.binding_offset) {
            if try_continue(fab, program_id, prior_offset + 1)? {
                return Ok(());
            }
        }
    }

    let mut pool: Selector<Uuid> = Selector::new();
    let candidates = fab.content().programs_of_type(ProgramType::Main);
    if candidates.is_empty() {
        fab.report_gap("no main programs in content");
        return Ok(());
    }
    for program in &candidates {
        let Some(binding) = fab.content().binding_at_offset(program.id, 0) else {
            continue;
        };
        let memes = program_binding_memes(program, binding)?;
        if fab.is_allowed(&memes) {
            pool.add(program.density.max(0.0), program.id);
        }
    }

    let Some(program_id) = pool.pick(fab.rng()) else {
        fab.report_gap("no tag-compatible main program qualifies");
        return Ok(());
    };
    commit(fab, program_id, 0)
}

/// Carry the main program forward at `offset` when a compatible binding
/// exists there; false means the progression is exhausted
fn try_continue(fab: &mut Fabricator, program_id: Uuid, offset: u32) -> Result<bool> {
    let Some(program) = fab.content().program(program_id) else {
        fab.report_gap(format!("prior main program {} missing from content", program_id));
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
    let Some(program) = fab.content().program(program_id).cloned() else {
        fab.report_gap(format!("main program {} missing from content", program_id));
        return Ok(());
    };
    let Some(binding) = fab.content().binding_at_offset(program_id, offset).cloned() else {
        fab.report_gap(format!(
            "main program {} has no binding at offset {}",
            program.name, offset
        ));
        return Ok(());
    };
    let Some(sequence) = fab.content().sequence(binding.sequence_id).cloned() else {
        fab.report_gap(format!(
            "binding {} references missing sequence {}",
            binding.id, binding.sequence_id
        ));
        return Ok(());
    };

    if program.tempo <= 0.0 {
        return Err(Error::Fabrication(format!(
            "main program {} has non-positive tempo {}",
            program.name, program.tempo
        )));
    }
    if sequence.total_beats <= 0.0 {
        return Err(Error::Fabrication(format!(
            "sequence {} has non-positive length {} beats",
            sequence.name, sequence.total_beats
        )));
    }

    let memes = program_binding_memes(&program, &binding)?;
    fab.add_memes(memes)?;

    stamp_segment(fab, &program.key, program.tempo, program.density, &sequence);

    let choice_id = fab.add_choice(SegmentChoice {
        id: Uuid::new_v4(),
        segment_id: fab.segment().id,
        program_type: ProgramType::Main,
        program_id: Some(program_id),
        instrument_id: None,
        instrument_type: None,
        instrument_mode: None,
        binding_offset: Some(offset),
        transpose: 0,
    })?;
    fab.add_arrangement(choice_id, Some(sequence.id))?;

    for chord in &sequence.chords {
        fab.add_chord(SegmentChord {
            id: Uuid::new_v4(),
            segment_id: fab.segment().id,
            position_beats: chord.position_beats,
            name: chord.name.clone(),
            voicings: chord
                .voicings
                .iter()
                .map(|(instrument_type, notes)| SegmentChordVoicing {
                    instrument_type: *instrument_type,
                    notes: notes.clone(),
                })
                .collect(),
        });
    }
    Ok(())
}

/// Write the chosen sequence's musical parameters onto the segment
fn stamp_segment(fab: &mut Fabricator, key: &str, tempo: f64, density: f64, sequence: &Sequence) {
    let duration = beats_to_micros(sequence.total_beats, tempo);
    let segment = fab.segment_mut();
    segment.key = sequence.key.clone().unwrap_or_else(|| key.to_string());
    segment.tempo = tempo;
    segment.density = density;
    segment.duration_micros = duration;
}
