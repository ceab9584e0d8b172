//! Instrument crafts: rhythm, percussion loop, hook, transition, detail
//!
//! One run per (instrument type, mode) slot. Selection is filtered three
//! ways before the weighted selector breaks ties: meme compatibility of the
//! instrument's tags against the segment's accumulated set, chord/voicing
//! compatibility for event-mode audio, and prior-choice continuity — an
//! instrument marked persistent carries its previous segment's audio
//! forward without touching the selector.
//!
//! Loop-mode audio is laid down repeatedly from offset 0, advancing by the
//! audio's loop length in beats at the segment tempo; the final repetition
//! truncates at the segment boundary. Event-mode audio is placed at each
//! qualifying chord position, sounding until the next chord or the segment
//! end.

use crate::craft::parse_memes;
use crate::error::{Error, Result};
use crate::fabricator::Fabricator;
use tracing::debug;
use uuid::Uuid;
use weft_common::content::{Instrument, InstrumentAudio, InstrumentMode, InstrumentType, ProgramType};
use weft_common::segment::SegmentChoice;
use weft_common::Selector;

pub fn craft(
    fab: &mut Fabricator,
    program_type: ProgramType,
    instrument_type: InstrumentType,
) -> Result<()> {
    if fab.segment().tempo <= 0.0 {
        fab.report_gap(format!(
            "{:?} craft skipped: no main program stamped a tempo",
            instrument_type
        ));
        return Ok(());
    }
    for mode in [InstrumentMode::Loop, InstrumentMode::Event] {
        craft_slot(fab, program_type, instrument_type, mode)?;
    }
    Ok(())
}

/// One audible placement computed before any record is written
struct Laydown {
    start_micros: i64,
    length_micros: i64,
    event: String,
}

fn craft_slot(
    fab: &mut Fabricator,
    program_type: ProgramType,
    instrument_type: InstrumentType,
    mode: InstrumentMode,
) -> Result<()> {
    // a slot no instrument serves is skipped outright, not reported
    if fab.content().instruments_of(instrument_type, mode).is_empty() {
        debug!(
            "segment {}: no {:?}/{:?} instruments, slot skipped",
            fab.segment().offset,
            instrument_type,
            mode
        );
        return Ok(());
    }

    if continue_prior(fab, program_type, instrument_type, mode)? {
        return Ok(());
    }

    // fresh selection among tag-compatible instruments
    let mut pool: Selector<Uuid> = Selector::new();
    for instrument in fab.content().instruments_of(instrument_type, mode) {
        let memes = parse_memes(&instrument.memes, &format!("instrument {}", instrument.name))?;
        if fab.is_allowed(&memes) {
            pool.add(instrument.density.max(0.0), instrument.id);
        }
    }
    let Some(instrument_id) = pool.pick(fab.rng()) else {
        fab.report_gap(format!(
            "no tag-compatible {:?}/{:?} instrument qualifies",
            instrument_type, mode
        ));
        return Ok(());
    };
    let instrument = fab
        .content()
        .instrument(instrument_id)
        .cloned()
        .ok_or_else(|| Error::Internal(format!("selected instrument {} vanished", instrument_id)))?;

    // then one of its audios, chord-filtered for event placement
    let mut audio_pool: Selector<Uuid> = Selector::new();
    for audio in fab.content().audios_of_instrument(instrument_id) {
        if mode == InstrumentMode::Event && !audio_fits_chords(fab, audio) {
            continue;
        }
        audio_pool.add(1.0, audio.id);
    }
    let Some(audio_id) = audio_pool.pick(fab.rng()) else {
        fab.report_gap(format!(
            "instrument {} has no chord-compatible audio",
            instrument.name
        ));
        return Ok(());
    };

    place(fab, program_type, &instrument, audio_id, mode)
}

/// Reuse the prior segment's choice for this slot when the instrument marks
/// its audio selection persistent; true when the slot was filled that way
fn continue_prior(
    fab: &mut Fabricator,
    program_type: ProgramType,
    instrument_type: InstrumentType,
    mode: InstrumentMode,
) -> Result<bool> {
    let Some(prior) = fab
        .retrospective()
        .prior_choice(program_type, Some(instrument_type), Some(mode))
        .cloned()
    else {
        return Ok(false);
    };
    let Some(instrument_id) = prior.instrument_id else {
        return Ok(false);
    };
    let Some(instrument) = fab.content().instrument(instrument_id).cloned() else {
        fab.report_gap(format!(
            "prior {:?} instrument {} missing from content",
            instrument_type, instrument_id
        ));
        return Ok(false);
    };
    if !instrument.audio_selection_persistent {
        return Ok(false);
    }
    let Some(audio_id) = fab.retrospective().prior_audio_for(&prior) else {
        return Ok(false);
    };
    if fab.content().audio(audio_id).is_none() {
        fab.report_gap(format!(
            "prior audio {} for instrument {} missing from content",
            audio_id, instrument.name
        ));
        return Ok(false);
    }

    // carried choices still obey the compatibility theorem
    let memes = parse_memes(&instrument.memes, &format!("instrument {}", instrument.name))?;
    if !fab.is_allowed(&memes) {
        return Ok(false);
    }

    debug!(
        "segment {}: carrying {:?}/{:?} audio {} forward",
        fab.segment().offset,
        instrument_type,
        mode,
        audio_id
    );
    place(fab, program_type, &instrument, audio_id, mode)?;
    Ok(true)
}

/// Record the choice, arrangement, memes, and picks for one selected audio
fn place(
    fab: &mut Fabricator,
    program_type: ProgramType,
    instrument: &Instrument,
    audio_id: Uuid,
    mode: InstrumentMode,
) -> Result<()> {
    let audio = fab
        .content()
        .audio(audio_id)
        .cloned()
        .ok_or_else(|| Error::Internal(format!("selected audio {} vanished", audio_id)))?;

    let laydowns = match mode {
        InstrumentMode::Loop => loop_laydowns(fab, &audio)?,
        InstrumentMode::Event => event_laydowns(fab, &audio)?,
    };
    if laydowns.is_empty() {
        fab.report_gap(format!(
            "audio {} of instrument {} has nowhere to sound",
            audio.name, instrument.name
        ));
        return Ok(());
    }

    let memes = parse_memes(&instrument.memes, &format!("instrument {}", instrument.name))?;
    fab.add_memes(memes)?;

    let choice_id = fab.add_choice(SegmentChoice {
        id: Uuid::new_v4(),
        segment_id: fab.segment().id,
        program_type,
        program_id: None,
        instrument_id: Some(instrument.id),
        instrument_type: Some(instrument.instrument_type),
        instrument_mode: Some(mode),
        binding_offset: None,
        transpose: 0,
    })?;
    let arrangement_id = fab.add_arrangement(choice_id, None)?;

    let amplitude = (instrument.volume * audio.volume).clamp(0.0, 1.0);
    for laydown in laydowns {
        fab.add_pick(
            arrangement_id,
            audio_id,
            laydown.start_micros,
            laydown.length_micros,
            amplitude,
            laydown.event,
        )?;
    }
    Ok(())
}

/// Repeated placement across the whole segment, truncated at the boundary
fn loop_laydowns(fab: &Fabricator, audio: &InstrumentAudio) -> Result<Vec<Laydown>> {
    if audio.loop_beats <= 0.0 {
        return Err(Error::Fabrication(format!(
            "loop audio {} declares non-positive loop length {} beats",
            audio.name, audio.loop_beats
        )));
    }
    let loop_micros = fab.beat_micros(audio.loop_beats)?;
    let total = fab.segment().duration_micros;

    let mut laydowns = Vec::new();
    let mut start = 0i64;
    while start < total {
        laydowns.push(Laydown {
            start_micros: start,
            length_micros: loop_micros.min(total - start),
            event: audio.event.clone(),
        });
        start += loop_micros;
    }
    Ok(laydowns)
}

/// One placement per qualifying chord position, sounding until the next
/// chord or the segment end; a chordless segment gets a single full-length
/// placement at offset 0
fn event_laydowns(fab: &Fabricator, audio: &InstrumentAudio) -> Result<Vec<Laydown>> {
    let total = fab.segment().duration_micros;
    let chords = fab.chords();
    if chords.is_empty() {
        return Ok(vec![Laydown {
            start_micros: 0,
            length_micros: total,
            event: audio.event.clone(),
        }]);
    }

    let instrument_type = fab
        .content()
        .instrument(audio.instrument_id)
        .map(|i| i.instrument_type);

    let mut positions: Vec<(f64, String)> = chords
        .iter()
        .filter(|chord| {
            tonality_matches(&audio.tonality, &chord.name)
                && instrument_type
                    .map(|t| chord.voicings.iter().any(|v| v.instrument_type == t))
                    .unwrap_or(false)
        })
        .map(|chord| (chord.position_beats, chord.name.clone()))
        .collect();
    positions.sort_by(|a, b| a.0.total_cmp(&b.0));

    let next_starts: Vec<i64> = {
        // every chord bounds the previous placement, qualifying or not
        let mut all: Vec<f64> = chords.iter().map(|c| c.position_beats).collect();
        all.sort_by(|a, b| a.total_cmp(b));
        all.iter().map(|b| fab.beat_micros(*b)).collect::<Result<_>>()?
    };

    let mut laydowns = Vec::new();
    for (beats, _name) in positions {
        let start = fab.beat_micros(beats)?;
        if start >= total {
            continue;
        }
        let end = next_starts
            .iter()
            .copied()
            .find(|&s| s > start)
            .unwrap_or(total)
            .min(total);
        if end <= start {
            continue;
        }
        laydowns.push(Laydown {
            start_micros: start,
            length_micros: end - start,
            event: audio.event.clone(),
        });
    }
    Ok(laydowns)
}

/// Whether an event-mode audio can sound anywhere in the segment: a
/// chordless segment always fits (a single full-length placement follows);
/// otherwise at least one chord must match the audio's tonality and carry a
/// voicing for the instrument's type. Mirrors the per-chord filter in
/// `event_laydowns` so the pool pre-filter and the laydown pass agree.
fn audio_fits_chords(fab: &Fabricator, audio: &InstrumentAudio) -> bool {
    let chords = fab.chords();
    if chords.is_empty() {
        return true;
    }
    let instrument_type = fab
        .content()
        .instrument(audio.instrument_id)
        .map(|i| i.instrument_type);
    chords.iter().any(|chord| {
        tonality_matches(&audio.tonality, &chord.name)
            && instrument_type
                .map(|t| chord.voicings.iter().any(|v| v.instrument_type == t))
                .unwrap_or(false)
    })
}

/// An atonal audio fits any chord; a tonal one fits chords naming its
/// tonality
fn tonality_matches(tonality: &str, chord_name: &str) -> bool {
    tonality.is_empty()
        || chord_name
            .to_uppercase()
            .contains(&tonality.to_uppercase())
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tonality_matching() {
        assert!(tonality_matches("", "C minor 7"));
        assert!(tonality_matches("minor", "C minor 7"));
        assert!(tonality_matches("Minor", "c MINOR"));
        assert!(!tonality_matches("major", "C minor 7"));
    }
}
