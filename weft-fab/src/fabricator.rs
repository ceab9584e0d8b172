//! Fabricator: per-segment orchestration of the craft pipeline
//!
//! One fabricator exists for exactly one segment. It borrows the shared
//! content snapshot and meme stack, carries an immutable [`Retrospective`]
//! of the prior segment's committed records, and buffers everything the
//! crafts produce — choices, arrangements, picks, chords, memes, messages —
//! until [`Fabricator::commit`] hands the whole set over atomically.
//!
//! Missing-content conditions are values here, not errors: crafts call
//! [`Fabricator::report_gap`] and continue. Only malformed content and
//! invariant violations (a self-invalid meme set, a duplicate choice slot)
//! raise fabrication errors, which fail this segment alone.

use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;
use weft_common::content::{ContentSnapshot, InstrumentMode, InstrumentType, ProgramType};
use weft_common::meme::{Meme, MemeStack};
use weft_common::segment::{
    ChoiceSlot, MessageSeverity, Segment, SegmentArrangement, SegmentChoice, SegmentChord,
    SegmentMeme, SegmentMessage, SegmentPick, SegmentState,
};
use weft_common::timing::beats_to_micros;

/// The complete record set one craft/dub cycle produces for a segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecords {
    pub segment: Segment,
    pub choices: Vec<SegmentChoice>,
    pub arrangements: Vec<SegmentArrangement>,
    pub picks: Vec<SegmentPick>,
    pub chords: Vec<SegmentChord>,
    pub memes: Vec<SegmentMeme>,
    pub messages: Vec<SegmentMessage>,
}

/// Immutable snapshot of the prior segment's committed records
///
/// Captured once at fabricator construction and never re-read, so segment
/// N depends only on a frozen copy of segment N−1's results. Construction
/// refuses segments that have not committed their records yet.
#[derive(Debug, Clone, Default)]
pub struct Retrospective {
    records: Option<SegmentRecords>,
}

impl Retrospective {
    /// No prior segment (chain start, or prior Failed)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Freeze a committed prior segment's records
    ///
    /// # Errors
    ///
    /// [`Error::Fabrication`] when the segment is not yet readable — a
    /// mid-craft read is a race the state machine forbids.
    pub fn from_committed(records: SegmentRecords) -> Result<Self> {
        if !records.segment.state.is_readable() {
            return Err(Error::Fabrication(format!(
                "segment at offset {} is {} and cannot be read retrospectively",
                records.segment.offset, records.segment.state
            )));
        }
        Ok(Self {
            records: Some(records),
        })
    }

    /// The prior segment, when one is held
    pub fn prior_segment(&self) -> Option<&Segment> {
        self.records.as_ref().map(|r| &r.segment)
    }

    /// The prior segment's choice for a slot, when one was made
    pub fn prior_choice(
        &self,
        program_type: ProgramType,
        instrument_type: Option<InstrumentType>,
        instrument_mode: Option<InstrumentMode>,
    ) -> Option<&SegmentChoice> {
        let slot: ChoiceSlot = (program_type, instrument_type, instrument_mode);
        self.records
            .as_ref()?
            .choices
            .iter()
            .find(|c| c.slot() == slot)
    }

    /// The audio the prior segment picked under a choice, for persistent
    /// audio continuity
    pub fn prior_audio_for(&self, choice: &SegmentChoice) -> Option<Uuid> {
        let records = self.records.as_ref()?;
        let arrangement_ids: HashSet<Uuid> = records
            .arrangements
            .iter()
            .filter(|a| a.choice_id == choice.id)
            .map(|a| a.id)
            .collect();
        records
            .picks
            .iter()
            .find(|p| arrangement_ids.contains(&p.arrangement_id))
            .map(|p| p.audio_id)
    }
}

/// Per-segment craft orchestrator and write buffer
pub struct Fabricator<'a> {
    content: &'a ContentSnapshot,
    meme_stack: &'a MemeStack,
    retrospective: Retrospective,
    segment: Segment,
    memes: Vec<Meme>,
    choices: Vec<SegmentChoice>,
    arrangements: Vec<SegmentArrangement>,
    picks: Vec<SegmentPick>,
    chords: Vec<SegmentChord>,
    messages: Vec<SegmentMessage>,
    rng: StdRng,
}

impl<'a> Fabricator<'a> {
    /// Begin crafting one segment
    ///
    /// Transitions the segment `Planned → Crafting`; rejects segments in
    /// any other state.
    pub fn new(
        content: &'a ContentSnapshot,
        meme_stack: &'a MemeStack,
        mut segment: Segment,
        retrospective: Retrospective,
    ) -> Result<Self> {
        segment.transition(SegmentState::Crafting)?;
        Ok(Self {
            content,
            meme_stack,
            retrospective,
            segment,
            memes: Vec::new(),
            choices: Vec::new(),
            arrangements: Vec::new(),
            picks: Vec::new(),
            chords: Vec::new(),
            messages: Vec::new(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Same, with a fixed RNG seed for reproducible fabrication
    pub fn with_seed(
        content: &'a ContentSnapshot,
        meme_stack: &'a MemeStack,
        segment: Segment,
        retrospective: Retrospective,
        seed: u64,
    ) -> Result<Self> {
        let mut fabricator = Self::new(content, meme_stack, segment, retrospective)?;
        fabricator.rng = StdRng::seed_from_u64(seed);
        Ok(fabricator)
    }

    pub fn content(&self) -> &'a ContentSnapshot {
        self.content
    }

    pub fn retrospective(&self) -> &Retrospective {
        &self.retrospective
    }

    /// Choices recorded so far this segment
    pub fn choices(&self) -> &[SegmentChoice] {
        &self.choices
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Mutable segment access for the main craft's key/tempo/duration stamp
    pub fn segment_mut(&mut self) -> &mut Segment {
        &mut self.segment
    }

    /// Randomness for the weighted selectors
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Tags accumulated so far across all choices
    pub fn memes(&self) -> &[Meme] {
        &self.memes
    }

    /// Chords stamped on this segment so far
    pub fn chords(&self) -> &[SegmentChord] {
        &self.chords
    }

    /// Would `incoming` legally join the accumulated tag set?
    pub fn is_allowed(&self, incoming: &[Meme]) -> bool {
        self.meme_stack.is_allowed(&self.memes, incoming)
    }

    /// Commit incoming tags to the segment's set
    ///
    /// # Errors
    ///
    /// [`Error::Fabrication`] when the union fails self-validity — a
    /// contradiction slipped past per-choice filtering.
    pub fn add_memes(&mut self, incoming: Vec<Meme>) -> Result<()> {
        let mut candidate = self.memes.clone();
        for meme in incoming {
            if !candidate.contains(&meme) {
                candidate.push(meme);
            }
        }
        if !self.meme_stack.is_valid(&candidate) {
            return Err(Error::Fabrication(format!(
                "segment {} meme set became self-invalid: {:?}",
                self.segment.offset,
                candidate.iter().map(|m| m.to_string()).collect::<Vec<_>>()
            )));
        }
        self.memes = candidate;
        Ok(())
    }

    /// Record a choice; at most one per (program-type, instrument-type,
    /// instrument-mode) slot
    pub fn add_choice(&mut self, choice: SegmentChoice) -> Result<Uuid> {
        if self.choices.iter().any(|c| c.slot() == choice.slot()) {
            return Err(Error::Fabrication(format!(
                "segment {} already holds a choice for slot {:?}",
                self.segment.offset,
                choice.slot()
            )));
        }
        let id = choice.id;
        self.choices.push(choice);
        Ok(id)
    }

    /// Record an arrangement under a previously added choice
    pub fn add_arrangement(&mut self, choice_id: Uuid, sequence_id: Option<Uuid>) -> Result<Uuid> {
        if !self.choices.iter().any(|c| c.id == choice_id) {
            return Err(Error::Fabrication(format!(
                "arrangement references unknown choice {}",
                choice_id
            )));
        }
        let arrangement = SegmentArrangement {
            id: Uuid::new_v4(),
            segment_id: self.segment.id,
            choice_id,
            sequence_id,
        };
        let id = arrangement.id;
        self.arrangements.push(arrangement);
        Ok(id)
    }

    /// Record one audio placement under an arrangement
    pub fn add_pick(
        &mut self,
        arrangement_id: Uuid,
        audio_id: Uuid,
        start_micros: i64,
        length_micros: i64,
        amplitude: f64,
        event: impl Into<String>,
    ) -> Result<()> {
        if !self.arrangements.iter().any(|a| a.id == arrangement_id) {
            return Err(Error::Fabrication(format!(
                "pick references unknown arrangement {}",
                arrangement_id
            )));
        }
        if start_micros < 0 || length_micros <= 0 {
            return Err(Error::Fabrication(format!(
                "pick has degenerate span: start {}µs length {}µs",
                start_micros, length_micros
            )));
        }
        self.picks.push(SegmentPick {
            id: Uuid::new_v4(),
            segment_id: self.segment.id,
            arrangement_id,
            audio_id,
            start_micros,
            length_micros,
            amplitude: amplitude.clamp(0.0, 1.0),
            event: event.into(),
        });
        Ok(())
    }

    /// Stamp one chord (with voicings) on the segment
    pub fn add_chord(&mut self, chord: SegmentChord) {
        self.chords.push(chord);
    }

    /// Record a non-fatal missing-entity condition and keep crafting
    pub fn report_gap(&mut self, body: impl Into<String>) {
        let body = body.into();
        debug!("segment {} content gap: {}", self.segment.offset, body);
        self.messages.push(SegmentMessage {
            id: Uuid::new_v4(),
            segment_id: self.segment.id,
            severity: MessageSeverity::Warning,
            body,
        });
    }

    /// Record an informational message
    pub fn report_info(&mut self, body: impl Into<String>) {
        self.messages.push(SegmentMessage {
            id: Uuid::new_v4(),
            segment_id: self.segment.id,
            severity: MessageSeverity::Info,
            body: body.into(),
        });
    }

    /// Microseconds from segment start for a beat position, at the
    /// segment's stamped tempo
    pub fn beat_micros(&self, beats: f64) -> Result<i64> {
        if self.segment.tempo <= 0.0 {
            return Err(Error::Fabrication(format!(
                "segment {} has no tempo; main craft must run first",
                self.segment.offset
            )));
        }
        Ok(beats_to_micros(beats, self.segment.tempo))
    }

    /// Abandon crafting after an unrecoverable error: `Crafting → Failed`,
    /// returning whatever records accumulated plus an error message
    ///
    /// The failed record set ships to the persistence collaborator like any
    /// other, so the failure is observable; it is never readable
    /// retrospectively.
    pub fn fail(mut self, reason: &str) -> SegmentRecords {
        // Crafting -> Failed is always a legal move
        let _ = self.segment.transition(SegmentState::Failed);
        self.messages.push(SegmentMessage {
            id: Uuid::new_v4(),
            segment_id: self.segment.id,
            severity: MessageSeverity::Error,
            body: reason.to_string(),
        });
        let memes = self
            .memes
            .iter()
            .map(|m| SegmentMeme {
                id: Uuid::new_v4(),
                segment_id: self.segment.id,
                name: m.to_string(),
            })
            .collect();
        SegmentRecords {
            segment: self.segment,
            choices: self.choices,
            arrangements: self.arrangements,
            picks: self.picks,
            chords: self.chords,
            memes,
            messages: self.messages,
        }
    }

    /// Close out crafting: final validity check, `Crafting → Crafted`, and
    /// the atomic record set
    pub fn commit(mut self) -> Result<SegmentRecords> {
        if !self.meme_stack.is_valid(&self.memes) {
            return Err(Error::Fabrication(format!(
                "segment {} committed an invalid meme set",
                self.segment.offset
            )));
        }
        self.segment.transition(SegmentState::Crafted)?;

        let memes = self
            .memes
            .iter()
            .map(|m| SegmentMeme {
                id: Uuid::new_v4(),
                segment_id: self.segment.id,
                name: m.to_string(),
            })
            .collect();

        Ok(SegmentRecords {
            segment: self.segment,
            choices: self.choices,
            arrangements: self.arrangements,
            picks: self.picks,
            chords: self.chords,
            memes,
            messages: self.messages,
        })
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    fn planned_segment() -> Segment {
        let mut segment = Segment::planned(Uuid::new_v4(), 0, 0);
        segment.tempo = 120.0;
        segment.duration_micros = 8_000_000;
        segment
    }

    fn choice(slot_type: ProgramType) -> SegmentChoice {
        SegmentChoice {
            id: Uuid::new_v4(),
            segment_id: Uuid::new_v4(),
            program_type: slot_type,
            program_id: Some(Uuid::new_v4()),
            instrument_id: None,
            instrument_type: None,
            instrument_mode: None,
            binding_offset: None,
            transpose: 0,
        }
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let content = ContentSnapshot::default();
        let stack = MemeStack::new();
        let mut fab =
            Fabricator::new(&content, &stack, planned_segment(), Retrospective::empty()).unwrap();

        fab.add_choice(choice(ProgramType::Main)).unwrap();
        let err = fab.add_choice(choice(ProgramType::Main)).unwrap_err();
        assert!(matches!(err, Error::Fabrication(_)));
        // a different slot is fine
        fab.add_choice(choice(ProgramType::Macro)).unwrap();
    }

    #[test]
    fn test_add_memes_rejects_contradiction() {
        let content = ContentSnapshot::default();
        let stack = MemeStack::new();
        let mut fab =
            Fabricator::new(&content, &stack, planned_segment(), Retrospective::empty()).unwrap();

        fab.add_memes(Meme::parse_all(["LEMONS"]).unwrap()).unwrap();
        let err = fab
            .add_memes(Meme::parse_all(["!LEMONS"]).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Fabrication(_)));
        // the buffered set is untouched after rejection
        assert_eq!(fab.memes().len(), 1);
    }

    #[test]
    fn test_gap_is_a_message_not_an_error() {
        let content = ContentSnapshot::default();
        let stack = MemeStack::new();
        let mut fab =
            Fabricator::new(&content, &stack, planned_segment(), Retrospective::empty()).unwrap();

        fab.report_gap("no rhythm instrument qualifies");
        let records = fab.commit().unwrap();
        assert_eq!(records.messages.len(), 1);
        assert_eq!(records.messages[0].severity, MessageSeverity::Warning);
        assert_eq!(records.segment.state, SegmentState::Crafted);
    }

    #[test]
    fn test_pick_requires_known_arrangement() {
        let content = ContentSnapshot::default();
        let stack = MemeStack::new();
        let mut fab =
            Fabricator::new(&content, &stack, planned_segment(), Retrospective::empty()).unwrap();

        let err = fab
            .add_pick(Uuid::new_v4(), Uuid::new_v4(), 0, 1_000, 1.0, "KICK")
            .unwrap_err();
        assert!(matches!(err, Error::Fabrication(_)));

        let choice_id = fab.add_choice(choice(ProgramType::Rhythm)).unwrap();
        let arrangement_id = fab.add_arrangement(choice_id, None).unwrap();
        fab.add_pick(arrangement_id, Uuid::new_v4(), 0, 1_000, 1.0, "KICK")
            .unwrap();
    }

    #[test]
    fn test_beat_micros_uses_segment_tempo() {
        let content = ContentSnapshot::default();
        let stack = MemeStack::new();
        let fab =
            Fabricator::new(&content, &stack, planned_segment(), Retrospective::empty()).unwrap();
        assert_eq!(fab.beat_micros(1.0).unwrap(), 500_000);

        let mut no_tempo = Segment::planned(Uuid::new_v4(), 1, 0);
        no_tempo.tempo = 0.0;
        let fab2 = Fabricator::new(&content, &stack, no_tempo, Retrospective::empty()).unwrap();
        assert!(fab2.beat_micros(1.0).is_err());
    }

    #[test]
    fn test_retrospective_refuses_uncommitted_segment() {
        let segment = planned_segment(); // still Planned
        let records = SegmentRecords {
            segment,
            choices: vec![],
            arrangements: vec![],
            picks: vec![],
            chords: vec![],
            memes: vec![],
            messages: vec![],
        };
        assert!(Retrospective::from_committed(records).is_err());
    }

    #[test]
    fn test_retrospective_prior_choice_and_audio() {
        let content = ContentSnapshot::default();
        let stack = MemeStack::new();
        let mut fab =
            Fabricator::new(&content, &stack, planned_segment(), Retrospective::empty()).unwrap();

        let audio_id = Uuid::new_v4();
        let mut prior_choice = choice(ProgramType::Rhythm);
        prior_choice.instrument_id = Some(Uuid::new_v4());
        prior_choice.instrument_type = Some(InstrumentType::Rhythm);
        prior_choice.instrument_mode = Some(InstrumentMode::Loop);
        let choice_id = fab.add_choice(prior_choice).unwrap();
        let arrangement_id = fab.add_arrangement(choice_id, None).unwrap();
        fab.add_pick(arrangement_id, audio_id, 0, 1_000, 1.0, "LOOP")
            .unwrap();

        let retro = Retrospective::from_committed(fab.commit().unwrap()).unwrap();
        let found = retro
            .prior_choice(
                ProgramType::Rhythm,
                Some(InstrumentType::Rhythm),
                Some(InstrumentMode::Loop),
            )
            .unwrap();
        assert_eq!(retro.prior_audio_for(found), Some(audio_id));
        assert!(retro
            .prior_choice(ProgramType::Main, None, None)
            .is_none());
    }
}
