//! Segment model: the unit of fabrication and everything it produces
//!
//! A segment is a fixed time span of one chain. Its state advances strictly
//! forward (`Planned → Crafting → Crafted → Dubbing → Dubbed`), with
//! `Failed` terminal from any non-terminal state. Crafting fills the
//! per-segment records defined here — choices, arrangements, picks, chords,
//! memes, messages — which the external persistence layer consumes once the
//! segment is committed.

use crate::content::{InstrumentMode, InstrumentType, ProgramType};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Segment lifecycle state, strictly forward-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentState {
    /// Scheduled, not yet being crafted
    Planned,

    /// A fabricator is producing this segment's records
    Crafting,

    /// Records committed; safe for retrospective reads
    Crafted,

    /// The mixer is rendering this segment's picks
    Dubbing,

    /// Rendered audio shipped; terminal
    Dubbed,

    /// Unrecoverable error; terminal until externally cleared
    Failed,
}

impl SegmentState {
    /// Whether the state machine permits moving to `to`
    ///
    /// Forward-only: each working state admits exactly its successor, and
    /// every non-terminal state admits `Failed`.
    pub fn can_transition(self, to: SegmentState) -> bool {
        use SegmentState::*;
        match (self, to) {
            (Planned, Crafting)
            | (Crafting, Crafted)
            | (Crafted, Dubbing)
            | (Dubbing, Dubbed) => true,
            (Planned | Crafting | Crafted | Dubbing, Failed) => true,
            _ => false,
        }
    }

    /// True for `Dubbed` and `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, SegmentState::Dubbed | SegmentState::Failed)
    }

    /// A segment may be read retrospectively once its records are committed
    pub fn is_readable(self) -> bool {
        matches!(
            self,
            SegmentState::Crafted | SegmentState::Dubbing | SegmentState::Dubbed
        )
    }
}

impl std::fmt::Display for SegmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SegmentState::Planned => "Planned",
            SegmentState::Crafting => "Crafting",
            SegmentState::Crafted => "Crafted",
            SegmentState::Dubbing => "Dubbing",
            SegmentState::Dubbed => "Dubbed",
            SegmentState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// One fixed time span of a chain
///
/// Offset is unique and monotonic within the chain; begin/duration are
/// microseconds on the chain timeline. Key, tempo, and density are stamped
/// by the main craft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub chain_id: Uuid,
    /// Ordinal position within the chain
    pub offset: u64,
    pub state: SegmentState,
    /// Start on the chain timeline, microseconds
    pub begin_micros: i64,
    /// Span length, microseconds
    pub duration_micros: i64,
    pub key: String,
    pub tempo: f64,
    pub density: f64,
    /// Key under which the rendered audio ships
    pub waveform_key: String,
}

impl Segment {
    /// Plan a new segment at the given chain offset
    pub fn planned(chain_id: Uuid, offset: u64, begin_micros: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain_id,
            offset,
            state: SegmentState::Planned,
            begin_micros,
            duration_micros: 0,
            key: String::new(),
            tempo: 0.0,
            density: 0.0,
            waveform_key: String::new(),
        }
    }

    /// Advance the state machine
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] when the move is not forward-only.
    pub fn transition(&mut self, to: SegmentState) -> Result<()> {
        if !self.state.can_transition(to) {
            return Err(Error::InvalidTransition(format!(
                "segment {} offset {}: {} -> {}",
                self.id, self.offset, self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// End of this segment on the chain timeline, microseconds
    pub fn end_micros(&self) -> i64 {
        self.begin_micros + self.duration_micros
    }
}

/// The (program-type, instrument-type, instrument-mode) slot a choice fills
///
/// A segment holds at most one choice per slot.
pub type ChoiceSlot = (ProgramType, Option<InstrumentType>, Option<InstrumentMode>);

/// One selected program or instrument for a segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChoice {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub program_type: ProgramType,
    /// Chosen program (macro/main crafts)
    pub program_id: Option<Uuid>,
    /// Chosen instrument (instrument-backed crafts)
    pub instrument_id: Option<Uuid>,
    pub instrument_type: Option<InstrumentType>,
    pub instrument_mode: Option<InstrumentMode>,
    /// Offset of the sequence binding carried from the prior segment, when
    /// this choice continues one
    pub binding_offset: Option<u32>,
    /// Semitones this choice is transposed against its program's key
    pub transpose: i32,
}

impl SegmentChoice {
    /// The uniqueness slot this choice occupies
    pub fn slot(&self) -> ChoiceSlot {
        (self.program_type, self.instrument_type, self.instrument_mode)
    }
}

/// Binds a choice to a concrete sequence within the chosen program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentArrangement {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub choice_id: Uuid,
    pub sequence_id: Option<Uuid>,
}

/// A concrete placement of one instrument audio in segment time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentPick {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub arrangement_id: Uuid,
    pub audio_id: Uuid,
    /// Start relative to segment begin, microseconds
    pub start_micros: i64,
    /// Audible length, microseconds
    pub length_micros: i64,
    /// 0.0..=1.0
    pub amplitude: f64,
    /// Event label carried from the audio, e.g. "KICK"
    pub event: String,
}

/// Harmonic content at a position within the segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChord {
    pub id: Uuid,
    pub segment_id: Uuid,
    /// Beat position within the segment
    pub position_beats: f64,
    pub name: String,
    pub voicings: Vec<SegmentChordVoicing>,
}

/// Per-instrument-type note voicing of a segment chord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChordVoicing {
    pub instrument_type: InstrumentType,
    /// Note list, e.g. "C4, Eb4, G4"
    pub notes: String,
}

/// One resolved tag carried by a segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMeme {
    pub id: Uuid,
    pub segment_id: Uuid,
    /// Raw tag text, e.g. "!LEMONS"
    pub name: String,
}

/// Severity of a segment message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Non-fatal diagnostic attached to a segment
///
/// Content gaps (no qualifying program/instrument/audio for a craft step)
/// land here instead of aborting the segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMessage {
    pub id: Uuid,
    pub segment_id: Uuid,
    pub severity: MessageSeverity,
    pub body: String,
}

// ========================================
// Tests
// ========================================
