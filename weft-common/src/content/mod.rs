//! Content entities: the typed musical material the engine selects from
//!
//! These records mirror what the external cataloging service supplies —
//! programs, sequences, sequence bindings, instruments, instrument audios,
//! and their tag lists. They are plain data: the engine performs no
//! validation at ingest beyond what craft decisions require, and nothing
//! here mutates after the snapshot is built.

pub mod snapshot;

pub use snapshot::ContentSnapshot;

use crate::error::Result;
use crate::meme::Meme;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Program type: which craft a program feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramType {
    /// Long-range arc of the chain
    Macro,
    /// Key, tempo, density, and chord progression per segment
    Main,
    /// Rhythmic foundation
    Rhythm,
    /// Harmonic detail layers
    Detail,
    /// Recurring motif
    Hook,
    /// Boundary flourish
    Transition,
    /// Repeating percussion loop
    PercLoop,
}

/// Instrument type: which instrument-backed craft an instrument serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    Rhythm,
    Detail,
    Hook,
    Transition,
    PercLoop,
}

/// How an instrument's audio is placed in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentMode {
    /// Discrete events placed at chord/pattern positions
    Event,
    /// Audio laid down repeatedly across the whole segment
    Loop,
}

/// A program: a composed unit of musical intent owning sequences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub program_type: ProgramType,
    /// Musical key, e.g. "C minor"
    pub key: String,
    /// Beats per minute
    pub tempo: f64,
    /// Relative density 0.0..=1.0, used as selection weight
    pub density: f64,
    /// Raw tag text as supplied by the catalog
    pub memes: Vec<String>,
}

impl Program {
    /// Parse this program's tag list
    pub fn parsed_memes(&self) -> Result<Vec<Meme>> {
        Meme::parse_all(&self.memes)
    }
}

/// A sequence: one section of a program, with its chord changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    /// Length of this sequence in beats
    pub total_beats: f64,
    /// Optional key override for this section
    pub key: Option<String>,
    /// Chord changes at beat positions within the sequence
    pub chords: Vec<SequenceChord>,
}

/// A chord change within a sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceChord {
    /// Beat position within the sequence
    pub position_beats: f64,
    /// Chord name, e.g. "C minor 7"
    pub name: String,
    /// Note voicings per instrument type, e.g. "C4, Eb4, G4"
    pub voicings: HashMap<InstrumentType, String>,
}

/// A sequence binding: one ordered position of a sequence within its program
///
/// Bindings carry their own tags; choosing a binding propagates those tags
/// onto the segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceBinding {
    pub id: Uuid,
    pub program_id: Uuid,
    pub sequence_id: Uuid,
    /// Ordinal position within the program (0-based)
    pub offset: u32,
    /// Raw tag text as supplied by the catalog
    pub memes: Vec<String>,
}

impl SequenceBinding {
    /// Parse this binding's tag list
    pub fn parsed_memes(&self) -> Result<Vec<Meme>> {
        Meme::parse_all(&self.memes)
    }
}

/// An instrument: a collection of audios serving one (type, mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub id: Uuid,
    pub name: String,
    pub instrument_type: InstrumentType,
    pub mode: InstrumentMode,
    /// Base amplitude applied to every pick of this instrument
    pub volume: f64,
    /// Relative density 0.0..=1.0, used as selection weight
    pub density: f64,
    /// Carry the previous segment's audio selection forward instead of
    /// re-rolling, preserving continuity across segment boundaries
    pub audio_selection_persistent: bool,
    /// Raw tag text as supplied by the catalog
    pub memes: Vec<String>,
}

impl Instrument {
    /// Parse this instrument's tag list
    pub fn parsed_memes(&self) -> Result<Vec<Meme>> {
        Meme::parse_all(&self.memes)
    }
}

/// One waveform belonging to an instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentAudio {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub name: String,
    /// Key the byte-fetch collaborator resolves to raw encoded audio
    pub waveform_key: String,
    /// Loop length in beats at the audio's native tempo (loop mode)
    pub loop_beats: f64,
    /// Native tempo of the recorded fragment
    pub tempo: f64,
    /// Root pitch in Hz
    pub pitch: f64,
    /// Tonal quality, e.g. "major"; empty when atonal
    pub tonality: String,
    /// Amplitude of this audio relative to its instrument
    pub volume: f64,
    /// Event label, e.g. "KICK", "SNARE"
    pub event: String,
}
