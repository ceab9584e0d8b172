//! Test helpers for weft-fab integration tests
//!
//! Builds a small but fully playable fixture: generated WAV fragments on
//! disk plus a content snapshot wired to them, and collecting
//! implementations of the shipping collaborators so tests can observe what
//! the engine produced.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;
use weft_common::content::{
    ContentSnapshot, Instrument, InstrumentAudio, InstrumentMode, InstrumentType, Program,
    ProgramType, Sequence, SequenceBinding, SequenceChord,
};
use weft_fab::fabricator::SegmentRecords;
use weft_fab::mix::OutputBuffer;
use weft_fab::ship::{AudioShipper, SegmentSink};
use weft_fab::Result;

/// Write a 48kHz stereo 16-bit sine fragment under `dir`
pub fn write_wav(dir: &Path, name: &str, frames: usize) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.join(name), spec).unwrap();
    for i in 0..frames {
        let sample = ((i as f32 * 0.03).sin() * 8_000.0) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

/// Ids the tests assert against
pub struct Fixture {
    pub content: ContentSnapshot,
    pub rhythm_instrument_id: Uuid,
    pub rhythm_audio_ids: Vec<Uuid>,
}

fn program(name: &str, program_type: ProgramType, memes: &[&str]) -> Program {
    Program {
        id: Uuid::new_v4(),
        name: name.into(),
        program_type,
        key: "C".into(),
        tempo: 120.0,
        density: 0.8,
        memes: memes.iter().map(|m| m.to_string()).collect(),
    }
}

fn binding(program_id: Uuid, sequence_id: Uuid, offset: u32, memes: &[&str]) -> SequenceBinding {
    SequenceBinding {
        id: Uuid::new_v4(),
        program_id,
        sequence_id,
        offset,
        memes: memes.iter().map(|m| m.to_string()).collect(),
    }
}

fn audio(instrument_id: Uuid, name: &str, key: &str, tonality: &str, event: &str) -> InstrumentAudio {
    InstrumentAudio {
        id: Uuid::new_v4(),
        instrument_id,
        name: name.into(),
        waveform_key: key.into(),
        loop_beats: 4.0,
        tempo: 120.0,
        pitch: 440.0,
        tonality: tonality.into(),
        volume: 0.8,
        event: event.into(),
    }
}

/// A multi-instrument content set backed by WAV files written under
/// `audio_root`
///
/// Carries a macro program with a two-binding arc, a main program whose
/// sequence stamps 8 beats at 120 BPM with two minor chords, a persistent
/// loop-mode rhythm instrument with two interchangeable audios, and an
/// event-mode detail instrument. Hook, transition, and perc-loop slots are
/// deliberately left without instruments.
pub fn fixture(audio_root: &Path) -> Fixture {
    write_wav(audio_root, "kick.wav", 96_000); // 2s
    write_wav(audio_root, "snare.wav", 96_000);
    write_wav(audio_root, "pad.wav", 96_000);

    let macro_program = program("Arc", ProgramType::Macro, &["NIGHT"]);
    let macro_sequence = Sequence {
        id: Uuid::new_v4(),
        program_id: macro_program.id,
        name: "ArcA".into(),
        total_beats: 32.0,
        key: None,
        chords: vec![],
    };
    let macro_bindings = vec![
        binding(macro_program.id, macro_sequence.id, 0, &["OPENING"]),
        binding(macro_program.id, macro_sequence.id, 1, &["MIDDLE"]),
    ];

    let main_program = program("Flow", ProgramType::Main, &["EARTH"]);
    let main_sequence = Sequence {
        id: Uuid::new_v4(),
        program_id: main_program.id,
        name: "FlowA".into(),
        total_beats: 8.0,
        key: Some("C minor".into()),
        chords: vec![
            SequenceChord {
                position_beats: 0.0,
                name: "C minor".into(),
                voicings: HashMap::from([(InstrumentType::Detail, "C4, Eb4, G4".into())]),
            },
            SequenceChord {
                position_beats: 4.0,
                name: "G minor".into(),
                voicings: HashMap::from([(InstrumentType::Detail, "G3, Bb3, D4".into())]),
            },
        ],
    };
    let main_bindings = vec![
        binding(main_program.id, main_sequence.id, 0, &[]),
        binding(main_program.id, main_sequence.id, 1, &[]),
    ];

    let rhythm = Instrument {
        id: Uuid::new_v4(),
        name: "Drums".into(),
        instrument_type: InstrumentType::Rhythm,
        mode: InstrumentMode::Loop,
        volume: 1.0,
        density: 0.9,
        audio_selection_persistent: true,
        memes: vec!["EARTH".into()],
    };
    let rhythm_audios = vec![
        audio(rhythm.id, "Kick loop", "kick.wav", "", "KICK"),
        audio(rhythm.id, "Snare loop", "snare.wav", "", "SNARE"),
    ];

    let detail = Instrument {
        id: Uuid::new_v4(),
        name: "Pad".into(),
        instrument_type: InstrumentType::Detail,
        mode: InstrumentMode::Event,
        volume: 0.7,
        density: 0.6,
        audio_selection_persistent: false,
        memes: vec![],
    };
    let detail_audio = audio(detail.id, "Minor pad", "pad.wav", "minor", "SUSTAIN");

    let rhythm_instrument_id = rhythm.id;
    let rhythm_audio_ids = rhythm_audios.iter().map(|a| a.id).collect();

    let mut audios = rhythm_audios;
    audios.push(detail_audio);

    let content = ContentSnapshot::new(
        vec![macro_program, main_program],
        vec![macro_sequence, main_sequence],
        macro_bindings.into_iter().chain(main_bindings).collect(),
        vec![rhythm, detail],
        audios,
    );

    Fixture {
        content,
        rhythm_instrument_id,
        rhythm_audio_ids,
    }
}

/// Sink that keeps every shipped record set for assertions
#[derive(Default)]
pub struct CollectingSink {
    pub shipped: Mutex<Vec<SegmentRecords>>,
}

impl SegmentSink for CollectingSink {
    fn ship_records(&self, records: &SegmentRecords) -> Result<()> {
        self.shipped.lock().unwrap().push(records.clone());
        Ok(())
    }
}

/// Shipper that keeps waveform keys and frame counts
#[derive(Default)]
pub struct CollectingShipper {
    pub shipped: Mutex<Vec<(String, usize)>>,
}

impl AudioShipper for CollectingShipper {
    fn ship_audio(&self, waveform_key: &str, buffer: &OutputBuffer) -> Result<()> {
        self.shipped
            .lock()
            .unwrap()
            .push((waveform_key.to_string(), buffer.frame_count()));
        Ok(())
    }
}
