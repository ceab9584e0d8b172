//! Decoded audio source with sample-accurate timed reads
//!
//! A Source holds one decoded waveform as an interleaved frames×channels
//! f32 array and answers `frame_at` reads: locate the frame sounding at a
//! microsecond offset, map mono↔stereo, apply volume and the pan law.
//! Reads at or past the decoded length return silence, never an error.

use crate::error::{Error, Result};
use uuid::Uuid;
use weft_common::timing::MICROS_PER_SECOND;

/// One stereo frame of output; index 0 is the only meaningful sample when
/// the caller mixes to mono
pub type Frame = [f32; 2];

/// A decoded audio fragment
///
/// At most 2 channels; enforced at construction. Frame rate is whatever the
/// loader produced (the cache normalizes to the engine's output rate before
/// building a Source).
#[derive(Debug, Clone)]
pub struct Source {
    audio_id: Uuid,
    frame_rate: u32,
    channels: u16,
    /// Interleaved samples, frames × channels
    samples: Vec<f32>,
}

impl Source {
    /// Wrap decoded samples
    ///
    /// # Errors
    ///
    /// [`Error::Mix`] for 0 or more than 2 channels, a zero frame rate, or
    /// a sample count that does not divide evenly into frames.
    pub fn new(audio_id: Uuid, frame_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        if channels == 0 || channels > 2 {
            return Err(Error::Mix(format!(
                "source {} has {} channels; at most 2 are supported",
                audio_id, channels
            )));
        }
        if frame_rate == 0 {
            return Err(Error::Mix(format!("source {} has zero frame rate", audio_id)));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::Mix(format!(
                "source {}: {} samples do not divide into {} channels",
                audio_id,
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            audio_id,
            frame_rate,
            channels,
            samples,
        })
    }

    pub fn audio_id(&self) -> Uuid {
        self.audio_id
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames decoded
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Decoded length in microseconds
    pub fn length_micros(&self) -> i64 {
        (self.frame_count() as i64 * MICROS_PER_SECOND) / self.frame_rate as i64
    }

    /// Decoded size in bytes (cache weight)
    pub fn weight_bytes(&self) -> u64 {
        (self.samples.len() * std::mem::size_of::<f32>()) as u64
    }

    /// Read the frame sounding at `time_micros`, scaled by `volume` and
    /// panned for `out_channels`
    ///
    /// The frame is located by dividing elapsed microseconds by the
    /// per-frame duration. Negative times and times at or past the decoded
    /// length return silence. Mono sources duplicate into both output
    /// channels; when mixing to mono the two channels average into index 0.
    ///
    /// Pan law: right gain is 1 for `pan >= 0`, else `1 - |pan|`; left gain
    /// is 1 for `pan <= 0`, else `1 - pan`.
    pub fn frame_at(&self, time_micros: i64, volume: f32, pan: f32, out_channels: u16) -> Frame {
        if time_micros < 0 {
            return [0.0, 0.0];
        }
        let frame_index = ((time_micros * self.frame_rate as i64) / MICROS_PER_SECOND) as usize;
        if frame_index >= self.frame_count() {
            return [0.0, 0.0];
        }

        let base = frame_index * self.channels as usize;
        let (raw_left, raw_right) = match self.channels {
            1 => (self.samples[base], self.samples[base]),
            _ => (self.samples[base], self.samples[base + 1]),
        };

        let pan = pan.clamp(-1.0, 1.0);
        let left_gain = if pan <= 0.0 { 1.0 } else { 1.0 - pan };
        let right_gain = if pan >= 0.0 { 1.0 } else { 1.0 - pan.abs() };

        let left = raw_left * volume * left_gain;
        let right = raw_right * volume * right_gain;

        if out_channels == 1 {
            [(left + right) * 0.5, 0.0]
        } else {
            [left, right]
        }
    }
}

// ========================================
// Tests
// ========================================
