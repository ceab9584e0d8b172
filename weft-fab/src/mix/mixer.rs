//! Audio mixer: composites timed fragment reads into one output buffer
//!
//! One mixer instance renders one segment. Callers `put` each pick's source
//! at its start offset, then `mix` sums everything: per-frame reads through
//! the [`Source`] pan law, boundary [`Envelope`] gains, logarithmic
//! soft-limiting of the summed signal, and finally quantization to the
//! declared bit depth. The resulting buffer is owned by the caller and
//! never shared.

use crate::error::{Error, Result};
use crate::mix::envelope::Envelope;
use crate::mix::source::Source;
use std::sync::Arc;
use weft_common::timing::{frame_to_micros, micros_to_frame, micros_to_frame_count};

/// Summed samples above this magnitude are compressed, not clipped
const LIMIT_THRESHOLD: f32 = 0.9;

/// Target output audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub frame_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl OutputFormat {
    /// Validate and construct
    ///
    /// # Errors
    ///
    /// [`Error::Mix`] for 0 or more than 2 channels, a zero frame rate, or
    /// an unsupported bit depth.
    pub fn new(frame_rate: u32, channels: u16, bit_depth: u16) -> Result<Self> {
        if channels == 0 || channels > 2 {
            return Err(Error::Mix(format!(
                "output must have 1 or 2 channels, got {}",
                channels
            )));
        }
        if frame_rate == 0 {
            return Err(Error::Mix("output frame rate must be positive".into()));
        }
        if !matches!(bit_depth, 8 | 16 | 24 | 32) {
            return Err(Error::Mix(format!("unsupported bit depth {}", bit_depth)));
        }
        Ok(Self {
            frame_rate,
            channels,
            bit_depth,
        })
    }
}

/// One timed fragment read queued for the mix pass
struct Placement {
    source: Arc<Source>,
    start_micros: i64,
    length_micros: i64,
    volume: f32,
    pan: f32,
}

/// Mixer for one segment's dub pass
pub struct Mixer {
    format: OutputFormat,
    total_micros: i64,
    envelope: Envelope,
    placements: Vec<Placement>,
}

impl Mixer {
    /// Create a mixer rendering `total_micros` of audio in `format`
    ///
    /// `fade_micros` sets the boundary envelope applied to every placed
    /// fragment.
    pub fn new(format: OutputFormat, total_micros: i64, fade_micros: i64) -> Result<Self> {
        // format invariants re-checked so a hand-built struct cannot sneak past
        let format = OutputFormat::new(format.frame_rate, format.channels, format.bit_depth)?;
        if total_micros <= 0 {
            return Err(Error::Mix(format!(
                "mix length must be positive, got {}µs",
                total_micros
            )));
        }
        let fade_frames = micros_to_frame_count(fade_micros.max(0), format.frame_rate);
        Ok(Self {
            format,
            total_micros,
            envelope: Envelope::new(fade_frames),
            placements: Vec::new(),
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of fragments queued
    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }

    /// Queue one timed fragment read
    ///
    /// The source must already be at the output frame rate; rate conversion
    /// belongs to the loader's resampling pass, never here.
    pub fn put(
        &mut self,
        source: Arc<Source>,
        start_micros: i64,
        length_micros: i64,
        volume: f32,
        pan: f32,
    ) -> Result<()> {
        if source.frame_rate() != self.format.frame_rate {
            return Err(Error::Mix(format!(
                "source {} is {}Hz but output is {}Hz; resample before mixing",
                source.audio_id(),
                source.frame_rate(),
                self.format.frame_rate
            )));
        }
        if start_micros < 0 {
            return Err(Error::Mix(format!(
                "placement starts before segment: {}µs",
                start_micros
            )));
        }
        if length_micros <= 0 {
            return Err(Error::Mix(format!(
                "placement length must be positive, got {}µs",
                length_micros
            )));
        }
        self.placements.push(Placement {
            source,
            start_micros,
            length_micros,
            volume,
            pan,
        });
        Ok(())
    }

    /// Render all queued placements into one output buffer
    pub fn mix(&self) -> Result<OutputBuffer> {
        let channels = self.format.channels as usize;
        let total_frames = micros_to_frame_count(self.total_micros, self.format.frame_rate);
        let mut samples = vec![0.0f32; total_frames * channels];

        for placement in &self.placements {
            let start_frame = micros_to_frame(placement.start_micros, self.format.frame_rate);
            let length_frames =
                micros_to_frame_count(placement.length_micros, self.format.frame_rate);

            for local in 0..length_frames {
                let out_frame = start_frame + local;
                if out_frame >= total_frames {
                    break; // placements never write past the segment boundary
                }
                let source_micros = frame_to_micros(local, self.format.frame_rate);
                let frame = placement.source.frame_at(
                    source_micros,
                    placement.volume,
                    placement.pan,
                    self.format.channels,
                );
                let gain = self.envelope.gain_at(local, length_frames);

                let base = out_frame * channels;
                samples[base] += frame[0] * gain;
                if channels == 2 {
                    samples[base + 1] += frame[1] * gain;
                }
            }
        }

        for sample in &mut samples {
            *sample = soft_limit(*sample);
        }

        Ok(OutputBuffer {
            format: self.format,
            samples,
        })
    }
}

/// Logarithmic soft limiter for the summed signal
///
/// Linear below [`LIMIT_THRESHOLD`]; above it the overshoot is compressed
/// on a log curve so heavy sums saturate smoothly instead of clipping, then
/// hard-bounded at ±1.0.
fn soft_limit(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= LIMIT_THRESHOLD {
        return sample;
    }
    let headroom = 1.0 - LIMIT_THRESHOLD;
    let overshoot = (magnitude - LIMIT_THRESHOLD) / headroom;
    let limited = LIMIT_THRESHOLD + headroom * (1.0 + overshoot).ln().min(1.0);
    limited.min(1.0) * sample.signum()
}

/// Rendered audio owned by the dub pass that asked for it
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    format: OutputFormat,
    /// Interleaved float samples, frames × channels
    samples: Vec<f32>,
}

impl OutputBuffer {
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.format.channels as usize
    }

    /// Quantize float samples to signed integers at the declared bit depth
    pub fn quantized(&self) -> Vec<i32> {
        let scale = ((1i64 << (self.format.bit_depth - 1)) - 1) as f32;
        self.samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * scale).round() as i32)
            .collect()
    }
}

// ========================================
// Tests
// ========================================
