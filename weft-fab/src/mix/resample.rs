//! Sample-rate conversion using rubato
//!
//! The cache loader normalizes every decoded fragment to the engine's
//! output frame rate before it becomes a mixable Source, so the mixer never
//! resamples inline. Uses rubato's polynomial resampler for a good
//! quality/performance tradeoff.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample interleaved audio from `input_rate` to `output_rate`
///
/// Returns a copy untouched when the rates already match.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }

    debug!(
        "resampling {}Hz -> {}Hz ({} channels, {} frames)",
        input_rate,
        output_rate,
        channels,
        input.len() / channels as usize
    );

    // rubato works on planar data
    let planar_input = deinterleave(input, channels);
    let input_frames = planar_input[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels as usize,
    )
    .map_err(|e| Error::Decode(format!("failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Decode(format!("resampling failed: {}", e)))?;

    Ok(interleave(&planar_output))
}

/// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            planar[ch_idx].push(samples[frame_idx * num_channels + ch_idx]);
        }
    }
    planar
}

/// [[L, L, ...], [R, R, ...]] -> [L, R, L, R, ...]
fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }
    let num_channels = planar.len();
    let num_frames = planar[0].len();

    let mut interleaved = Vec::with_capacity(num_frames * num_channels);
    for frame_idx in 0..num_frames {
        for channel in planar.iter().take(num_channels) {
            interleaved.push(channel[frame_idx]);
        }
    }
    interleaved
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_stereo() {
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let planar = deinterleave(&interleaved, 2);
        assert_eq!(planar[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(planar[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_interleave_round_trip() {
        let original = vec![1.0, 2.0, 3.0, 4.0];
        let planar = deinterleave(&original, 2);
        assert_eq!(interleave(&planar), original);
    }

    #[test]
    fn test_same_rate_is_copy() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resample(&input, 48_000, 48_000, 2).unwrap(), input);
    }

    #[test]
    fn test_rate_conversion_scales_length() {
        // 1000 frames of a 440Hz sine at 44.1kHz
        let input_rate = 44_100;
        let frames = 1000;
        let mut input = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / input_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            input.push(sample);
            input.push(sample);
        }

        let output = resample(&input, input_rate, 48_000, 2).unwrap();
        let output_frames = output.len() / 2;
        let expected = (frames as f64 * 48_000.0 / input_rate as f64) as usize;
        assert!(
            output_frames.abs_diff(expected) <= 10,
            "expected ~{} frames, got {}",
            expected,
            output_frames
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 44_100, 48_000, 2).unwrap().is_empty());
    }
}
