//! Waveform decoding for the audio cache
//!
//! Decodes one staged audio file with symphonia into interleaved f32
//! samples, then normalizes to the engine's output frame rate through the
//! resampler. Fragments with more than 2 channels are rejected rather than
//! downmixed; the Source constructor enforces the same bound.

use crate::error::{Error, Result};
use crate::mix::resample;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fully decoded waveform at the requested output rate
#[derive(Debug)]
pub struct DecodedWaveform {
    /// Interleaved samples, frames × channels
    pub samples: Vec<f32>,
    pub channels: u16,
    pub frame_rate: u32,
}

/// Decode an audio file to f32 frames at `output_rate`
pub fn decode_file(path: &Path, output_rate: u32) -> Result<DecodedWaveform> {
    let file = File::open(path)
        .map_err(|e| Error::CacheLoad(format!("cannot open {}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("{}: unrecognized format: {}", path.display(), e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode(format!("{}: no audio track", path.display())))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let native_rate = codec_params.sample_rate.unwrap_or(44_100);
    let channels = codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2) as u16;
    if channels == 0 || channels > 2 {
        return Err(Error::Decode(format!(
            "{}: {} channels; at most 2 are supported",
            path.display(),
            channels
        )));
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("{}: unsupported codec: {}", path.display(), e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // EOF
            }
            Err(e) => {
                return Err(Error::Decode(format!(
                    "{}: packet read failed: {}",
                    path.display(),
                    e
                )));
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::Decode(format!("{}: decode failed: {}", path.display(), e)))?;

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
        });
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let samples = resample::resample(&samples, native_rate, output_rate, channels)?;

    Ok(DecodedWaveform {
        samples,
        channels,
        frame_rate: output_rate,
    })
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_cache_load_error() {
        let err = decode_file(Path::new("/nonexistent/audio.wav"), 48_000).unwrap_err();
        assert!(matches!(err, Error::CacheLoad(_)));
    }

    // Decoding real fixtures is covered by the integration tests, which
    // generate WAV files with hound.
}
