//! Output collaborators: segment records and rendered audio leave here
//!
//! The engine's two produced surfaces are traits so the web-service
//! plumbing stays outside the core: [`SegmentSink`] receives the committed
//! record set for one segment, [`AudioShipper`] receives the rendered
//! buffer. The filesystem implementations below are what the headless
//! binary wires up — JSON records per segment, WAV audio per waveform key.

use crate::error::{Error, Result};
use crate::fabricator::SegmentRecords;
use crate::mix::OutputBuffer;
use std::path::PathBuf;
use tracing::debug;

/// Receives one segment's committed record set
pub trait SegmentSink: Send + Sync {
    fn ship_records(&self, records: &SegmentRecords) -> Result<()>;
}

/// Receives one segment's rendered audio
pub trait AudioShipper: Send + Sync {
    fn ship_audio(&self, waveform_key: &str, buffer: &OutputBuffer) -> Result<()>;
}

/// Writes each segment's records as pretty JSON under a directory
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl SegmentSink for JsonDirSink {
    fn ship_records(&self, records: &SegmentRecords) -> Result<()> {
        let path = self
            .dir
            .join(format!("segment-{:06}.json", records.segment.offset));
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, records)
            .map_err(|e| Error::Internal(format!("cannot serialize segment records: {}", e)))?;
        debug!(
            "shipped records for segment {} to {}",
            records.segment.offset,
            path.display()
        );
        Ok(())
    }
}

/// Writes each rendered buffer as a WAV file named by its waveform key
pub struct WavDirShipper {
    dir: PathBuf,
}

impl WavDirShipper {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl AudioShipper for WavDirShipper {
    fn ship_audio(&self, waveform_key: &str, buffer: &OutputBuffer) -> Result<()> {
        let format = buffer.format();
        let path = self.dir.join(waveform_key);
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.frame_rate,
            bits_per_sample: format.bit_depth,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| Error::Internal(format!("cannot create {}: {}", path.display(), e)))?;
        let quantized = buffer.quantized();
        let write_result: std::result::Result<(), hound::Error> = match format.bit_depth {
            8 => quantized
                .iter()
                .try_for_each(|s| writer.write_sample(*s as i8)),
            16 => quantized
                .iter()
                .try_for_each(|s| writer.write_sample(*s as i16)),
            _ => quantized.iter().try_for_each(|s| writer.write_sample(*s)),
        };
        write_result
            .and_then(|_| writer.finalize())
            .map_err(|e| Error::Internal(format!("cannot write {}: {}", path.display(), e)))?;
        debug!("shipped audio {} ({} frames)", waveform_key, buffer.frame_count());
        Ok(())
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::{Mixer, OutputFormat};
    use uuid::Uuid;
    use weft_common::segment::{Segment, SegmentState};

    fn empty_records() -> SegmentRecords {
        let mut segment = Segment::planned(Uuid::new_v4(), 7, 0);
        segment.transition(SegmentState::Crafting).unwrap();
        segment.transition(SegmentState::Crafted).unwrap();
        SegmentRecords {
            segment,
            choices: vec![],
            arrangements: vec![],
            picks: vec![],
            chords: vec![],
            memes: vec![],
            messages: vec![],
        }
    }

    #[test]
    fn test_json_sink_writes_by_offset() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path()).unwrap();
        sink.ship_records(&empty_records()).unwrap();

        let path = dir.path().join("segment-000007.json");
        let text = std::fs::read_to_string(path).unwrap();
        let parsed: SegmentRecords = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.segment.offset, 7);
    }

    #[test]
    fn test_wav_shipper_round_trips_format() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = WavDirShipper::new(dir.path()).unwrap();

        let format = OutputFormat::new(48_000, 2, 16).unwrap();
        let buffer = Mixer::new(format, 10_000, 0).unwrap().mix().unwrap();
        shipper.ship_audio("out.wav", &buffer).unwrap();

        let reader = hound::WavReader::open(dir.path().join("out.wav")).unwrap();
        assert_eq!(reader.spec().sample_rate, 48_000);
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.len() as usize, buffer.frame_count() * 2);
    }
}
