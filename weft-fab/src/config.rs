//! Engine configuration loading and validation
//!
//! All scalar knobs the engine consumes: output format for the mixer,
//! look-ahead window for the work cycle, byte allocation for the audio
//! cache, and the taxonomy categories for the meme stack. Loaded from a
//! TOML file with serde defaults so a partial file is enough.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weft_common::meme::taxonomy::{Category, Taxonomy};

/// Output audio format handed to the mixer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Frames per second of rendered audio
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Output channels; the mixer accepts 1 or 2 only
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Bits per sample at quantization
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u16,
}

fn default_frame_rate() -> u32 {
    48_000
}
fn default_channels() -> u16 {
    2
}
fn default_bit_depth() -> u16 {
    16
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            channels: default_channels(),
            bit_depth: default_bit_depth(),
        }
    }
}

/// Work cycle scheduling knobs
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkConfig {
    /// How far ahead of real time the chain stays fabricated, seconds
    #[serde(default = "default_ahead_seconds")]
    pub ahead_seconds: f64,

    /// Sleep between work cycle ticks, milliseconds
    #[serde(default = "default_cycle_millis")]
    pub cycle_millis: u64,

    /// Nominal segment length before the main craft stamps a real one,
    /// seconds
    #[serde(default = "default_segment_seconds")]
    pub fallback_segment_seconds: f64,

    /// A cycle older than this is reported unhealthy, seconds
    #[serde(default = "default_health_stale_seconds")]
    pub health_stale_seconds: f64,
}

fn default_ahead_seconds() -> f64 {
    60.0
}
fn default_cycle_millis() -> u64 {
    600
}
fn default_segment_seconds() -> f64 {
    30.0
}
fn default_health_stale_seconds() -> f64 {
    120.0
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            ahead_seconds: default_ahead_seconds(),
            cycle_millis: default_cycle_millis(),
            fallback_segment_seconds: default_segment_seconds(),
            health_stale_seconds: default_health_stale_seconds(),
        }
    }
}

/// Audio cache allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total decoded bytes held
    #[serde(default = "default_cache_bytes")]
    pub max_bytes: u64,

    /// Directory for fetched-byte staging files
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

fn default_cache_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_staging_dir() -> PathBuf {
    PathBuf::from("/tmp/weft-staging")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_cache_bytes(),
            staging_dir: default_staging_dir(),
        }
    }
}

/// Mix pass knobs
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MixConfig {
    /// Attack/release fade applied at every fragment boundary, microseconds
    #[serde(default = "default_fade_micros")]
    pub fade_micros: i64,
}

fn default_fade_micros() -> i64 {
    8_000
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            fade_micros: default_fade_micros(),
        }
    }
}

/// One taxonomy category as configured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyCategoryConfig {
    pub name: String,
    pub members: Vec<String>,
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FabConfig {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub work: WorkConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub mix: MixConfig,

    /// Mutually exclusive tag categories; empty allows every combination
    #[serde(default)]
    pub taxonomy: Vec<TaxonomyCategoryConfig>,
}

impl FabConfig {
    /// Load and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: FabConfig =
            toml::from_str(&text).map_err(|e| Error::Config(format!("bad TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.output.channels == 0 || self.output.channels > 2 {
            return Err(Error::Config(format!(
                "output.channels must be 1 or 2, got {}",
                self.output.channels
            )));
        }
        if !matches!(self.output.bit_depth, 8 | 16 | 24 | 32) {
            return Err(Error::Config(format!(
                "output.bit_depth must be 8, 16, 24, or 32, got {}",
                self.output.bit_depth
            )));
        }
        if self.output.frame_rate == 0 {
            return Err(Error::Config("output.frame_rate must be positive".into()));
        }
        if self.work.ahead_seconds <= 0.0 {
            return Err(Error::Config("work.ahead_seconds must be positive".into()));
        }
        if self.work.fallback_segment_seconds <= 0.0 {
            return Err(Error::Config(
                "work.fallback_segment_seconds must be positive".into(),
            ));
        }
        if self.cache.max_bytes == 0 {
            return Err(Error::Config("cache.max_bytes must be positive".into()));
        }
        if self.mix.fade_micros < 0 {
            return Err(Error::Config("mix.fade_micros must not be negative".into()));
        }
        Ok(())
    }

    /// Build the configured taxonomy
    pub fn taxonomy(&self) -> Taxonomy {
        Taxonomy::new(
            self.taxonomy
                .iter()
                .map(|c| Category::new(&c.name, &c.members))
                .collect(),
        )
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        FabConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: FabConfig = toml::from_str(
            r#"
            [output]
            frame_rate = 44100
            "#,
        )
        .unwrap();
        assert_eq!(config.output.frame_rate, 44_100);
        assert_eq!(config.output.channels, 2);
        assert_eq!(config.work.cycle_millis, 600);
    }

    #[test]
    fn test_bad_channel_count_rejected() {
        let mut config = FabConfig::default();
        config.output.channels = 3;
        assert!(config.validate().is_err());
        config.output.channels = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bit_depth_rejected() {
        let mut config = FabConfig::default();
        config.output.bit_depth = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_taxonomy_from_config() {
        let config: FabConfig = toml::from_str(
            r#"
            [[taxonomy]]
            name = "SEASON"
            members = ["WINTER", "SUMMER"]
            "#,
        )
        .unwrap();
        let taxonomy = config.taxonomy();
        let memes = weft_common::Meme::parse_all(["WINTER", "SUMMER"]).unwrap();
        assert!(!taxonomy.is_allowed(&memes));
    }
}
