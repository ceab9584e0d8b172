//! Microsecond timing helpers for sample-accurate fabrication
//!
//! Weft positions every musical event on a single microsecond timeline per
//! segment. Three representations are in play:
//!
//! 1. **Beats (musical)**: f64 positions within a program, tempo-relative
//! 2. **Microseconds (internal)**: i64 offsets stored on segment records
//! 3. **Frames (render)**: usize sample-frame indexes at the output rate
//!
//! Beats convert through tempo (`micros = beats * 60e6 / bpm`); frames
//! convert through the output frame rate. Conversions round to the nearest
//! microsecond/frame so repeated laydown of loop audio cannot drift by more
//! than half a unit per placement.

/// Microseconds per second
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Microseconds per minute (beat math numerator)
pub const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;

/// Convert a beat position to microseconds at the given tempo
///
/// # Examples
///
/// ```
/// use weft_common::timing::beats_to_micros;
///
/// // one beat at 120 BPM is half a second
/// assert_eq!(beats_to_micros(1.0, 120.0), 500_000);
/// // four beats at 60 BPM is four seconds
/// assert_eq!(beats_to_micros(4.0, 60.0), 4_000_000);
/// ```
pub fn beats_to_micros(beats: f64, tempo_bpm: f64) -> i64 {
    debug_assert!(tempo_bpm > 0.0, "tempo must be positive");
    (beats * MICROS_PER_MINUTE as f64 / tempo_bpm).round() as i64
}

/// Convert a microsecond offset back to beats at the given tempo
pub fn micros_to_beats(micros: i64, tempo_bpm: f64) -> f64 {
    micros as f64 * tempo_bpm / MICROS_PER_MINUTE as f64
}

/// Convert whole seconds to microseconds
pub fn seconds_to_micros(seconds: f64) -> i64 {
    (seconds * MICROS_PER_SECOND as f64).round() as i64
}

/// Microsecond offset of a sample frame at the given frame rate
pub fn frame_to_micros(frame: usize, frame_rate: u32) -> i64 {
    (frame as i64 * MICROS_PER_SECOND) / frame_rate as i64
}

/// Sample frame index containing the given microsecond offset
///
/// Truncating division: the frame that is sounding at `micros`, not the
/// nearest boundary.
pub fn micros_to_frame(micros: i64, frame_rate: u32) -> usize {
    debug_assert!(micros >= 0, "negative time has no frame");
    ((micros * frame_rate as i64) / MICROS_PER_SECOND) as usize
}

/// Total frames spanning a microsecond duration, rounded to nearest
pub fn micros_to_frame_count(micros: i64, frame_rate: u32) -> usize {
    (((micros * frame_rate as i64) as f64) / MICROS_PER_SECOND as f64).round() as usize
}

// ========================================
// Tests
// ========================================
