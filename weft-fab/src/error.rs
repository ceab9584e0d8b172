//! Error types for weft-fab
//!
//! Defines the engine's error taxonomy using thiserror. Content gaps — a
//! craft step finding no qualifying program, instrument, or audio — are NOT
//! errors: they are values the fabricator converts into segment messages.
//! Everything here is genuinely exceptional for the step that raises it.

use thiserror::Error;

/// Main error type for the fabrication engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed content or invariant violation; fatal to the current
    /// segment only, the chain continues at the next offset
    #[error("Fabrication error: {0}")]
    Fabrication(String),

    /// Mixing/rendering errors; fatal to the current segment's dub step
    #[error("Mix error: {0}")]
    Mix(String),

    /// Audio byte source unavailable or unreadable
    #[error("Cache load error: {0}")]
    CacheLoad(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors surfaced by the shared model crate
    #[error(transparent)]
    Common(#[from] weft_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the weft-fab Error
pub type Result<T> = std::result::Result<T, Error>;
