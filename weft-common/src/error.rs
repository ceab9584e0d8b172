//! Common error types for Weft

use thiserror::Error;

/// Common result type for Weft operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the fabrication engine and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed tag text (empty body, bare marker, embedded delimiter)
    #[error("Invalid meme: {0}")]
    InvalidMeme(String),

    /// Requested entity not present in the content snapshot
    #[error("Not found: {0}")]
    NotFound(String),

    /// Segment state machine rejected a transition
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Invalid caller-supplied value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}
