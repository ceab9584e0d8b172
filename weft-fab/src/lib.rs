//! # Weft Fabrication Engine
//!
//! Generates continuous, non-repeating musical audio: the craft pipeline
//! selects tagged programs, instruments, and audio under the meme
//! compatibility theorem, the fabricator buffers one segment's records, and
//! the mixer renders the chosen picks into a sample-accurate buffer through
//! the weighted audio cache. The [`work::WorkCycle`] ties it together as a
//! continuous look-ahead loop.
//!
//! Content management, persistence, and HTTP surfaces live outside this
//! crate; they appear only as the [`ship`] collaborator traits and the
//! read-only content snapshot from `weft-common`.

pub mod cache;
pub mod config;
pub mod craft;
pub mod error;
pub mod fabricator;
pub mod mix;
pub mod ship;
pub mod work;

pub use config::FabConfig;
pub use error::{Error, Result};
