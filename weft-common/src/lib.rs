//! # Weft Common Library
//!
//! Shared code for the Weft fabrication engine including:
//! - Meme parsing, axioms, taxonomy, and the compatibility stack
//! - Content snapshot entities and indexed lookups
//! - Segment model, produced records, and the segment state machine
//! - Weighted selection pool
//! - Microsecond/beat timing helpers

pub mod content;
pub mod error;
pub mod meme;
pub mod segment;
pub mod selector;
pub mod timing;

pub use error::{Error, Result};
pub use meme::{Meme, MemeStack, Taxonomy};
pub use selector::Selector;
