//! Text-stripping primitives shared by every field pipeline.
//!
//! A pipeline stage hands a working buffer in and gets back the extracted
//! value together with the buffer that remains once the matched text has
//! been removed.

mod pattern;
mod strip;

pub use pattern::{Cast, FieldPattern, PatternError, Value, extract, extract_flag};
pub use strip::{Terms, WordStripper, strip_words, trim_boundary};
