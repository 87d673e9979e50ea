//! MusicXML to LilyPond transcription
//!
//! Converts partwise MusicXML scores into LilyPond source with one music
//! variable per part, plus per-instrument book wrappers and a commented-out
//! full score.

pub mod converters;

// Re-export commonly used types
pub use converters::musicxml::{
    convert_musicxml_to_lilypond, ConversionError, ConversionResult, ConversionSettings,
    InstrumentOutput, ParseError, SkippedElement, TranscriptionError, TranscriptionErrorKind,
};
