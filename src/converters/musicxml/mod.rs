//! MusicXML format converters
//!
//! This module contains converters for MusicXML format.

pub mod musicxml_to_lilypond;

// Re-export for convenience
pub use musicxml_to_lilypond::{
    convert_musicxml_to_lilypond,
    ConversionError,
    ConversionResult,
    ConversionSettings,
    InstrumentOutput,
    ParseError,
    SkippedElement,
    TranscriptionError,
    TranscriptionErrorKind,
};
