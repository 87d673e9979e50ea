//! Error types for MusicXML transcription
//!
//! Defines the error hierarchy for conversion failures: document-level
//! parse errors (ParseError) and per-instrument transcription errors
//! (TranscriptionError), which abort the instrument they occur in.

use std::fmt;

use thiserror::Error;

/// Top-level conversion error type
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// Fatal XML parsing error
    #[error("XML parsing failed: {0}")]
    ParseError(#[from] ParseError),

    /// A part could not be transcribed
    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    /// Document template could not be rendered
    #[error("Template rendering failed: {0}")]
    Template(String),

    /// Preferences file could not be read or parsed
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Fatal XML parsing errors
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// XML is malformed (not well-formed)
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// MusicXML format not supported (e.g., timewise instead of partwise)
    #[error("Unsupported MusicXML format: {0}")]
    UnsupportedFormat(String),

    /// Required structural element is missing
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),
}

/// Category of a transcription failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionErrorKind {
    /// Unrecognized tag, keyword or attribute value
    Unsupported,
    /// Broken invariant: duration mismatch, unmet backup, short rest run...
    Consistency,
}

impl fmt::Display for TranscriptionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported construct"),
            Self::Consistency => write!(f, "consistency violation"),
        }
    }
}

/// Fatal error for one instrument part.
///
/// Location fields are filled in as the error propagates out of the
/// measure loop, so leaf code only has to describe what went wrong.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}{}", location_suffix(.part_id, .measure))]
pub struct TranscriptionError {
    pub kind: TranscriptionErrorKind,
    pub message: String,
    pub part_id: Option<String>,
    pub measure: Option<String>,
}

impl TranscriptionError {
    pub fn new(kind: TranscriptionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            part_id: None,
            measure: None,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(TranscriptionErrorKind::Unsupported, message)
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::new(TranscriptionErrorKind::Consistency, message)
    }

    /// Attach the part id unless one is already present
    pub fn with_part(mut self, part_id: impl Into<String>) -> Self {
        if self.part_id.is_none() {
            self.part_id = Some(part_id.into());
        }
        self
    }

    /// Attach the measure number unless one is already present
    pub fn with_measure(mut self, measure: impl Into<String>) -> Self {
        if self.measure.is_none() {
            self.measure = Some(measure.into());
        }
        self
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind == TranscriptionErrorKind::Unsupported
    }

    pub fn is_consistency(&self) -> bool {
        self.kind == TranscriptionErrorKind::Consistency
    }
}

fn location_suffix(part_id: &Option<String>, measure: &Option<String>) -> String {
    match (part_id, measure) {
        (Some(part), Some(measure)) => format!(" (part {}, measure {})", part, measure),
        (Some(part), None) => format!(" (part {})", part),
        (None, Some(measure)) => format!(" (measure {})", measure),
        (None, None) => String::new(),
    }
}

/// Shorthand result type for transcription code
pub type TranscriptionResult<T> = Result<T, TranscriptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = TranscriptionError::unsupported("Unrecognized measure child: \"harmony\"")
            .with_measure("12")
            .with_part("P1");
        assert_eq!(
            err.to_string(),
            "unsupported construct: Unrecognized measure child: \"harmony\" (part P1, measure 12)"
        );
    }

    #[test]
    fn test_inner_location_wins() {
        let err = TranscriptionError::consistency("Backup duration could not be met")
            .with_measure("3")
            .with_measure("4");
        assert_eq!(err.measure.as_deref(), Some("3"));
        assert!(err.is_consistency());
        assert_eq!(
            err.to_string(),
            "consistency violation: Backup duration could not be met (measure 3)"
        );
    }

    #[test]
    fn test_conversion_error_wraps_transcription_error() {
        let err: ConversionError = TranscriptionError::unsupported("x").into();
        assert!(err.to_string().starts_with("Transcription failed: unsupported construct: x"));
    }
}
