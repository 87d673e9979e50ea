//! Type definitions for MusicXML transcription
//!
//! This module defines the public API types of the conversion pipeline:
//! - Settings loaded from a preferences file (ConversionSettings)
//! - Per-instrument and whole-document results
//! - Recoverable notices (SkippedElement)

use std::fs;
use std::path::Path;

use num_rational::Rational64;
use serde::{Deserialize, Serialize};

use super::errors::ConversionError;

/// Exact duration as a fraction of a whole note
pub type Rational = Rational64;

// ============================================================================
// PUBLIC API TYPES
// ============================================================================

/// Result of MusicXML to LilyPond conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Generated LilyPond document
    pub lilypond_source: String,

    /// Transcribed instruments in source part order
    pub instruments: Vec<InstrumentOutput>,

    /// Constructs that were skipped with a warning
    pub skipped_elements: Vec<SkippedElement>,
}

/// Transcription of one `<part>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentOutput {
    /// Part id from the source document (e.g. "P1")
    pub part_id: String,

    /// Display name from `<part-name>`
    pub full_name: String,

    /// LilyPond variable the music is bound to
    pub var_name: String,

    /// `Violin = \compressMMRests { ... }`
    pub body: String,

    /// Full and short instrument name declarations
    pub name_decl: String,

    /// Single-instrument `\book` wrapper
    pub book: String,

    /// `\bookpart` wrapper for the all-parts book
    pub book_part: String,
}

impl InstrumentOutput {
    pub fn full_name_var(&self) -> String {
        format!("{}_name", self.var_name)
    }

    pub fn short_name_var(&self) -> String {
        format!("{}_short_name", self.var_name)
    }
}

/// Information about a skipped/unsupported element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedElement {
    /// MusicXML element tag name (e.g., "staff-details")
    pub element_type: String,

    /// Measure number where element appears (if in measure context)
    pub measure_number: Option<String>,

    /// Part ID where element appears (if in part context)
    pub part_id: Option<String>,

    /// Human-readable explanation of why skipped
    pub reason: String,
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Configuration options for conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    /// Target LilyPond version (e.g., "2.24.1")
    pub target_lilypond_version: String,

    /// Arranger credited in the header as "arr. {arranger}"
    pub arranger: Option<String>,

    /// Title override (extracted from the document when absent)
    pub title: Option<String>,

    /// Subtitle line
    pub subtitle: Option<String>,

    /// Composer override (extracted from the document when absent)
    pub composer: Option<String>,

    /// Paper size passed to `set-default-paper-size`
    pub paper_size: String,

    /// Keep going when a part fails, reporting it as skipped
    pub skip_failed_parts: bool,

    /// Emit `% Measure N` before every N-th measure (0 disables)
    pub measures_per_line_comment: u32,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            target_lilypond_version: "2.24.1".to_string(),
            arranger: None,
            title: None,
            subtitle: None,
            composer: None,
            paper_size: "letter".to_string(),
            skip_failed_parts: false,
            measures_per_line_comment: 4,
        }
    }
}

impl ConversionSettings {
    /// Parse settings from a YAML preferences document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConversionError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ConversionError::Config(format!("Invalid preferences: {}", e)))
    }

    /// Load settings from a YAML preferences file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConversionError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            ConversionError::Config(format!(
                "Could not read preferences {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&yaml)
    }
}
