//! MusicXML to LilyPond converter module
//!
//! Converts partwise MusicXML documents to LilyPond source, one variable
//! per part, wrapped in per-instrument books.
//!
//! # Overview
//!
//! The converter follows a three-stage pipeline:
//! 1. **Parse**: Parse MusicXML using roxmltree (zero-copy)
//! 2. **Transcribe**: Walk each part measure by measure, producing a token
//!    stream of notes, voice overlays and directives
//! 3. **Assemble**: Render all parts into one document through a template
//!
//! Unsupported constructs are errors rather than guesses; constructs that
//! are safe to ignore are reported as skipped elements.
//!
//! # Basic Usage
//!
//! ```ignore
//! use mxl2ly::{convert_musicxml_to_lilypond, ConversionSettings};
//!
//! let musicxml = r#"<?xml version="1.0"?>
//! <score-partwise>
//!   <part-list><score-part id="P1"><part-name>Flute</part-name></score-part></part-list>
//!   <part id="P1">
//!     <measure number="1">
//!       <attributes><divisions>1</divisions></attributes>
//!       <note>
//!         <pitch><step>C</step><octave>5</octave></pitch>
//!         <duration>4</duration>
//!         <type>whole</type>
//!       </note>
//!     </measure>
//!   </part>
//! </score-partwise>"#;
//!
//! let result = convert_musicxml_to_lilypond(musicxml, None)?;
//! println!("{}", result.lilypond_source);
//! ```

pub mod converter;
pub mod duration;
pub mod errors;
pub mod event;
pub mod expression;
pub mod lilypond;
pub mod multi_rest;
pub mod parser;
pub mod stream;
pub mod templates;
pub mod types;

// Re-export main API
pub use errors::{ConversionError, ParseError, TranscriptionError, TranscriptionErrorKind};
pub use types::{ConversionResult, ConversionSettings, InstrumentOutput, SkippedElement};

/// Convert MusicXML document to LilyPond source code.
///
/// # Arguments
///
/// * `musicxml` - partwise MusicXML document as string
/// * `settings` - Optional conversion settings (uses defaults if None)
///
/// # Returns
///
/// * `Ok(ConversionResult)` - LilyPond source, per-instrument outputs and skip report
/// * `Err(ConversionError)` - Fatal error; a failing part aborts the conversion
///   unless `skip_failed_parts` is set
pub fn convert_musicxml_to_lilypond(
    musicxml: &str,
    settings: Option<ConversionSettings>,
) -> Result<ConversionResult, ConversionError> {
    use converter::{transcribe_part, ConversionContext};
    use lilypond::{build_instrument, generate_lilypond_document};
    use parser::{strip_doctype, XmlDocument};

    let mut settings = settings.unwrap_or_default();

    let source = strip_doctype(musicxml);
    let doc = XmlDocument::parse(&source)?;

    if settings.title.is_none() {
        settings.title = doc.extract_title();
    }
    if settings.composer.is_none() {
        settings.composer = doc.extract_composer();
    }

    let names = doc.part_names()?;
    let parts = doc.extract_parts()?;

    let mut instruments = Vec::with_capacity(parts.len());
    let mut skipped_elements = Vec::new();

    for part in parts {
        let part_id = part.get_part_id();
        let full_name = names.get(&part_id).cloned().ok_or_else(|| {
            ParseError::MissingRequiredElement(format!("part {} is not in the part-list", part_id))
        })?;

        let mut context = ConversionContext::new(part_id.clone());
        match transcribe_part(&part, settings.measures_per_line_comment, &mut context) {
            Ok(music) => instruments.push(build_instrument(&part_id, &full_name, &music)),
            Err(e) if settings.skip_failed_parts => {
                log::error!("Skipping part {} ({}): {}", part_id, full_name, e);
                context.current_measure = e.measure.clone();
                context.add_skipped("part", &e.to_string());
            }
            Err(e) => return Err(e.into()),
        }
        skipped_elements.extend(context.skipped_elements);
    }

    let lilypond_source = generate_lilypond_document(&instruments, &settings)?;

    Ok(ConversionResult {
        lilypond_source,
        instruments,
        skipped_elements,
    })
}
