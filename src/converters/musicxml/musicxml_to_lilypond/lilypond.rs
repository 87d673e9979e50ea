//! LilyPond document generation
//!
//! Wraps each transcribed part in its variable, name declarations and book
//! blocks, and assembles the instruments into the final document.

use super::errors::ConversionError;
use super::templates::{render_lilypond, TemplateContext};
use super::types::{ConversionSettings, InstrumentOutput};

/// Build the per-instrument output from a transcribed part
pub fn build_instrument(part_id: &str, full_name: &str, music: &str) -> InstrumentOutput {
    let var_name = variable_name(full_name);
    let escaped_name = escape_lilypond_string(full_name);

    let body = format!(
        "{} = \\compressMMRests {{\n\\accidentalStyle Score.modern-cautionary\n{}}}",
        var_name, music
    );
    let name_decl = format!(
        "{var}_name = \"{name}\"\n{var}_short_name = \"{name}\"",
        var = var_name,
        name = escaped_name
    );
    let book = format!(
        "\\book {{ \\bookOutputSuffix \\{var}_name  \\header {{ instrument = \\{var}_name }}  \\score {{ \\{var} }} }}",
        var = var_name
    );
    let book_part = format!(
        "\\bookpart {{ \\header {{ instrument = \\{var}_name }}  \\score {{ \\{var} }} }}",
        var = var_name
    );

    InstrumentOutput {
        part_id: part_id.to_string(),
        full_name: full_name.to_string(),
        var_name,
        body,
        name_decl,
        book,
        book_part,
    }
}

/// Generate the LilyPond document for all instruments, in the given order
pub fn generate_lilypond_document(
    instruments: &[InstrumentOutput],
    settings: &ConversionSettings,
) -> Result<String, ConversionError> {
    let escape = |value: &Option<String>| value.as_deref().map(escape_lilypond_string);

    let mut builder = TemplateContext::builder(
        settings.target_lilypond_version.clone(),
        settings.paper_size.clone(),
    )
    .header_field("title", escape(&settings.title))
    .header_field("subtitle", escape(&settings.subtitle))
    .header_field("composer", escape(&settings.composer))
    .header_field(
        "arranger",
        settings
            .arranger
            .as_deref()
            .map(|arranger| format!("arr. {}", escape_lilypond_string(arranger))),
    );

    for instrument in instruments {
        builder = builder.instrument(instrument);
    }

    render_lilypond(&builder.build())
}

/// LilyPond variable name for a part name
pub fn variable_name(full_name: &str) -> String {
    full_name.trim().replace(' ', "_")
}

/// Escape a string for use inside LilyPond double quotes
pub fn escape_lilypond_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_wrappers() {
        let output = build_instrument("P2", "Alto Sax", " c'1|\n");
        assert_eq!(output.var_name, "Alto_Sax");
        assert_eq!(
            output.body,
            "Alto_Sax = \\compressMMRests {\n\\accidentalStyle Score.modern-cautionary\n c'1|\n}"
        );
        assert_eq!(
            output.name_decl,
            "Alto_Sax_name = \"Alto Sax\"\nAlto_Sax_short_name = \"Alto Sax\""
        );
        assert_eq!(
            output.book,
            "\\book { \\bookOutputSuffix \\Alto_Sax_name  \\header { instrument = \\Alto_Sax_name }  \\score { \\Alto_Sax } }"
        );
        assert_eq!(
            output.book_part,
            "\\bookpart { \\header { instrument = \\Alto_Sax_name }  \\score { \\Alto_Sax } }"
        );
    }

    #[test]
    fn test_escape_lilypond_string() {
        assert_eq!(escape_lilypond_string("The \"Best\""), "The \\\"Best\\\"");
        assert_eq!(escape_lilypond_string("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_document_header() {
        let settings = ConversionSettings {
            title: Some("Suite".to_string()),
            composer: Some("Anon.".to_string()),
            arranger: Some("J. Doe".to_string()),
            ..ConversionSettings::default()
        };
        let instruments = vec![
            build_instrument("P1", "Flute", " c''1|\n"),
            build_instrument("P2", "Tuba", " c,1|\n"),
        ];
        let document = generate_lilypond_document(&instruments, &settings).unwrap();

        assert!(document.contains("\\version \"2.24.1\""));
        assert!(document.contains("\\language \"english\""));
        assert!(document.contains("title = \"Suite\""));
        assert!(document.contains("composer = \"Anon.\""));
        assert!(document.contains("arranger = \"arr. J. Doe\""));
        assert!(!document.contains("subtitle"));

        let flute = document.find("Flute = \\compressMMRests").unwrap();
        let tuba = document.find("Tuba = \\compressMMRests").unwrap();
        assert!(flute < tuba, "instruments keep part order");
        assert!(document.contains("\\Flute_name shortInstrumentName = \\Flute_short_name } \\Flute"));
    }
}
