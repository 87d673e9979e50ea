//! LilyPond template rendering
//!
//! The full document (header, instrument variables, per-instrument books,
//! and the commented-out all-parts book and full score) is produced from a
//! single Mustache template. All values are inserted unescaped; callers are
//! responsible for LilyPond string escaping.

use serde::Serialize;

use super::errors::ConversionError;
use super::types::InstrumentOutput;

const SCORE_TEMPLATE: &str = include_str!("templates/score.ly.mustache");

/// One `key = "value"` line of the `\header` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

/// Per-instrument values used by the template
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentContext {
    pub var_name: String,
    pub full_name_var: String,
    pub short_name_var: String,
    pub body: String,
    pub name_decl: String,
    pub book: String,
    pub book_part: String,
}

impl From<&InstrumentOutput> for InstrumentContext {
    fn from(instrument: &InstrumentOutput) -> Self {
        Self {
            var_name: instrument.var_name.clone(),
            full_name_var: instrument.full_name_var(),
            short_name_var: instrument.short_name_var(),
            body: instrument.body.clone(),
            name_decl: instrument.name_decl.clone(),
            book: instrument.book.clone(),
            book_part: instrument.book_part.clone(),
        }
    }
}

/// Context data for template rendering
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// LilyPond version (e.g., "2.24.1")
    pub version: String,

    pub paper_size: String,

    /// Header lines, in output order
    pub header: Vec<HeaderField>,

    pub instruments: Vec<InstrumentContext>,
}

impl TemplateContext {
    /// Create a new template context with required fields
    pub fn new(version: String, paper_size: String) -> Self {
        Self {
            version,
            paper_size,
            header: Vec::new(),
            instruments: Vec::new(),
        }
    }

    /// Builder pattern for fluent API
    pub fn builder(version: String, paper_size: String) -> TemplateContextBuilder {
        TemplateContextBuilder::new(version, paper_size)
    }
}

/// Builder for TemplateContext
pub struct TemplateContextBuilder {
    context: TemplateContext,
}

impl TemplateContextBuilder {
    pub fn new(version: String, paper_size: String) -> Self {
        Self {
            context: TemplateContext::new(version, paper_size),
        }
    }

    /// Add a header line; absent values are left out
    pub fn header_field(mut self, name: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.context.header.push(HeaderField {
                name: name.to_string(),
                value,
            });
        }
        self
    }

    pub fn instrument(mut self, instrument: &InstrumentOutput) -> Self {
        self.context.instruments.push(InstrumentContext::from(instrument));
        self
    }

    pub fn build(self) -> TemplateContext {
        self.context
    }
}

/// Render the LilyPond document
pub fn render_lilypond(context: &TemplateContext) -> Result<String, ConversionError> {
    let template = mustache::compile_str(SCORE_TEMPLATE)
        .map_err(|e| ConversionError::Template(e.to_string()))?;
    template
        .render_to_string(context)
        .map_err(|e| ConversionError::Template(e.to_string()))
}
