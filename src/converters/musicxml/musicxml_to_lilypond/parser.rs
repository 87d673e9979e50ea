//! XML parsing layer for MusicXML documents
//!
//! This module provides wrappers around roxmltree for reading partwise
//! MusicXML documents. It exposes the document structure (part list,
//! parts, measures) and classifies measure children into a closed set of
//! kinds for the transcriber.

use std::borrow::Cow;
use std::collections::HashMap;

use roxmltree::{Document, Node};

use super::errors::{ParseError, TranscriptionError, TranscriptionResult};

// ============================================================================
// XML DOCUMENT WRAPPER
// ============================================================================

/// Remove the `<!DOCTYPE ...>` declaration, which roxmltree refuses to parse.
pub fn strip_doctype(xml: &str) -> Cow<'_, str> {
    let Some(start) = xml.find("<!DOCTYPE") else {
        return Cow::Borrowed(xml);
    };
    match xml[start..].find('>') {
        Some(len) => {
            let mut stripped = String::with_capacity(xml.len());
            stripped.push_str(&xml[..start]);
            stripped.push_str(&xml[start + len + 1..]);
            Cow::Owned(stripped)
        }
        None => Cow::Borrowed(xml),
    }
}

/// Wrapper around roxmltree::Document for MusicXML parsing
pub struct XmlDocument<'a> {
    doc: Document<'a>,
}

impl<'a> XmlDocument<'a> {
    /// Parse an XML string (already passed through [`strip_doctype`])
    pub fn parse(xml: &'a str) -> Result<XmlDocument<'a>, ParseError> {
        let doc = Document::parse(xml)
            .map_err(|e| ParseError::InvalidXml(format!("XML parse error: {}", e)))?;
        Ok(XmlDocument { doc })
    }

    /// Get the root score-partwise element
    pub fn get_score_partwise(&'a self) -> Result<Node<'a, 'a>, ParseError> {
        let root = self.doc.root_element();

        if root.tag_name().name() != "score-partwise" {
            return Err(ParseError::UnsupportedFormat(format!(
                "MusicXML file must be partwise, found {}",
                root.tag_name().name()
            )));
        }

        Ok(root)
    }

    /// Extract title: work/work-title, falling back to movement-title
    pub fn extract_title(&'a self) -> Option<String> {
        let score = self.get_score_partwise().ok()?;

        get_child(score, "work")
            .and_then(|work| get_child_text(work, "work-title"))
            .and_then(non_empty)
            .or_else(|| get_child_text(score, "movement-title").and_then(non_empty))
    }

    /// Extract composer from identification/creator
    pub fn extract_composer(&'a self) -> Option<String> {
        let score = self.get_score_partwise().ok()?;
        let identification = get_child(score, "identification")?;

        let creators: Vec<Node> = identification
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "creator")
            .collect();

        // Prefer an explicit composer credit
        creators
            .iter()
            .filter(|n| n.attribute("type") == Some("composer"))
            .chain(creators.iter())
            .find_map(|n| get_text(*n).and_then(non_empty))
    }

    /// Map of part id to display name from `<part-list>`
    pub fn part_names(&'a self) -> Result<HashMap<String, String>, ParseError> {
        let score = self.get_score_partwise()?;
        let part_list = get_child(score, "part-list").ok_or_else(|| {
            ParseError::MissingRequiredElement("score has no part-list".to_string())
        })?;

        let mut names = HashMap::new();
        for score_part in element_children(part_list).filter(|n| n.tag_name().name() == "score-part") {
            let Some(id) = score_part.attribute("id") else {
                continue;
            };
            let name = get_child_text(score_part, "part-name")
                .and_then(non_empty)
                .unwrap_or_else(|| id.to_string());
            names.insert(id.to_string(), name);
        }

        Ok(names)
    }

    /// Extract all parts from the document
    pub fn extract_parts(&'a self) -> Result<Vec<PartNode<'a>>, ParseError> {
        let score = self.get_score_partwise()?;

        let parts: Vec<PartNode> = score
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "part")
            .map(PartNode::new)
            .collect();

        if parts.is_empty() {
            return Err(ParseError::MissingRequiredElement(
                "No parts found in score".to_string(),
            ));
        }

        Ok(parts)
    }
}

// ============================================================================
// PART AND MEASURE NODES
// ============================================================================

/// Wrapper around a MusicXML <part> element
#[derive(Clone, Copy)]
pub struct PartNode<'a> {
    node: Node<'a, 'a>,
}

impl<'a> PartNode<'a> {
    pub fn new(node: Node<'a, 'a>) -> Self {
        Self { node }
    }

    /// Get the part ID from the id attribute
    pub fn get_part_id(&self) -> String {
        self.node.attribute("id").unwrap_or("unknown").to_string()
    }

    /// Get all measures in this part; anything else under <part> is rejected
    pub fn get_measures(&self) -> TranscriptionResult<Vec<MeasureNode<'a>>> {
        element_children(self.node)
            .map(|n| {
                if n.tag_name().name() == "measure" {
                    Ok(MeasureNode::new(n))
                } else {
                    Err(TranscriptionError::unsupported(format!(
                        "Unexpected part child: \"{}\"",
                        n.tag_name().name()
                    )))
                }
            })
            .collect()
    }
}

/// Wrapper around a MusicXML <measure> element
#[derive(Clone, Copy)]
pub struct MeasureNode<'a> {
    node: Node<'a, 'a>,
}

impl<'a> MeasureNode<'a> {
    pub fn new(node: Node<'a, 'a>) -> Self {
        Self { node }
    }

    /// The measure number as written (may be non-numeric, e.g. "X1")
    pub fn get_number(&self) -> String {
        self.node.attribute("number").unwrap_or("?").to_string()
    }

    /// All children in document order, classified
    pub fn get_children(&self) -> Vec<MeasureChild<'a>> {
        element_children(self.node).map(MeasureChild::classify).collect()
    }
}

/// The measure-level elements the transcriber understands
#[derive(Clone, Copy, Debug)]
pub enum MeasureChild<'a> {
    Note(Node<'a, 'a>),
    Forward(Node<'a, 'a>),
    Backup(Node<'a, 'a>),
    Attributes(Node<'a, 'a>),
    Direction(Node<'a, 'a>),
    Barline(Node<'a, 'a>),
    Print(Node<'a, 'a>),
    /// Anything else; transcribing it is an error
    Unsupported(Node<'a, 'a>),
}

impl<'a> MeasureChild<'a> {
    pub fn classify(node: Node<'a, 'a>) -> Self {
        match node.tag_name().name() {
            "note" => Self::Note(node),
            "forward" => Self::Forward(node),
            "backup" => Self::Backup(node),
            "attributes" => Self::Attributes(node),
            "direction" => Self::Direction(node),
            "barline" => Self::Barline(node),
            "print" => Self::Print(node),
            _ => Self::Unsupported(node),
        }
    }

    pub fn tag(&self) -> &'a str {
        self.node().tag_name().name()
    }

    pub fn node(&self) -> Node<'a, 'a> {
        match *self {
            Self::Note(n)
            | Self::Forward(n)
            | Self::Backup(n)
            | Self::Attributes(n)
            | Self::Direction(n)
            | Self::Barline(n)
            | Self::Print(n)
            | Self::Unsupported(n) => n,
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Iterate over element children only
pub fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Get first child element with given tag name
pub fn get_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

/// Get text content of a node
pub fn get_text(node: Node) -> Option<String> {
    node.text().map(|s| s.to_string())
}

/// Get text content of first child with given tag
pub fn get_child_text(node: Node, tag: &str) -> Option<String> {
    get_child(node, tag).and_then(get_text)
}

/// Get and parse the text of a required child element
pub fn required_child_value<T: std::str::FromStr>(node: Node, tag: &str) -> TranscriptionResult<T> {
    let text = get_child_text(node, tag).ok_or_else(|| {
        TranscriptionError::unsupported(format!(
            "<{}> missing {} element",
            node.tag_name().name(),
            tag
        ))
    })?;
    text.trim().parse().map_err(|_| {
        TranscriptionError::unsupported(format!("Invalid {} value: \"{}\"", tag, text))
    })
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// ATTRIBUTE PARSING HELPERS
// ============================================================================

/// Parse key signature from attributes: (fifths, mode)
pub fn parse_key(key_node: Node) -> Option<(i8, String)> {
    let fifths = get_child_text(key_node, "fifths").and_then(|s| s.trim().parse().ok())?;

    let mode = get_child_text(key_node, "mode").unwrap_or_else(|| "major".to_string());

    Some((fifths, mode))
}

/// Parse time signature from attributes: (beats, beat-type)
pub fn parse_time(time_node: Node) -> Option<(u32, u32)> {
    let beats = get_child_text(time_node, "beats").and_then(|s| s.trim().parse().ok())?;

    let beat_type = get_child_text(time_node, "beat-type").and_then(|s| s.trim().parse().ok())?;

    Some((beats, beat_type))
}

/// Parse clef from attributes: (sign, line, octave change)
pub fn parse_clef(clef_node: Node) -> Option<(String, Option<u8>, Option<i8>)> {
    let sign = get_child_text(clef_node, "sign")?;

    let line = get_child_text(clef_node, "line").and_then(|s| s.trim().parse().ok());
    let octave_change =
        get_child_text(clef_node, "clef-octave-change").and_then(|s| s.trim().parse().ok());

    Some((sign.trim().to_string(), line, octave_change))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN"
  "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <work><work-title>Little Suite</work-title></work>
  <movement-title>Ignored</movement-title>
  <identification>
    <creator type="lyricist">Somebody Else</creator>
    <creator type="composer">A. Composer</creator>
  </identification>
  <part-list>
    <score-part id="P1"><part-name>Alto Sax</part-name></score-part>
    <score-part id="P2"><part-name></part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <print/>
      <attributes><divisions>1</divisions></attributes>
      <note><rest/><duration>4</duration></note>
      <harmony/>
    </measure>
  </part>
  <part id="P2">
    <measure number="1"/>
  </part>
</score-partwise>"#;

    #[test]
    fn test_strip_multiline_doctype() {
        let stripped = strip_doctype(SCORE);
        assert!(!stripped.contains("DOCTYPE"));
        assert!(stripped.contains("<score-partwise"));
        assert!(matches!(strip_doctype("<a/>"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_parse_structure_and_metadata() {
        let source = strip_doctype(SCORE);
        let doc = XmlDocument::parse(&source).unwrap();

        assert_eq!(doc.extract_title().as_deref(), Some("Little Suite"));
        assert_eq!(doc.extract_composer().as_deref(), Some("A. Composer"));

        let names = doc.part_names().unwrap();
        assert_eq!(names.get("P1").map(String::as_str), Some("Alto Sax"));
        // Empty part-name falls back to the id
        assert_eq!(names.get("P2").map(String::as_str), Some("P2"));

        let parts = doc.extract_parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].get_part_id(), "P1");

        let measures = parts[0].get_measures().unwrap();
        assert_eq!(measures.len(), 1);
        assert_eq!(measures[0].get_number(), "1");

        let children = measures[0].get_children();
        assert_eq!(children.len(), 4);
        assert!(matches!(children[0], MeasureChild::Print(_)));
        assert!(matches!(children[1], MeasureChild::Attributes(_)));
        assert!(matches!(children[2], MeasureChild::Note(_)));
        assert!(matches!(children[3], MeasureChild::Unsupported(_)));
        assert_eq!(children[3].tag(), "harmony");
    }

    #[test]
    fn test_rejects_timewise() {
        let doc = XmlDocument::parse("<score-timewise/>").unwrap();
        assert!(matches!(
            doc.extract_parts(),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_required_child_value() {
        let doc = Document::parse("<forward><duration> 6 </duration></forward>").unwrap();
        let value: i64 = required_child_value(doc.root_element(), "duration").unwrap();
        assert_eq!(value, 6);

        let doc = Document::parse("<forward/>").unwrap();
        let err = required_child_value::<i64>(doc.root_element(), "duration").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_parse_clef_with_octave_change() {
        let doc = Document::parse(
            "<clef><sign>G</sign><line>2</line><clef-octave-change>-1</clef-octave-change></clef>",
        )
        .unwrap();
        assert_eq!(
            parse_clef(doc.root_element()),
            Some(("G".to_string(), Some(2), Some(-1)))
        );
    }
}
