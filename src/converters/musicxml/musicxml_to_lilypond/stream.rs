//! Instrument output stream
//!
//! The output of one instrument is an indexed sequence of tokens rather than
//! a string, because several steps rewrite tokens after they were emitted
//! (closing a cue passage, collapsing an empty overlay, merging rest runs).

use std::fmt;

use super::event::MusicalEvent;

/// Separator between the two voices of an overlay
pub const VOICE_SEPARATOR: &str = "} \\\\ {";
/// Separator used when the second voice holds no visible notes
pub const BRACE_SEPARATOR: &str = "} {";
/// Space placed before every flushed measure token
pub const TOKEN_SPACE: &str = " ";
/// Bar check closing each measure
pub const BAR_CHECK: &str = "|\n";

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Event(MusicalEvent),
    Literal(String),
}

impl Token {
    pub fn literal(text: impl Into<String>) -> Self {
        Token::Literal(text.into())
    }

    pub fn as_event(&self) -> Option<&MusicalEvent> {
        match self {
            Token::Event(event) => Some(event),
            Token::Literal(_) => None,
        }
    }

    pub fn as_event_mut(&mut self) -> Option<&mut MusicalEvent> {
        match self {
            Token::Event(event) => Some(event),
            Token::Literal(_) => None,
        }
    }

    /// Whether this is the literal `text`
    pub fn is_literal(&self, text: &str) -> bool {
        matches!(self, Token::Literal(literal) if literal == text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Event(event) => event.fmt(f),
            Token::Literal(text) => f.write_str(text),
        }
    }
}

impl From<MusicalEvent> for Token {
    fn from(event: MusicalEvent) -> Self {
        Token::Event(event)
    }
}

/// Most recently emitted event in `tokens`
pub fn last_event_mut(tokens: &mut [Token]) -> Option<&mut MusicalEvent> {
    tokens.iter_mut().rev().find_map(Token::as_event_mut)
}

/// Index of the last occurrence of the literal `text`
pub fn rposition_literal(tokens: &[Token], text: &str) -> Option<usize> {
    tokens.iter().rposition(|t| t.is_literal(text))
}

pub fn render_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::musicxml::musicxml_to_lilypond::event::TimeInfo;
    use crate::converters::musicxml::musicxml_to_lilypond::types::Rational;

    fn spacer() -> MusicalEvent {
        MusicalEvent::spacer(Rational::new(1, 4), TimeInfo::default(), false).unwrap()
    }

    #[test]
    fn test_last_event_skips_literals() {
        let mut tokens = vec![
            Token::from(spacer()),
            Token::literal(VOICE_SEPARATOR),
            Token::literal(TOKEN_SPACE),
        ];
        let event = last_event_mut(&mut tokens).unwrap();
        event.cue_close = true;
        assert_eq!(render_tokens(&tokens), "s4 } } \\\\ { ");
    }

    #[test]
    fn test_last_event_on_literals_only() {
        let mut tokens = vec![Token::literal("\\time 3/4")];
        assert!(last_event_mut(&mut tokens).is_none());
    }

    #[test]
    fn test_rposition_literal() {
        let tokens = vec![
            Token::literal(VOICE_SEPARATOR),
            Token::from(spacer()),
            Token::literal(VOICE_SEPARATOR),
        ];
        assert_eq!(rposition_literal(&tokens, VOICE_SEPARATOR), Some(2));
        assert_eq!(rposition_literal(&tokens, BRACE_SEPARATOR), None);
    }
}
