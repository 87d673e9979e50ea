//! Pending expression markings
//!
//! Directions (dynamics, hairpins, text) arrive before the note they apply
//! to. They are collected here and handed to the next note as postfix
//! markup.

/// Hairpin terminator
pub const HAIRPIN_STOP: &str = "\\!";

/// Markings that end a running hairpin on their own
const DYNAMICS: &[&str] = &[
    "\\ppp", "\\pp", "\\p", "\\mp", "\\mf", "\\f", "\\ff", "\\fff", "\\fp", "\\sf", "\\sfz",
    "\\sfp", "\\<", "\\>", "\\cresc", "\\dim",
];

pub fn is_dynamic(mark: &str) -> bool {
    DYNAMICS.contains(&mark)
}

/// Set of markings waiting for the next note, kept in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionBuffer {
    marks: Vec<String>,
}

impl ExpressionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a marking. Empty input is ignored; a dynamic drops any pending
    /// hairpin stop, since both cannot terminate on the same note.
    pub fn add(&mut self, mark: impl Into<String>) {
        let mark = mark.into();
        if mark.is_empty() {
            return;
        }
        if !self.marks.contains(&mark) {
            self.marks.push(mark);
        }
        if self.marks.iter().any(|m| is_dynamic(m)) {
            self.marks.retain(|m| m != HAIRPIN_STOP);
        }
    }

    /// Queue every marking of `other`, in its order
    pub fn extend(&mut self, other: ExpressionBuffer) {
        for mark in other.marks {
            self.add(mark);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn contains(&self, mark: &str) -> bool {
        self.marks.iter().any(|m| m == mark)
    }

    /// Concatenate all pending markings
    pub fn render(&self) -> String {
        self.marks.concat()
    }
}
