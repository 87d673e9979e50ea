//! Musical events
//!
//! A `MusicalEvent` is one note, rest, spacer or grace note as it will
//! appear in the LilyPond stream. Chord members are folded into the
//! preceding event's pitch list, so one event may carry several pitches.

use std::collections::BTreeSet;
use std::fmt;

use roxmltree::Node;

use super::converter::ConversionContext;
use super::duration::{abs, encode_duration, note_type_token, note_type_value};
use super::errors::{TranscriptionError, TranscriptionResult};
use super::expression::ExpressionBuffer;
use super::parser::{element_children, get_child_text, required_child_value};
use super::types::Rational;

/// Invisible spacer pitch
pub const SPACER: &str = "s";
/// Rest that does not span the measure
pub const REST: &str = "r";
/// Whole-measure rest
pub const MEASURE_REST: &str = "R";
/// Repeat-previous-chord marker
pub const REPEAT_CHORD: &str = "q";

const OVERLAY_OPEN: &str = "<< {";
const OVERLAY_CLOSE: &str = "} >>";
const CUE_OPEN: &str = "\\new CueVoice { ";
const CUE_CLOSE: &str = " } ";

/// Timing context a note is read against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInfo {
    /// Ticks per quarter note
    pub divisions: i64,
    /// Current measure length as a fraction of a whole note
    pub measure_duration: Rational,
}

impl TimeInfo {
    /// Convert a tick count to a fraction of a whole note
    pub fn ticks_to_duration(&self, ticks: i64) -> Rational {
        Rational::new(ticks, self.divisions * 4)
    }

    /// One tick, the tolerance between written and measured durations
    pub fn tick(&self) -> Rational {
        Rational::new(1, self.divisions * 4)
    }
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self {
            divisions: 1,
            measure_duration: Rational::from_integer(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupletRatio {
    pub actual: i64,
    pub normal: i64,
}

/// One note, rest or spacer
#[derive(Debug, Clone, PartialEq)]
pub struct MusicalEvent {
    /// Pitch tokens; more than one for chords and harmonics
    pub pitches: Vec<String>,
    /// Duration token, e.g. `4` or `1*3`
    pub duration: String,
    /// Measured duration as a fraction of a whole note (zero for grace notes)
    pub duration_value: Rational,
    pub dots: u8,
    pub grace: bool,
    pub tuplet_open: Option<TupletRatio>,
    pub tuplet_close: bool,
    /// Concatenated articulation and fingering marks
    pub articulations: String,
    /// Markings from preceding directions
    pub expression: ExpressionBuffer,
    /// Trill, mordent or trill-span start
    pub ornament: Option<String>,
    pub glissando: bool,
    pub slur_start: bool,
    pub slur_stop: bool,
    pub tie: bool,
    pub chord: bool,
    pub cue: bool,
    pub cue_open: bool,
    pub cue_close: bool,
    /// Set when this is the first non-cue event after a cue passage
    pub ends_cue: bool,
    pub overlay_open: bool,
    pub overlay_close: bool,
    /// Markings that belong to the following event (trill span stops)
    pub next_expression: ExpressionBuffer,
}

impl MusicalEvent {
    fn empty() -> Self {
        Self {
            pitches: Vec::new(),
            duration: String::new(),
            duration_value: Rational::from_integer(0),
            dots: 0,
            grace: false,
            tuplet_open: None,
            tuplet_close: false,
            articulations: String::new(),
            expression: ExpressionBuffer::new(),
            ornament: None,
            glissando: false,
            slur_start: false,
            slur_stop: false,
            tie: false,
            chord: false,
            cue: false,
            cue_open: false,
            cue_close: false,
            ends_cue: false,
            overlay_open: false,
            overlay_close: false,
            next_expression: ExpressionBuffer::new(),
        }
    }

    /// Invisible event of the given length (forwards, backup padding)
    pub fn spacer(duration_value: Rational, time: TimeInfo, in_cue: bool) -> TranscriptionResult<Self> {
        Ok(Self {
            pitches: vec![SPACER.to_string()],
            duration: encode_duration(duration_value, time.measure_duration)?,
            duration_value,
            cue: in_cue,
            ..Self::empty()
        })
    }

    /// Whole-measure rest for the given measure length
    pub fn measure_rest(measure_duration: Rational) -> TranscriptionResult<Self> {
        Ok(Self {
            pitches: vec![MEASURE_REST.to_string()],
            duration: encode_duration(measure_duration, measure_duration)?,
            duration_value: measure_duration,
            ..Self::empty()
        })
    }

    /// Build an event from a `<note>` element.
    ///
    /// `in_cue` tells whether the previous event was part of a cue passage;
    /// the returned event's `cue` flag is the new cue state.
    pub fn from_note(
        note_node: Node,
        time: TimeInfo,
        in_cue: bool,
        context: &mut ConversionContext,
    ) -> TranscriptionResult<Self> {
        let mut event = Self::empty();
        event.pitches.push(String::new());

        let mut rest: Option<Node> = None;
        let mut measured: Option<Rational> = None;
        let mut note_type: Option<String> = None;
        let mut tuplet: Option<TupletRatio> = None;
        let mut notations: Vec<Node> = Vec::new();
        let mut cautionary = false;
        let mut harmonic = false;
        let mut hidden = false;

        for child in element_children(note_node) {
            match child.tag_name().name() {
                "chord" => event.chord = true,
                "pitch" => event.pitches = vec![spell_pitch(child)?],
                "rest" => rest = Some(child),
                "duration" => {
                    let ticks: i64 = child.text().unwrap_or("").trim().parse().map_err(|_| {
                        TranscriptionError::unsupported(format!(
                            "Invalid note duration: \"{}\"",
                            child.text().unwrap_or("")
                        ))
                    })?;
                    measured = Some(time.ticks_to_duration(ticks));
                }
                "dot" => event.dots += 1,
                "grace" => {
                    if child.attribute("slash") != Some("yes") {
                        context.add_skipped("grace", "Unslashed grace note written as acciaccatura");
                    }
                    event.grace = true;
                }
                "accidental" => cautionary = child.attribute("parentheses") == Some("yes"),
                "time-modification" => {
                    tuplet = Some(TupletRatio {
                        actual: required_child_value(child, "actual-notes")?,
                        normal: required_child_value(child, "normal-notes")?,
                    });
                }
                "type" => note_type = child.text().map(|t| t.trim().to_string()),
                "notations" => notations.push(child),
                "notehead" => match child.text().map(str::trim) {
                    Some("diamond") => harmonic = true,
                    Some("none") => hidden = true,
                    _ => {}
                },
                "cue" => event.cue = true,
                // Ties are read from <notations><tied>
                "tie" | "voice" | "stem" | "beam" | "lyric" | "instrument" | "staff" => {}
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized note child: \"{}\"",
                        other
                    )))
                }
            }
        }

        if cautionary {
            if let Some(first) = event.pitches.first_mut() {
                first.push('?');
            }
        }
        if harmonic {
            event.pitches.push("\\harmonic".to_string());
        }

        // Written duration, cross-checked against the tick count below
        let mut written: Option<Rational> = None;
        let is_measure_rest = rest.is_some_and(|r| {
            r.attribute("measure") == Some("yes")
                || (note_type.as_deref() == Some("whole") && measured == Some(time.measure_duration))
        });

        if rest.is_some() {
            if is_measure_rest {
                event.pitches = vec![MEASURE_REST.to_string()];
                event.duration = encode_duration(time.measure_duration, time.measure_duration)?;
                event.dots = 0;
                written = Some(time.measure_duration);
            } else {
                event.pitches = vec![REST.to_string()];
            }
        }

        if !is_measure_rest {
            match note_type.as_deref() {
                Some(type_name) => {
                    let (token, value) = note_type_token(type_name)
                        .zip(note_type_value(type_name))
                        .ok_or_else(|| {
                            TranscriptionError::unsupported(format!(
                                "Unrecognized note type: \"{}\"",
                                type_name
                            ))
                        })?;
                    event.duration = token.to_string();
                    written = Some(value * dot_factor(event.dots));
                }
                None => {
                    if let Some(value) = measured.filter(|v| *v > Rational::from_integer(0)) {
                        event.duration = encode_duration(value, time.measure_duration)?;
                        event.dots = 0;
                        written = Some(value);
                    }
                }
            }
            if let (Some(ratio), Some(value)) = (tuplet, written.as_mut()) {
                *value *= Rational::new(ratio.normal, ratio.actual);
            }
        }

        for notation in notations {
            event.apply_notations(notation, tuplet, context)?;
        }

        if hidden || note_node.attribute("print-object") == Some("no") {
            event.pitches = vec![SPACER.to_string()];
        }

        if event.cue && !in_cue {
            event.cue_open = true;
        }
        if !event.cue && in_cue {
            event.ends_cue = true;
        }

        if event.grace {
            return Ok(event);
        }

        let measured = measured.ok_or_else(|| {
            TranscriptionError::unsupported("Note without <duration> that is not a grace note")
        })?;
        event.duration_value = measured;
        let written = written.unwrap_or(measured);
        if abs(written - measured) >= time.tick() {
            return Err(TranscriptionError::consistency(format!(
                "Written duration {} does not match measured duration {}",
                written, measured
            )));
        }

        Ok(event)
    }

    fn apply_notations(
        &mut self,
        notations: Node,
        tuplet: Option<TupletRatio>,
        context: &mut ConversionContext,
    ) -> TranscriptionResult<()> {
        for child in element_children(notations) {
            let kind = child.attribute("type");
            match child.tag_name().name() {
                "tuplet" => match kind {
                    Some("start") => {
                        let ratio = tuplet.ok_or_else(|| {
                            TranscriptionError::unsupported("Tuplet start without <time-modification>")
                        })?;
                        self.tuplet_open = Some(ratio);
                    }
                    Some("stop") => self.tuplet_close = true,
                    _ => return Err(unrecognized("tuplet type", kind)),
                },
                "articulations" | "technical" => {
                    for mark in element_children(child) {
                        self.articulations.push_str(&articulation_token(mark)?);
                    }
                }
                "slur" => match kind {
                    Some("start") => self.slur_start = true,
                    Some("stop") => self.slur_stop = true,
                    Some("continue") => {}
                    _ => return Err(unrecognized("slur type", kind)),
                },
                "tied" => match kind {
                    Some("start") | Some("continue") => self.tie = true,
                    Some("stop") | Some("let-ring") => {}
                    _ => return Err(unrecognized("tied type", kind)),
                },
                "ornaments" => {
                    for ornament in element_children(child) {
                        self.apply_ornament(ornament, context)?;
                    }
                }
                "slide" | "glissando" => {
                    if kind == Some("start") {
                        self.glissando = true;
                    }
                }
                "fermata" => self.articulations.push_str("\\fermata"),
                "arpeggiate" => self.articulations.push_str("\\arpeggio"),
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized notation child: \"{}\"",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    fn apply_ornament(&mut self, ornament: Node, context: &mut ConversionContext) -> TranscriptionResult<()> {
        match ornament.tag_name().name() {
            "trill-mark" => self.ornament = Some("\\trill".to_string()),
            "inverted-mordent" => self.ornament = Some("\\prall".to_string()),
            "mordent" => self.ornament = Some("\\mordent".to_string()),
            "wavy-line" => match ornament.attribute("type") {
                Some("start") => {
                    if self.ornament.as_deref() != Some("\\trill") {
                        return Err(TranscriptionError::unsupported("Wavy line without trill"));
                    }
                    self.ornament = Some("\\startTrillSpan".to_string());
                }
                Some("stop") => self.next_expression.add("\\stopTrillSpan"),
                Some("continue") => {
                    context.add_skipped("wavy-line", "Continued wavy lines are not implemented")
                }
                other => return Err(unrecognized("wavy line type", other)),
            },
            other => {
                return Err(TranscriptionError::unsupported(format!(
                    "Unrecognized ornament: \"{}\"",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Fold a chord member into this event
    pub fn add_chord(&mut self, member: &MusicalEvent) {
        self.pitches.extend(member.pitches.iter().cloned());
        self.chord = true;
    }

    pub fn is_spacer(&self) -> bool {
        !self.pitches.is_empty() && self.pitches.iter().all(|p| p == SPACER)
    }

    /// Whether this event is an unadorned whole-measure rest of the given length
    pub fn is_measure_rest(&self, measure_duration: Rational) -> bool {
        self.pitches.len() == 1
            && self.pitches[0] == MEASURE_REST
            && self.duration_value == measure_duration
            && self.dots == 0
            && !self.grace
            && !self.chord
            && !self.cue
            && self.tuplet_open.is_none()
            && !self.tuplet_close
            && self.articulations.is_empty()
            && self.ornament.is_none()
            && !self.glissando
            && !self.slur_start
            && !self.slur_stop
            && !self.tie
    }

    /// Whether this chord restates `previous` (compared as pitch sets)
    pub fn repeats_chord(&self, previous: &[String]) -> bool {
        if !self.chord || self.is_spacer() || previous.iter().all(|p| p == SPACER) {
            return false;
        }
        let current: BTreeSet<&String> = self.pitches.iter().collect();
        let previous: BTreeSet<&String> = previous.iter().collect();
        current == previous
    }

    /// Replace the pitch list with the repeat-chord marker
    pub fn compress_to_repeat(&mut self) {
        self.pitches = vec![REPEAT_CHORD.to_string()];
    }

    fn head(&self) -> String {
        let is_repeat = self.pitches.len() == 1 && self.pitches[0] == REPEAT_CHORD;
        if is_repeat || (!self.chord && self.pitches.len() == 1) {
            return self.pitches.first().cloned().unwrap_or_default();
        }
        if self.is_spacer() {
            return SPACER.to_string();
        }
        format!("<{}>", self.pitches.join(" "))
    }
}

impl fmt::Display for MusicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overlay_open {
            f.write_str(OVERLAY_OPEN)?;
        }
        if self.cue_open {
            f.write_str(CUE_OPEN)?;
        }
        if let Some(ratio) = self.tuplet_open {
            write!(f, "\\tuplet {}/{} {{", ratio.actual, ratio.normal)?;
        }
        if self.grace {
            f.write_str("\\acciaccatura ")?;
        }
        write!(f, "{}{}", self.head(), self.duration)?;
        for _ in 0..self.dots {
            f.write_str(".")?;
        }
        f.write_str(&self.articulations)?;
        f.write_str(&self.expression.render())?;
        if let Some(ornament) = &self.ornament {
            f.write_str(ornament)?;
        }
        if self.glissando {
            f.write_str("\\glissando")?;
        }
        if self.slur_stop {
            f.write_str(")")?;
        }
        if self.slur_start {
            f.write_str("(")?;
        }
        if self.tie {
            f.write_str("~")?;
        }
        if self.tuplet_close {
            f.write_str("}")?;
        }
        if self.cue_close {
            f.write_str(CUE_CLOSE)?;
        }
        if self.overlay_close {
            f.write_str(OVERLAY_CLOSE)?;
        }
        Ok(())
    }
}

/// `<pitch>` to an English LilyPond note name with absolute octave marks
pub fn spell_pitch(pitch_node: Node) -> TranscriptionResult<String> {
    let step = get_child_text(pitch_node, "step")
        .ok_or_else(|| TranscriptionError::unsupported("pitch missing step element"))?;
    let step = step.trim();
    if !matches!(step, "A" | "B" | "C" | "D" | "E" | "F" | "G") {
        return Err(TranscriptionError::unsupported(format!("Invalid step: \"{}\"", step)));
    }

    let alter = match get_child_text(pitch_node, "alter") {
        None => "",
        Some(text) => {
            let value: f64 = text.trim().parse().map_err(|_| {
                TranscriptionError::unsupported(format!("Invalid alter: \"{}\"", text))
            })?;
            match value {
                v if v == 0.0 => "",
                v if v == 1.0 => "s",
                v if v == -1.0 => "f",
                v if v == 2.0 => "ss",
                v if v == -2.0 => "ff",
                _ => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unsupported alteration: {}",
                        text.trim()
                    )))
                }
            }
        }
    };

    let octave: i32 = required_child_value(pitch_node, "octave")?;
    let offset = octave - 3;
    let marks = if offset >= 0 {
        "'".repeat(offset as usize)
    } else {
        ",".repeat((-offset) as usize)
    };

    Ok(format!("{}{}{}", step.to_lowercase(), alter, marks))
}

fn articulation_token(mark: Node) -> TranscriptionResult<String> {
    let token = match mark.tag_name().name() {
        "fingering" => return Ok(format!("-{}", mark.text().unwrap_or("").trim())),
        "staccato" => ".",
        "tenuto" => "-",
        "accent" => ">",
        "staccatissimo" => "!",
        "strong-accent" => "^",
        "snap-pizzicato" => "\\snappizzicato",
        "down-bow" => "\\downbow",
        "up-bow" => "\\upbow",
        other => {
            return Err(TranscriptionError::unsupported(format!(
                "Unrecognized articulation type: \"{}\"",
                other
            )))
        }
    };
    Ok(format!("-{}", token))
}

/// Length multiplier for `dots` augmentation dots
fn dot_factor(dots: u8) -> Rational {
    let mut factor = Rational::from_integer(1);
    let mut add = Rational::new(1, 2);
    for _ in 0..dots {
        factor += add;
        add /= Rational::from_integer(2);
    }
    factor
}

fn unrecognized(what: &str, value: Option<&str>) -> TranscriptionError {
    TranscriptionError::unsupported(format!(
        "Unrecognized {}: \"{}\"",
        what,
        value.unwrap_or("")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn four_four() -> TimeInfo {
        TimeInfo {
            divisions: 4,
            measure_duration: Rational::from_integer(1),
        }
    }

    fn build(xml: &str) -> TranscriptionResult<MusicalEvent> {
        build_in(xml, four_four(), false)
    }

    fn build_in(xml: &str, time: TimeInfo, in_cue: bool) -> TranscriptionResult<MusicalEvent> {
        let doc = Document::parse(xml).unwrap();
        let mut context = ConversionContext::new("P1".to_string());
        MusicalEvent::from_note(doc.root_element(), time, in_cue, &mut context)
    }

    #[test]
    fn test_simple_note() {
        let event = build(
            "<note><pitch><step>C</step><octave>5</octave></pitch><duration>4</duration><type>quarter</type></note>",
        )
        .unwrap();
        assert_eq!(event.pitches, vec!["c''"]);
        assert_eq!(event.duration_value, Rational::new(1, 4));
        assert_eq!(event.to_string(), "c''4");
    }

    #[test]
    fn test_accidentals_and_low_octaves() {
        let event = build(
            "<note><pitch><step>B</step><alter>-1</alter><octave>1</octave></pitch><duration>8</duration><type>half</type><accidental parentheses=\"yes\">flat</accidental></note>",
        )
        .unwrap();
        assert_eq!(event.to_string(), "bf,,?2");
    }

    #[test]
    fn test_dotted_note_with_articulations_and_tie() {
        let event = build(
            r#"<note><pitch><step>F</step><alter>1</alter><octave>4</octave></pitch>
            <duration>6</duration><type>quarter</type><dot/>
            <notations><tied type="start"/><articulations><staccato/><accent/></articulations>
            <technical><fingering>3</fingering></technical><slur type="start"/></notations></note>"#,
        )
        .unwrap();
        assert_eq!(event.to_string(), "fs'4.-.->-3(~");
    }

    #[test]
    fn test_measure_rest_from_attribute() {
        let time = TimeInfo {
            divisions: 2,
            measure_duration: Rational::new(3, 4),
        };
        let event = build_in(
            "<note><rest measure=\"yes\"/><duration>6</duration></note>",
            time,
            false,
        )
        .unwrap();
        assert_eq!(event.to_string(), "R2.");
        assert!(event.is_measure_rest(Rational::new(3, 4)));
    }

    #[test]
    fn test_whole_rest_filling_measure_is_measure_rest() {
        let event = build("<note><rest/><duration>16</duration><type>whole</type></note>").unwrap();
        assert_eq!(event.to_string(), "R1");
    }

    #[test]
    fn test_short_rest() {
        let event = build("<note><rest/><duration>2</duration><type>eighth</type></note>").unwrap();
        assert_eq!(event.to_string(), "r8");
        assert!(!event.is_measure_rest(Rational::from_integer(1)));
    }

    #[test]
    fn test_tuplet_brackets() {
        let time = TimeInfo {
            divisions: 3,
            measure_duration: Rational::from_integer(1),
        };
        let start = build_in(
            r#"<note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration><type>eighth</type>
            <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>
            <notations><tuplet type="start"/></notations></note>"#,
            time,
            false,
        )
        .unwrap();
        assert_eq!(start.to_string(), "\\tuplet 3/2 {e'8");

        let stop = build_in(
            r#"<note><pitch><step>G</step><octave>4</octave></pitch><duration>1</duration><type>eighth</type>
            <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>
            <notations><tuplet type="stop"/></notations></note>"#,
            time,
            false,
        )
        .unwrap();
        assert_eq!(stop.to_string(), "g'8}");
    }

    #[test]
    fn test_duration_mismatch_is_consistency_error() {
        let err = build(
            "<note><pitch><step>C</step><octave>4</octave></pitch><duration>3</duration><type>quarter</type></note>",
        )
        .unwrap_err();
        assert!(err.is_consistency());
    }

    #[test]
    fn test_grace_note_is_exempt_from_duration_check() {
        let event = build(
            "<note><grace slash=\"yes\"/><pitch><step>D</step><octave>5</octave></pitch><type>eighth</type></note>",
        )
        .unwrap();
        assert_eq!(event.duration_value, Rational::from_integer(0));
        assert_eq!(event.to_string(), "\\acciaccatura d''8");
    }

    #[test]
    fn test_unslashed_grace_is_reported() {
        let doc = Document::parse(
            "<note><grace/><pitch><step>D</step><octave>5</octave></pitch><type>16th</type></note>",
        )
        .unwrap();
        let mut context = ConversionContext::new("P1".to_string());
        MusicalEvent::from_note(doc.root_element(), four_four(), false, &mut context).unwrap();
        assert_eq!(context.skipped_elements.len(), 1);
        assert_eq!(context.skipped_elements[0].element_type, "grace");
    }

    #[test]
    fn test_unknown_children_fail() {
        let err = build("<note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type><play/></note>")
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.message.contains("play"));

        let err = build(
            "<note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type><notations><articulations><doit/></articulations></notations></note>",
        )
        .unwrap_err();
        assert!(err.message.contains("doit"));
    }

    #[test]
    fn test_trill_span_and_stop_buffer() {
        let event = build(
            r#"<note><pitch><step>A</step><octave>4</octave></pitch><duration>16</duration><type>whole</type>
            <notations><ornaments><trill-mark/><wavy-line type="start"/></ornaments></notations></note>"#,
        )
        .unwrap();
        assert_eq!(event.to_string(), "a'1\\startTrillSpan");

        let event = build(
            r#"<note><pitch><step>A</step><octave>4</octave></pitch><duration>16</duration><type>whole</type>
            <notations><ornaments><wavy-line type="stop"/></ornaments></notations></note>"#,
        )
        .unwrap();
        assert_eq!(event.next_expression.render(), "\\stopTrillSpan");
        assert_eq!(event.to_string(), "a'1");
    }

    #[test]
    fn test_wavy_line_without_trill_fails() {
        let err = build(
            r#"<note><pitch><step>A</step><octave>4</octave></pitch><duration>16</duration><type>whole</type>
            <notations><ornaments><wavy-line type="start"/></ornaments></notations></note>"#,
        )
        .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_hidden_note_becomes_spacer() {
        let event = build(
            "<note print-object=\"no\"><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type></note>",
        )
        .unwrap();
        assert!(event.is_spacer());
        assert_eq!(event.to_string(), "s4");
    }

    #[test]
    fn test_harmonic_notehead() {
        let event = build(
            "<note><pitch><step>G</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type><notehead>diamond</notehead></note>",
        )
        .unwrap();
        assert_eq!(event.to_string(), "<g' \\harmonic>4");
    }

    #[test]
    fn test_cue_transitions() {
        let cue = "<note><cue/><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type></note>";
        let plain = "<note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type></note>";

        let first = build_in(cue, four_four(), false).unwrap();
        assert!(first.cue && first.cue_open);
        assert_eq!(first.to_string(), "\\new CueVoice { c'4");

        let second = build_in(cue, four_four(), true).unwrap();
        assert!(second.cue && !second.cue_open);

        let after = build_in(plain, four_four(), true).unwrap();
        assert!(!after.cue && after.ends_cue);
    }

    #[test]
    fn test_chord_accumulation() {
        let mut base = build(
            "<note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type></note>",
        )
        .unwrap();
        for step in ["E", "G", "B"] {
            let member = build(&format!(
                "<note><chord/><pitch><step>{}</step><octave>4</octave></pitch><duration>4</duration><type>quarter</type></note>",
                step
            ))
            .unwrap();
            assert!(member.chord);
            base.add_chord(&member);
        }
        assert!(base.chord);
        assert_eq!(base.pitches, vec!["c'", "e'", "g'", "b'"]);
        assert_eq!(base.to_string(), "<c' e' g' b'>4");
    }

    #[test]
    fn test_repeat_chord_detection() {
        let mut chord = MusicalEvent::spacer(Rational::new(1, 4), four_four(), false).unwrap();
        chord.pitches = vec!["e'".to_string(), "c'".to_string()];
        chord.chord = true;
        assert!(chord.repeats_chord(&["c'".to_string(), "e'".to_string()]));
        assert!(!chord.repeats_chord(&["c'".to_string()]));

        chord.compress_to_repeat();
        assert_eq!(chord.to_string(), "q4");

        let mut hidden = MusicalEvent::spacer(Rational::new(1, 4), four_four(), false).unwrap();
        hidden.pitches = vec![SPACER.to_string(), SPACER.to_string()];
        hidden.chord = true;
        assert!(!hidden.repeats_chord(&[SPACER.to_string()]));
        assert_eq!(hidden.to_string(), "s4");
    }

    #[test]
    fn test_spacer_uses_codec() {
        let spacer = MusicalEvent::spacer(Rational::new(5, 16), four_four(), false).unwrap();
        assert_eq!(spacer.to_string(), "s16*5");
    }

    #[test]
    fn test_dot_factor() {
        assert_eq!(dot_factor(0), Rational::from_integer(1));
        assert_eq!(dot_factor(1), Rational::new(3, 2));
        assert_eq!(dot_factor(2), Rational::new(7, 4));
    }
}
