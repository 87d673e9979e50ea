//! MusicXML measure transcription
//!
//! Walks one `<part>` measure by measure, threading an `InstrumentState`
//! through each step. Every measure's tokens are collected in a pending
//! list first, since backups, pickups and overlay cleanup rewrite tokens of
//! the current measure before it is flushed to the instrument output.

use std::mem;

use roxmltree::Node;

use super::duration::{encode_duration, note_type_token};
use super::errors::{TranscriptionError, TranscriptionResult};
use super::event::{MusicalEvent, TimeInfo};
use super::expression::{ExpressionBuffer, HAIRPIN_STOP};
use super::lilypond::escape_lilypond_string;
use super::multi_rest::{compress_rest_run, RestRun};
use super::parser::{
    element_children, get_child, get_child_text, parse_clef, parse_key, parse_time,
    required_child_value, MeasureChild, MeasureNode, PartNode,
};
use super::stream::{
    last_event_mut, render_tokens, rposition_literal, Token, BAR_CHECK, BRACE_SEPARATOR,
    TOKEN_SPACE, VOICE_SEPARATOR,
};
use super::types::{Rational, SkippedElement};

/// Conversion context that collects notices for one part
pub struct ConversionContext {
    pub current_measure: Option<String>,
    pub current_part_id: String,
    pub skipped_elements: Vec<SkippedElement>,
}

impl ConversionContext {
    pub fn new(part_id: String) -> Self {
        Self {
            current_measure: None,
            current_part_id: part_id,
            skipped_elements: Vec::new(),
        }
    }

    /// Record a construct that was skipped but does not stop transcription
    pub fn add_skipped(&mut self, element_type: &str, reason: &str) {
        log::warn!(
            "{} in part {}, measure {}: {}",
            element_type,
            self.current_part_id,
            self.current_measure.as_deref().unwrap_or("-"),
            reason
        );
        self.skipped_elements.push(SkippedElement {
            element_type: element_type.to_string(),
            measure_number: self.current_measure.clone(),
            part_id: Some(self.current_part_id.clone()),
            reason: reason.to_string(),
        });
    }
}

/// Rest run that ended partway through a measure
#[derive(Debug, Clone, Copy)]
struct RestRunEnd {
    run: RestRun,
    /// Position in the pending list where the run was interrupted
    pending_index: usize,
}

/// Per-measure scratch state
#[derive(Debug, Default)]
struct MeasureState {
    pending: Vec<Token>,
    rest_run_ends: Vec<RestRunEnd>,
    /// Close any rest run once this measure is flushed
    close_rest_run: bool,
    /// Index of the `\partial` placeholder in the first measure
    pickup_placeholder: Option<usize>,
    first_measure: bool,
}

/// Rolling state of one instrument, carried from measure to measure
#[derive(Debug)]
pub struct InstrumentState {
    pub time: TimeInfo,
    /// Duration the open voice overlay still has to fill (zero when closed)
    pub remaining_backup: Rational,
    pub in_cue: bool,
    /// Markings waiting for the next note
    pub expression: ExpressionBuffer,
    /// Pitches of the last flushed chord
    pub last_chord: Option<Vec<String>>,
    /// Whole-measure rests seen since the last interruption
    pub rest_run: u32,
    pub rest_run_duration: Rational,
    pub measures_seen: u32,
    pub output: Vec<Token>,
}

impl Default for InstrumentState {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentState {
    pub fn new() -> Self {
        let time = TimeInfo::default();
        Self {
            time,
            remaining_backup: zero(),
            in_cue: false,
            expression: ExpressionBuffer::new(),
            last_chord: None,
            rest_run: 0,
            rest_run_duration: time.measure_duration,
            measures_seen: 0,
            output: Vec::new(),
        }
    }

    /// Transcribe one measure and append it to the output
    pub fn transcribe_measure(
        &mut self,
        measure: &MeasureNode,
        comment_period: u32,
        context: &mut ConversionContext,
    ) -> TranscriptionResult<()> {
        let number = measure.get_number();
        context.current_measure = Some(number.clone());

        if comment_period > 0 {
            if let Ok(n) = number.parse::<u32>() {
                if n % comment_period == 1 % comment_period {
                    self.output.push(Token::literal(format!("% Measure {}\n", number)));
                }
            }
        }

        let mut m = MeasureState {
            first_measure: self.measures_seen == 0,
            ..MeasureState::default()
        };
        self.measures_seen += 1;

        for child in measure.get_children() {
            match child {
                MeasureChild::Note(node) => {
                    let event = MusicalEvent::from_note(node, self.time, self.in_cue, context)?;
                    self.track_rest_run(&event, &mut m);
                    self.add_note(event, &mut m)?;
                }
                MeasureChild::Forward(node) => {
                    let ticks: i64 = required_child_value(node, "duration")?;
                    let duration = self.time.ticks_to_duration(ticks);
                    let event = MusicalEvent::spacer(duration, self.time, self.in_cue)?;
                    self.track_rest_run(&event, &mut m);
                    self.add_note(event, &mut m)?;
                }
                MeasureChild::Attributes(node) => self.apply_attributes(node, &mut m, context)?,
                MeasureChild::Direction(node) => self.apply_direction(node, &mut m)?,
                MeasureChild::Barline(node) => self.apply_barline(node, &mut m, context)?,
                MeasureChild::Backup(node) => self.apply_backup(node, &mut m, context)?,
                // Layout hints only
                MeasureChild::Print(_) => {}
                MeasureChild::Unsupported(_) => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized measure child: \"{}\"",
                        child.tag()
                    )))
                }
            }
        }

        self.finish_measure(m)?;
        log::debug!("Measure: {}", number);
        Ok(())
    }

    /// Close anything still open once the last measure has been flushed
    pub fn finish_part(&mut self) -> TranscriptionResult<()> {
        if self.rest_run > 0 {
            let run = self.take_rest_run();
            let end = self.output.len();
            compress_rest_run(&mut self.output, end, run)?;
        }
        if self.in_cue {
            if let Some(last) = last_event_mut(&mut self.output) {
                last.cue_close = true;
            }
            self.in_cue = false;
        }
        if !self.expression.is_empty() {
            log::debug!("Dropping markings after the last note: {}", self.expression.render());
        }
        Ok(())
    }

    fn add_note(&mut self, mut event: MusicalEvent, m: &mut MeasureState) -> TranscriptionResult<()> {
        self.in_cue = event.cue;

        if event.chord {
            let head = m
                .pending
                .last_mut()
                .and_then(Token::as_event_mut)
                .ok_or_else(|| {
                    TranscriptionError::consistency("Chord note without a preceding note")
                })?;
            head.add_chord(&event);
            head.expression.extend(mem::take(&mut self.expression));
            self.expression.extend(mem::take(&mut event.next_expression));
            return Ok(());
        }

        if event.ends_cue {
            let previous = last_event_mut(&mut m.pending).or_else(|| last_event_mut(&mut self.output));
            if let Some(previous) = previous {
                previous.cue_close = true;
            }
        }

        let next = mem::take(&mut event.next_expression);
        event.expression = mem::replace(&mut self.expression, next);

        let overlay_open = self.remaining_backup > zero();
        let duration = event.duration_value;
        m.pending.push(Token::Event(event));

        if overlay_open {
            self.remaining_backup -= duration;
            if self.remaining_backup == zero() {
                if let Some(last) = last_event_mut(&mut m.pending) {
                    last.overlay_close = true;
                }
                collapse_empty_overlay(&mut m.pending);
            } else if self.remaining_backup < zero() {
                return Err(TranscriptionError::consistency("Backup duration surpassed"));
            }
        }
        Ok(())
    }

    fn track_rest_run(&mut self, event: &MusicalEvent, m: &mut MeasureState) {
        if event.chord {
            return;
        }
        if event.is_measure_rest(self.time.measure_duration) {
            self.rest_run += 1;
            self.rest_run_duration = self.time.measure_duration;
        } else {
            self.interrupt_rest_run(m);
        }
    }

    /// End the current rest run at the current end of the pending list
    fn interrupt_rest_run(&mut self, m: &mut MeasureState) {
        if self.rest_run > 0 {
            let run = self.take_rest_run();
            m.rest_run_ends.push(RestRunEnd {
                run,
                pending_index: m.pending.len(),
            });
        }
    }

    fn take_rest_run(&mut self) -> RestRun {
        let run = RestRun {
            count: self.rest_run,
            measure_duration: self.rest_run_duration,
        };
        self.rest_run = 0;
        run
    }

    fn apply_attributes(
        &mut self,
        node: Node,
        m: &mut MeasureState,
        context: &mut ConversionContext,
    ) -> TranscriptionResult<()> {
        for child in element_children(node) {
            let tag = child.tag_name().name();
            match tag {
                "divisions" => {
                    let divisions: i64 = child.text().unwrap_or("").trim().parse().unwrap_or(0);
                    if divisions <= 0 {
                        return Err(TranscriptionError::unsupported(format!(
                            "Invalid divisions: \"{}\"",
                            child.text().unwrap_or("")
                        )));
                    }
                    self.time.divisions = divisions;
                }
                "key" => {
                    self.interrupt_rest_run(m);
                    let (fifths, mode) = parse_key(child)
                        .ok_or_else(|| TranscriptionError::unsupported("Key without fifths"))?;
                    m.pending.push(Token::literal(key_signature(fifths, &mode)?));
                }
                "time" => {
                    self.interrupt_rest_run(m);
                    let (beats, beat_type) = parse_time(child).ok_or_else(|| {
                        TranscriptionError::unsupported("Time signature without numeric beats")
                    })?;
                    if beats == 0 || beat_type == 0 {
                        return Err(TranscriptionError::unsupported(format!(
                            "Invalid time signature {}/{}",
                            beats, beat_type
                        )));
                    }
                    self.time.measure_duration = Rational::new(i64::from(beats), i64::from(beat_type));
                    m.pending.push(Token::literal(format!("\\time {}/{}", beats, beat_type)));
                    if m.first_measure && m.pickup_placeholder.is_none() {
                        m.pickup_placeholder = Some(m.pending.len());
                        m.pending.push(Token::literal("\\partial"));
                    }
                }
                "clef" => {
                    self.interrupt_rest_run(m);
                    let (sign, line, octave_change) = parse_clef(child)
                        .ok_or_else(|| TranscriptionError::unsupported("Clef without sign"))?;
                    m.pending.push(Token::literal(clef_token(&sign, line, octave_change)?));
                }
                "measure-style" => {
                    if get_child(child, "multiple-rest").is_none() {
                        return Err(TranscriptionError::unsupported(format!(
                            "Unrecognized attribute: \"{}\"",
                            tag
                        )));
                    }
                }
                "transpose" | "staves" | "staff-details" => {
                    context.add_skipped(tag, "Unimplemented attribute");
                }
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized attribute: \"{}\"",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    fn apply_direction(&mut self, node: Node, m: &mut MeasureState) -> TranscriptionResult<()> {
        self.interrupt_rest_run(m);
        for child in element_children(node) {
            match child.tag_name().name() {
                "direction-type" => {
                    for kind in element_children(child) {
                        self.apply_direction_type(kind, m)?;
                    }
                }
                "voice" => {
                    let voice = child.text().unwrap_or("").trim();
                    if voice != "1" {
                        return Err(TranscriptionError::unsupported(format!(
                            "Direction in voice {}; only one voice per part is supported",
                            voice
                        )));
                    }
                }
                "sound" | "staff" | "offset" => {}
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized direction: \"{}\"",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    fn apply_direction_type(&mut self, kind: Node, m: &mut MeasureState) -> TranscriptionResult<()> {
        match kind.tag_name().name() {
            "dynamics" => {
                for dynamic in element_children(kind) {
                    let tag = dynamic.tag_name().name();
                    if !matches!(
                        tag,
                        "ppp" | "pp" | "p" | "mp" | "mf" | "f" | "ff" | "fff" | "fp" | "sf" | "sfz" | "sfp"
                    ) {
                        return Err(TranscriptionError::unsupported(format!(
                            "Unrecognized dynamic: \"{}\"",
                            tag
                        )));
                    }
                    self.expression.add(format!("\\{}", tag));
                }
            }
            "wedge" => match kind.attribute("type") {
                Some("crescendo") => self.expression.add("\\<"),
                Some("diminuendo") => self.expression.add("\\>"),
                Some("stop") => self.expression.add(HAIRPIN_STOP),
                Some("continue") => {}
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized wedge type: \"{}\"",
                        other.unwrap_or("")
                    )))
                }
            },
            "words" => {
                let text = kind.text().unwrap_or("").trim();
                match text {
                    "" => {}
                    "cresc." => self.expression.add("\\cresc"),
                    "dim." => self.expression.add("\\dim"),
                    _ => self.expression.add(format!(
                        "-\\markup{{\\italic \"{}\"}}",
                        escape_lilypond_string(text)
                    )),
                }
            }
            "dashes" => {
                if kind.attribute("type") == Some("stop") {
                    self.expression.add(HAIRPIN_STOP);
                }
            }
            "metronome" => {
                let unit = get_child_text(kind, "beat-unit").unwrap_or_default();
                let token = note_type_token(unit.trim()).ok_or_else(|| {
                    TranscriptionError::unsupported(format!("Unrecognized beat unit: \"{}\"", unit))
                })?;
                let dots = ".".repeat(element_children(kind).filter(|n| n.has_tag_name("beat-unit-dot")).count());
                let per_minute = get_child_text(kind, "per-minute").ok_or_else(|| {
                    TranscriptionError::unsupported("Metronome mark without per-minute")
                })?;
                m.pending.push(Token::literal(format!(
                    "\\tempo {}{} = {}",
                    token,
                    dots,
                    per_minute.trim()
                )));
            }
            "octave-shift" => {
                let size: i32 = kind.attribute("size").and_then(|s| s.trim().parse().ok()).unwrap_or(8);
                let octaves = (size + 1) / 7;
                let shift = match kind.attribute("type") {
                    Some("up") => -octaves,
                    Some("down") => octaves,
                    Some("stop") => 0,
                    other => {
                        return Err(TranscriptionError::unsupported(format!(
                            "Unrecognized octave shift type: \"{}\"",
                            other.unwrap_or("")
                        )))
                    }
                };
                m.pending.push(Token::literal(format!("\\ottava #{}", shift)));
            }
            other => {
                return Err(TranscriptionError::unsupported(format!(
                    "Unrecognized direction type: \"{}\"",
                    other
                )))
            }
        }
        Ok(())
    }

    fn apply_barline(
        &mut self,
        node: Node,
        m: &mut MeasureState,
        context: &mut ConversionContext,
    ) -> TranscriptionResult<()> {
        // A rest run never spans a bar token, or merging would splice it away
        self.interrupt_rest_run(m);

        for child in element_children(node) {
            match child.tag_name().name() {
                "bar-style" | "repeat" => {}
                "ending" => context.add_skipped("ending", "Alternate endings are not transcribed"),
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized barline child: \"{}\"",
                        other
                    )))
                }
            }
        }

        let bar = if let Some(repeat) = get_child(node, "repeat") {
            match repeat.attribute("direction") {
                Some("forward") => ".|:",
                Some("backward") => {
                    m.close_rest_run = true;
                    ":|."
                }
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized repeat direction: \"{}\"",
                        other.unwrap_or("")
                    )))
                }
            }
        } else if let Some(style) = get_child_text(node, "bar-style") {
            m.close_rest_run = true;
            match style.trim() {
                "light-light" => "||",
                "light-heavy" => "|.",
                "heavy-light" => ".|",
                "regular" => "|",
                "dashed" => "!",
                other => {
                    return Err(TranscriptionError::unsupported(format!(
                        "Unrecognized bar style: \"{}\"",
                        other
                    )))
                }
            }
        } else {
            m.close_rest_run = true;
            return Ok(());
        };

        m.pending.push(Token::literal(format!("\\bar \"{}\"", bar)));
        Ok(())
    }

    fn apply_backup(
        &mut self,
        node: Node,
        m: &mut MeasureState,
        context: &mut ConversionContext,
    ) -> TranscriptionResult<()> {
        let ticks: i64 = required_child_value(node, "duration")?;
        let amount = self.time.ticks_to_duration(ticks);
        if amount == zero() {
            return Ok(());
        }
        if self.remaining_backup > zero() {
            return Err(TranscriptionError::unsupported(
                "Backup while a voice overlay is still open",
            ));
        }

        let mut walked = zero();
        let mut landing = None;
        for (index, token) in m.pending.iter().enumerate().rev() {
            let Some(event) = token.as_event() else {
                continue;
            };
            walked += event.duration_value;
            if walked == amount {
                landing = Some(index);
                break;
            }
            if walked > amount {
                break;
            }
        }

        let index = landing
            .ok_or_else(|| TranscriptionError::consistency("Backup duration could not be met"))?;
        if let Some(event) = m.pending[index].as_event_mut() {
            event.overlay_open = true;
        }
        m.pending.push(Token::literal(VOICE_SEPARATOR));
        self.remaining_backup = amount;

        if self.rest_run > 0 {
            self.rest_run = 0;
            context.add_skipped("backup", "Backup during extended rest; rest run discarded");
        }
        Ok(())
    }

    fn finish_measure(&mut self, mut m: MeasureState) -> TranscriptionResult<()> {
        if self.remaining_backup > zero() {
            let padding = MusicalEvent::spacer(self.remaining_backup, self.time, self.in_cue)?;
            self.add_note(padding, &mut m)?;
        }

        if let Some(index) = m.pickup_placeholder {
            let voice_end = m
                .pending
                .iter()
                .position(|t| t.is_literal(VOICE_SEPARATOR) || t.is_literal(BRACE_SEPARATOR))
                .unwrap_or(m.pending.len());
            let lead = m.pending[..voice_end]
                .iter()
                .filter_map(Token::as_event)
                .fold(zero(), |sum, event| sum + event.duration_value);

            if lead > zero() && lead < self.time.measure_duration {
                let token = encode_duration(lead, self.time.measure_duration)?;
                m.pending[index] = Token::literal(format!("\\partial {}", token));
            } else {
                m.pending.remove(index);
                for end in &mut m.rest_run_ends {
                    if end.pending_index > index {
                        end.pending_index -= 1;
                    }
                }
            }
        }

        let base = self.output.len();
        for mut token in m.pending {
            self.output.push(Token::literal(TOKEN_SPACE));
            if let Token::Event(event) = &mut token {
                let repeats = self
                    .last_chord
                    .as_deref()
                    .is_some_and(|previous| event.repeats_chord(previous));
                if repeats {
                    event.compress_to_repeat();
                } else if event.chord {
                    self.last_chord = Some(event.pitches.clone());
                }
            }
            self.output.push(token);
        }

        // Latest run first, so earlier end positions stay valid
        if m.close_rest_run && self.rest_run > 0 {
            let run = self.take_rest_run();
            let end = self.output.len();
            compress_rest_run(&mut self.output, end, run)?;
        }
        for end in m.rest_run_ends.iter().rev() {
            compress_rest_run(&mut self.output, base + 2 * end.pending_index, end.run)?;
        }

        self.output.push(Token::literal(BAR_CHECK));
        Ok(())
    }
}

/// Transcribe a whole part into LilyPond music
pub fn transcribe_part(
    part: &PartNode,
    comment_period: u32,
    context: &mut ConversionContext,
) -> TranscriptionResult<String> {
    let part_id = part.get_part_id();
    let measures = part.get_measures().map_err(|e| e.with_part(&part_id))?;

    let mut state = InstrumentState::new();
    for measure in &measures {
        state
            .transcribe_measure(measure, comment_period, context)
            .map_err(|e| e.with_part(&part_id).with_measure(measure.get_number()))?;
    }
    state.finish_part().map_err(|e| e.with_part(&part_id))?;

    log::info!("Transcribed part {} ({} measures)", part_id, measures.len());
    Ok(render_tokens(&state.output))
}

/// Turn the secondary voice separator into a plain brace pair when the
/// voice that just closed holds nothing visible.
///
/// Notes inside a cue passage that has not been closed yet do not count.
fn collapse_empty_overlay(tokens: &mut [Token]) {
    let Some(separator) = rposition_literal(tokens, VOICE_SEPARATOR) else {
        return;
    };
    let voice = || tokens[separator + 1..].iter().filter_map(Token::as_event);

    let mut visible = voice().any(|event| !event.is_spacer());
    if visible {
        let mut in_cue = false;
        visible = false;
        for event in voice() {
            if event.cue_open {
                in_cue = true;
            }
            if event.cue_close {
                in_cue = false;
            }
            if !event.is_spacer() && !in_cue {
                visible = true;
                break;
            }
        }
    }

    if !visible {
        tokens[separator] = Token::literal(BRACE_SEPARATOR);
    }
}

fn key_signature(fifths: i8, mode: &str) -> TranscriptionResult<String> {
    const MAJOR: [&str; 15] = [
        "cf", "gf", "df", "af", "ef", "bf", "f", "c", "g", "d", "a", "e", "b", "fs", "cs",
    ];
    const MINOR: [&str; 15] = [
        "af", "ef", "bf", "f", "c", "g", "d", "a", "e", "b", "fs", "cs", "gs", "ds", "as",
    ];

    let table = match mode.trim() {
        "major" => &MAJOR,
        "minor" => &MINOR,
        other => {
            return Err(TranscriptionError::unsupported(format!(
                "Unrecognized key mode: \"{}\"",
                other
            )))
        }
    };
    let tonic = usize::try_from(i16::from(fifths) + 7)
        .ok()
        .and_then(|index| table.get(index))
        .ok_or_else(|| TranscriptionError::unsupported(format!("Key with {} fifths", fifths)))?;
    Ok(format!("\\key {} \\{}", tonic, mode.trim()))
}

fn clef_token(sign: &str, line: Option<u8>, octave_change: Option<i8>) -> TranscriptionResult<String> {
    let name = match (sign, line, octave_change) {
        ("G", _, Some(-1)) => "GG",
        ("C", Some(4), _) => "tenor",
        ("G", ..) | ("F", ..) | ("C", ..) => sign,
        ("percussion", ..) => "percussion",
        ("TAB", ..) => "tab",
        _ => {
            return Err(TranscriptionError::unsupported(format!(
                "Unrecognized clef sign: \"{}\"",
                sign
            )))
        }
    };
    Ok(format!("\\clef {}", name))
}

fn zero() -> Rational {
    Rational::from_integer(0)
}
