//! Duration codec
//!
//! Converts exact durations (fractions of a whole note) into LilyPond
//! duration tokens and back. Tokens take one of three shapes:
//!
//! - `4`, `16`: plain power-of-two note values
//! - `4.`: dotted values
//! - `1024*341`, `1*3`, `2.*4`: a unit duration scaled by an integer
//!   multiplier (tuplet remnants, multi-measure rests)

use super::errors::{TranscriptionError, TranscriptionResult};
use super::types::Rational;

/// Largest denominator tried when approximating a non-dyadic duration
pub const MAX_DENOMINATOR: i64 = 1024;

/// Encode `value` as a LilyPond duration token.
///
/// `measure` is the duration of the enclosing measure; durations longer
/// than a measure that are an exact multiple of it are written as the
/// measure's own token times the multiple.
pub fn encode_duration(value: Rational, measure: Rational) -> TranscriptionResult<String> {
    let zero = Rational::from_integer(0);
    if value <= zero || measure <= zero {
        return Err(TranscriptionError::consistency(format!(
            "Cannot encode non-positive duration {} (measure {})",
            value, measure
        )));
    }

    if value > measure {
        let multiple = value / measure;
        if multiple.is_integer() {
            let unit = encode_duration(measure, measure)?;
            return Ok(format!("{}*{}", unit, multiple.to_integer()));
        }
        return encode_duration(value, value);
    }

    if let Some(base) = power_of_two(value.recip()) {
        return Ok(base.to_string());
    }
    if let Some(base) = power_of_two(Rational::new(3, 2) / value) {
        return Ok(format!("{}.", base));
    }

    encode_scaled(value)
}

fn power_of_two(value: Rational) -> Option<i64> {
    let n = value.is_integer().then(|| value.to_integer())?;
    (n > 0 && n & (n - 1) == 0).then_some(n)
}

/// Find the smallest power-of-two denominator that expresses `value` to
/// within half a 1/MAX_DENOMINATOR step.
///
/// Tuplet remnants are approximated this way. Values too short to count
/// even one 1/MAX_DENOMINATOR unit are an error.
fn encode_scaled(value: Rational) -> TranscriptionResult<String> {
    let mut scaled = value;
    let mut denominator: i64 = 1;

    loop {
        let nearest = scaled.round();
        let tolerance = Rational::new(denominator, 2 * MAX_DENOMINATOR);
        if nearest.to_integer() > 0 && abs(scaled - nearest) < tolerance {
            return Ok(format!("{}*{}", denominator, nearest.to_integer()));
        }
        if denominator >= MAX_DENOMINATOR {
            return Err(TranscriptionError::consistency(format!(
                "Duration {} cannot be expressed with denominator at most {}",
                value, MAX_DENOMINATOR
            )));
        }
        scaled *= Rational::from_integer(2);
        denominator *= 2;
    }
}

/// Decode a token produced by [`encode_duration`]
pub fn decode_duration(token: &str) -> Option<Rational> {
    let mut parts = token.split('*');
    let unit = parts.next()?;

    let (digits, dotted) = match unit.strip_suffix('.') {
        Some(digits) => (digits, true),
        None => (unit, false),
    };
    let denominator: i64 = digits.parse().ok().filter(|d| *d > 0)?;
    let mut value = Rational::new(1, denominator);
    if dotted {
        value *= Rational::new(3, 2);
    }

    for multiplier in parts {
        let multiplier: i64 = multiplier.parse().ok().filter(|m| *m > 0)?;
        value *= Rational::from_integer(multiplier);
    }

    Some(value)
}

/// Token for a MusicXML `<type>` value
pub fn note_type_token(note_type: &str) -> Option<&'static str> {
    let token = match note_type {
        "breve" => "\\breve",
        "whole" => "1",
        "half" => "2",
        "quarter" => "4",
        "eighth" => "8",
        "16th" => "16",
        "32nd" => "32",
        "64th" => "64",
        "128th" => "128",
        _ => return None,
    };
    Some(token)
}

/// Written length of a MusicXML `<type>` value
pub fn note_type_value(note_type: &str) -> Option<Rational> {
    let value = match note_type {
        "breve" => Rational::from_integer(2),
        "whole" => Rational::from_integer(1),
        "half" => Rational::new(1, 2),
        "quarter" => Rational::new(1, 4),
        "eighth" => Rational::new(1, 8),
        "16th" => Rational::new(1, 16),
        "32nd" => Rational::new(1, 32),
        "64th" => Rational::new(1, 64),
        "128th" => Rational::new(1, 128),
        _ => return None,
    };
    Some(value)
}

pub(crate) fn abs(value: Rational) -> Rational {
    if value < Rational::from_integer(0) {
        -value
    } else {
        value
    }
}
