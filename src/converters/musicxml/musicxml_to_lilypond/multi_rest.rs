//! Multi-measure rest compression
//!
//! Consecutive whole-measure rests are emitted one per measure and merged
//! afterwards, once the run is known to be over.

use super::duration::encode_duration;
use super::errors::{TranscriptionError, TranscriptionResult};
use super::stream::Token;
use super::types::Rational;

/// A finished run of whole-measure rests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestRun {
    /// Number of rests in the run
    pub count: u32,
    /// Length of each rest
    pub measure_duration: Rational,
}

impl RestRun {
    pub fn total_duration(&self) -> Rational {
        self.measure_duration * Rational::from_integer(i64::from(self.count))
    }
}

/// Merge the `run.count` whole-measure rests found before `end` into the
/// first of them.
///
/// Everything between the first and last matched rest (bar checks, spaces,
/// measure comments) is removed. Runs of a single rest are left alone.
pub fn compress_rest_run(output: &mut Vec<Token>, end: usize, run: RestRun) -> TranscriptionResult<()> {
    if run.count < 2 {
        return Ok(());
    }

    let end = end.min(output.len());
    let mut found = 0;
    let mut first = None;
    let mut last = None;

    for index in (0..end).rev() {
        let is_rest = output[index]
            .as_event()
            .is_some_and(|event| event.is_measure_rest(run.measure_duration));
        if !is_rest {
            continue;
        }
        found += 1;
        last.get_or_insert(index);
        first = Some(index);
        if found == run.count {
            break;
        }
    }

    let (Some(first), Some(last)) = (first, last) else {
        return Err(shortfall(run, found));
    };
    if found < run.count {
        return Err(shortfall(run, found));
    }

    let total = run.total_duration();
    let token = encode_duration(total, run.measure_duration)?;
    if let Some(rest) = output[first].as_event_mut() {
        rest.duration = token;
        rest.duration_value = total;
    }
    output.drain(first + 1..=last);

    log::debug!("Merged {} measure rests into one", run.count);
    Ok(())
}

fn shortfall(run: RestRun, found: u32) -> TranscriptionError {
    TranscriptionError::consistency(format!(
        "Internal invariant violated: expected {} measure rests in run, found {}",
        run.count, found
    ))
}
