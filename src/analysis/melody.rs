//! Melody shape terms.
//!
//! A term describes five consecutive pitch intervals, one byte per interval
//! offset by 64, so it is independent of key. Intervals outside `-64..64`
//! contribute nothing to their byte.

use crate::index::term::{Position, Term, saturate_position};

/// Intervals per term.
pub const INTERVALS_PER_TERM: usize = 5;

/// Pitches in a melody incipit.
pub const INCIPIT_LENGTH: usize = 12;

const INTERVAL_OFFSET: i64 = 64;

/// The opening pitches of a melody.
pub fn incipit(pitches: &[i32]) -> &[i32] {
    &pitches[..pitches.len().min(INCIPIT_LENGTH)]
}

fn window_term(window: &[i32]) -> Term {
    window
        .windows(2)
        .enumerate()
        .fold(0, |term, (j, pair)| {
            let interval = pair[1] as i64 - pair[0] as i64;
            if (-INTERVAL_OFFSET..INTERVAL_OFFSET).contains(&interval) {
                term | (((interval + INTERVAL_OFFSET) as Term) << (j * 8))
            } else {
                term
            }
        })
}

/// Extract one term per window of five intervals.
///
/// A melody of `n` pitches yields `n - 5` terms; shorter melodies yield none.
pub fn extract_melody_terms(pitches: &[i32]) -> Vec<Term> {
    let count = pitches.len().saturating_sub(INTERVALS_PER_TERM);
    (0..count)
        .map(|i| window_term(&pitches[i..=i + INTERVALS_PER_TERM]))
        .collect()
}

/// Melody terms paired with their window index.
pub fn extract_melody_terms_with_positions(pitches: &[i32]) -> Vec<(Term, Position)> {
    extract_melody_terms(pitches)
        .into_iter()
        .enumerate()
        .map(|(i, term)| (term, saturate_position(i)))
        .collect()
}
