/*!
 * Cut list construction.
 *
 * Turns a user supplied list of start/stop timecodes into the ordered
 * kept-segments of the source file, plus the positions where the cut
 * boundaries will fall in the output after cutting, so the user can
 * review the potential glitch points before encoding.
 */

use crate::errors::{CutlistError, TimecodeError};
use crate::timecode::TimeValue;

/// One token of the cut time list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutToken {
    /// An absolute position on the source timeline
    Time(TimeValue),
    /// The open end of the stream
    End,
}

/// A kept range of the source timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutSegment {
    /// Segment start on the original (pre-cut) timeline
    pub start: TimeValue,

    /// Segment length. `None` means "to the end of the stream".
    pub duration: Option<TimeValue>,
}

/// The result of processing a cut time list
#[derive(Debug, Clone, Default)]
pub struct Cutlist {
    /// Kept segments, in source order
    pub segments: Vec<CutSegment>,

    /// Where each cut boundary falls on the post-cut output timeline.
    /// The boundary at position zero carries no information and is dropped.
    pub edit_markers: Vec<TimeValue>,
}

impl Cutlist {
    /// Build a cut list from a string of start/stop timecode pairs.
    /// Any character that is not a digit, ':' or '.' separates tokens,
    /// so callers may delimit with commas, spaces or anything else.
    /// The literal words `start` and `end` name the stream boundaries.
    pub fn build(input: &str) -> Result<Self, CutlistError> {
        let raw_tokens = split_tokens(input);

        if raw_tokens.len() % 2 != 0 {
            return Err(CutlistError::OddTokenCount(raw_tokens.len()));
        }

        let tokens = convert_tokens(&raw_tokens)?;
        validate_ascending(&tokens)?;

        let segments = build_segments(&tokens)?;
        let edit_markers = compute_edit_markers(&tokens)?;

        Ok(Cutlist {
            segments,
            edit_markers,
        })
    }

    /// Edit marker positions rendered as timecodes for user review
    pub fn edit_marker_timecodes(&self) -> Vec<String> {
        self.edit_markers
            .iter()
            .map(|marker| marker.to_timecode())
            .collect()
    }
}

// Split the input into candidate tokens. Runs of digits, ':' and '.'
// form time tokens; runs of letters form keyword tokens; everything
// else is a separator.
fn split_tokens(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for character in input.chars() {
        let is_time_char = character.is_ascii_digit() || character == ':' || character == '.';
        let is_word_char = character.is_ascii_alphabetic();

        if !is_time_char && !is_word_char {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        // A boundary between a word and a time run also separates tokens
        if !current.is_empty() && current_is_word != is_word_char {
            tokens.push(std::mem::take(&mut current));
        }

        current_is_word = is_word_char;
        current.push(character);
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

// Convert raw tokens into time values. The `end` keyword is kept as a
// sentinel and terminates the token list.
fn convert_tokens(raw_tokens: &[String]) -> Result<Vec<CutToken>, CutlistError> {
    let mut tokens = Vec::with_capacity(raw_tokens.len());

    for raw in raw_tokens {
        let lowered = raw.to_lowercase();

        if lowered == "start" {
            tokens.push(CutToken::Time(TimeValue::zero()));
            continue;
        }

        if lowered == "end" {
            tokens.push(CutToken::End);
            break;
        }

        if raw.chars().any(|c| c.is_ascii_alphabetic()) {
            return Err(CutlistError::Timecode(TimecodeError::Parse(raw.clone())));
        }

        tokens.push(CutToken::Time(TimeValue::parse(raw)?));
    }

    Ok(tokens)
}

// All positions must be strictly ascending across the whole list, the
// terminal `end` sentinel excepted.
fn validate_ascending(tokens: &[CutToken]) -> Result<(), CutlistError> {
    let mut previous: Option<TimeValue> = None;

    for token in tokens {
        let current = match token {
            CutToken::Time(value) => *value,
            CutToken::End => break,
        };

        if let Some(previous) = previous {
            if current <= previous {
                return Err(CutlistError::OutOfOrder {
                    previous_seconds: previous.as_seconds_string(),
                    current_seconds: current.as_seconds_string(),
                    previous_timecode: previous.to_timecode(),
                    current_timecode: current.to_timecode(),
                });
            }
        }

        previous = Some(current);
    }

    Ok(())
}

fn build_segments(tokens: &[CutToken]) -> Result<Vec<CutSegment>, CutlistError> {
    let mut segments = Vec::new();

    for pair in tokens.chunks(2) {
        let start = match pair[0] {
            CutToken::Time(value) => value,
            // A terminal `end` in start position closes the list without
            // starting another segment
            CutToken::End => break,
        };

        let stop = match pair.get(1) {
            Some(CutToken::Time(value)) => *value,
            Some(CutToken::End) | None => {
                segments.push(CutSegment {
                    start,
                    duration: None,
                });
                break;
            }
        };

        let duration = stop
            .sub_exact(start)
            .map_err(|_| CutlistError::NegativeDuration {
                start: start.as_seconds_string(),
                stop: stop.as_seconds_string(),
            })?;

        segments.push(CutSegment {
            start,
            duration: Some(duration),
        });
    }

    Ok(segments)
}

// Running totals: the gap before each kept segment accumulates into
// `removed_before`, and each boundary lands at start - removed_before
// on the output timeline. The first boundary is always zero and is
// dropped from the result.
fn compute_edit_markers(tokens: &[CutToken]) -> Result<Vec<TimeValue>, CutlistError> {
    let mut markers = Vec::new();
    let mut removed_before = TimeValue::zero();
    let mut previous_stop = TimeValue::zero();

    for (index, pair) in tokens.chunks(2).enumerate() {
        let start = match pair[0] {
            CutToken::Time(value) => value,
            CutToken::End => break,
        };

        let gap = start.sub_exact(previous_stop)?;
        removed_before = removed_before.add_exact(gap);

        if index > 0 {
            markers.push(start.sub_exact(removed_before)?);
        }

        match pair.get(1) {
            Some(CutToken::Time(stop)) => previous_stop = *stop,
            Some(CutToken::End) | None => break,
        }
    }

    Ok(markers)
}
