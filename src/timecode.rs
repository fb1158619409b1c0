use std::fmt;

use crate::errors::TimecodeError;

// @module: Exact time arithmetic on whole seconds and milliseconds

/// An exact point in time or duration, stored as whole seconds plus
/// milliseconds. Never represented as a binary float, so repeated
/// addition and subtraction cannot accumulate rounding drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeValue {
    // @field: Whole seconds
    pub seconds: u64,

    // @field: Milliseconds, always in 0..=999
    pub millis: u16,
}

impl TimeValue {
    /// Create a time value, carrying surplus milliseconds into seconds
    pub fn new(seconds: u64, millis: u16) -> Self {
        TimeValue {
            seconds: seconds + u64::from(millis / 1000),
            millis: millis % 1000,
        }
    }

    /// Time value for a whole number of seconds
    pub fn from_seconds(seconds: u64) -> Self {
        TimeValue { seconds, millis: 0 }
    }

    /// The zero value, also produced by the `start` keyword
    pub fn zero() -> Self {
        TimeValue::default()
    }

    // @parses: [[HH:]MM:]SS[.mmm] or a bare integer / decimal second count
    // @validates: Only digits, ':' and '.' are allowed, at most three ':' groups
    pub fn parse(input: &str) -> Result<Self, TimecodeError> {
        if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit() || c == ':' || c == '.') {
            return Err(TimecodeError::Parse(input.to_string()));
        }

        // Separate and normalize the fractional part first
        let (whole_part, millis) = match input.split_once('.') {
            Some((whole, fraction)) => (whole, normalize_fraction(fraction)?),
            None => (input, 0),
        };

        let groups: Vec<&str> = whole_part.split(':').collect();

        let (hours, minutes, seconds) = match groups.as_slice() {
            [ss] => (0, 0, parse_group(ss, input)?),
            [mm, ss] => (0, parse_group(mm, input)?, parse_group(ss, input)?),
            [hh, mm, ss] => (
                parse_group(hh, input)?,
                parse_group(mm, input)?,
                parse_group(ss, input)?,
            ),
            _ => return Err(TimecodeError::Parse(input.to_string())),
        };

        Ok(TimeValue {
            seconds: hours * 3600 + minutes * 60 + seconds,
            millis,
        })
    }

    /// Add two time values exactly. Whole-second and millisecond parts are
    /// summed independently, carrying 1000 ms into the seconds.
    pub fn add_exact(self, other: TimeValue) -> TimeValue {
        let mut seconds = self.seconds + other.seconds;
        let mut millis = self.millis + other.millis;

        if millis >= 1000 {
            millis -= 1000;
            seconds += 1;
        }

        TimeValue { seconds, millis }
    }

    /// Subtract `other` from `self` exactly, borrowing 1000 ms from the
    /// whole seconds when needed. A result below zero is reported as
    /// `NegativeResult`; the caller decides whether that is an error.
    pub fn sub_exact(self, other: TimeValue) -> Result<TimeValue, TimecodeError> {
        let negative = || TimecodeError::NegativeResult {
            minuend: self.as_seconds_string(),
            subtrahend: other.as_seconds_string(),
        };

        let mut whole = self.seconds;
        let mut millis = self.millis;

        // Borrow 1000 milliseconds from the whole seconds
        if other.millis > millis {
            whole = whole.checked_sub(1).ok_or_else(negative)?;
            millis += 1000;
        }

        let seconds = whole.checked_sub(other.seconds).ok_or_else(negative)?;

        Ok(TimeValue {
            seconds,
            millis: millis - other.millis,
        })
    }

    /// Render as HH:MM:SS[.mmm] with every field zero-padded to two digits.
    /// The rendering is a lossless inverse of parsing.
    pub fn to_timecode(&self) -> String {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let seconds = self.seconds % 60;

        if self.millis > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, self.millis)
        } else {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        }
    }

    /// Render as a raw second count, e.g. "4530.500" or "4200"
    pub fn as_seconds_string(&self) -> String {
        if self.millis > 0 {
            format!("{}.{:03}", self.seconds, self.millis)
        } else {
            format!("{}", self.seconds)
        }
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_timecode())
    }
}

// Truncate a fraction to 3 digits (never round), then right-pad with
// zeroes so ".8" means 800 milliseconds, not 8.
fn normalize_fraction(fraction: &str) -> Result<u16, TimecodeError> {
    if fraction.contains(':') {
        return Err(TimecodeError::Parse(fraction.to_string()));
    }

    let truncated = if fraction.len() > 3 { &fraction[..3] } else { fraction };

    let mut padded = truncated.to_string();
    while padded.len() < 3 {
        padded.push('0');
    }

    padded
        .parse::<u16>()
        .map_err(|_| TimecodeError::Parse(fraction.to_string()))
}

fn parse_group(group: &str, full_input: &str) -> Result<u64, TimecodeError> {
    if group.is_empty() {
        return Ok(0);
    }

    group
        .parse::<u64>()
        .map_err(|_| TimecodeError::Parse(full_input.to_string()))
}
