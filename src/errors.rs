/*!
 * Error types for the vidprep application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors that can occur during exact time arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimecodeError {
    /// Error when a timecode string cannot be interpreted
    #[error("Could not interpret time value '{0}'")]
    Parse(String),

    /// Error when a subtraction would produce a negative time.
    /// Non-fatal: the caller decides how to interpret it.
    #[error("Time subtraction of {subtrahend} from {minuend} produced a negative result")]
    NegativeResult {
        /// The value subtracted from
        minuend: String,
        /// The value subtracted
        subtrahend: String,
    },
}

/// Errors that can occur while building a cut list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CutlistError {
    /// Error when the cut times do not form start/stop pairs
    #[error("Cut timecodes must be given in pairs (start_time, stop_time), got {0} times")]
    OddTokenCount(usize),

    /// Error when cut times are not ascending or overlap
    #[error("Times {previous_timecode} ({previous_seconds}s) and {current_timecode} ({current_seconds}s) are not in ascending order. Timecodes must be ascending and not overlap")]
    OutOfOrder {
        /// Earlier value in raw seconds form
        previous_seconds: String,
        /// Later value in raw seconds form
        current_seconds: String,
        /// Earlier value rendered as a timecode
        previous_timecode: String,
        /// Later value rendered as a timecode
        current_timecode: String,
    },

    /// Error when a stop time precedes its start time
    #[error("Stop time {stop} cannot be less than start time {start}. All times must be absolute timecode positions, not start times and durations")]
    NegativeDuration {
        /// Start of the offending pair
        start: String,
        /// Stop of the offending pair
        stop: String,
    },

    /// Error from parsing one of the cut time tokens
    #[error("Time value error: {0}")]
    Timecode(#[from] TimecodeError),
}

/// Errors that can occur during crop detection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    /// Recoverable: no crop proposals were collected in either scan mode.
    /// The caller substitutes an uncropped rectangle.
    #[error("Crop detection produced no usable crop values")]
    NoCropData,
}

/// Errors reported by the external image oracles
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The trim oracle found nothing to trim: the frame carries no
    /// visible subtitle content
    #[error("No visible content to trim")]
    NoVisibleContent,

    /// The external tool failed outright
    #[error("External tool error: {0}")]
    Tool(String),
}

/// Errors that can occur during subtitle deduplication and layout
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// A representative frame artifact disappeared from disk.
    /// Fatal: reference links would silently resolve to nothing.
    #[error("Representative subtitle image is missing: {0}")]
    MissingRepresentative(String),

    /// Error reading a frame for hashing. Fatal: dropping a frame
    /// would corrupt the temporal continuity of the overlay sequence.
    #[error("Failed to read subtitle frame {frame}: {message}")]
    FrameRead {
        /// Frame file involved
        frame: String,
        /// Underlying failure
        message: String,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from time arithmetic
    #[error("Timecode error: {0}")]
    Timecode(#[from] TimecodeError),

    /// Error from cut list construction
    #[error("Cut list error: {0}")]
    Cutlist(#[from] CutlistError),

    /// Error from crop detection
    #[error("Crop error: {0}")]
    Crop(#[from] CropError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
