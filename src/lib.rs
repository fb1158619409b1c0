/*!
 * # vidprep - Media Geometry & Timeline Preparation
 *
 * A Rust library that prepares exact, reproducible editing and geometry
 * decisions for a batch video-transcoding pipeline.
 *
 * ## Features
 *
 * - Millisecond-exact time arithmetic without floating point
 * - Cut list construction from start/stop timecode pairs, with edit
 *   point positions for pre-encode review
 * - Frequency-voted crop rectangle selection from noisy border scans
 * - Content-hash deduplication of extracted subtitle frames
 * - Bounded-parallel subtitle trim and reposition pipeline
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `timecode`: Exact time values and arithmetic
 * - `cutlist`: Kept-segment and edit-marker construction
 * - `crop_detect`: Crop rectangle voting and selection
 * - `subtitle`: Subtitle overlay preparation:
 *   - `subtitle::dedup`: Content-hash frame grouping
 *   - `subtitle::layout`: Trim, resize and reposition of one frame
 *   - `subtitle::scheduler`: Bounded-parallel layout execution
 * - `media_tools`: Adapters for the external ffmpeg/ImageMagick oracles
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod crop_detect;
pub mod cutlist;
pub mod errors;
pub mod file_utils;
pub mod media_tools;
pub mod subtitle;
pub mod timecode;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunOptions, RunSummary};
pub use crop_detect::{CropDecision, CropRectangle, CropVote};
pub use cutlist::{CutSegment, Cutlist};
pub use errors::{AppError, CropError, CutlistError, SubtitleError, TimecodeError};
pub use timecode::TimeValue;
