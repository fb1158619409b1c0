/*!
 * Subtitle frame layout.
 *
 * One representative frame at a time is trimmed to its visible content,
 * optionally rescaled, and composited back onto a transparent canvas of
 * the output picture size. Subtitles that sat in the lower half of the
 * source picture are anchored to the bottom edge, the rest to the top,
 * with a small margin scaled to the picture height.
 */

use std::path::Path;

use log::{debug, error};

use crate::media_tools::{ImageOracle, TrimReport};

/// Shared read-only parameters of the layout stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSpec {
    /// Output canvas width (post-crop picture width when cropping)
    pub width: u32,

    /// Output canvas height (post-crop picture height when cropping)
    pub height: u32,

    /// Optional scale multiplier applied to the trimmed box
    pub resize_factor: Option<f64>,

    /// Desaturate the subtitle during trimming
    pub grayscale: bool,
}

/// Where a frame's trimmed box lands on the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementDecision {
    /// Pixels from the left canvas edge
    pub horizontal_offset: i64,

    /// Pixels from the top canvas edge
    pub vertical_offset: i64,
}

/// Per-frame result of the layout stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOutcome {
    /// The overlay frame was produced
    Completed,
    /// The frame was skipped after an oracle failure
    Skipped,
}

/// Distance kept between the subtitle and the picture edge:
/// one percent of the picture height, within 5 to 20 pixels
pub fn subtitle_margin(canvas_height: u32) -> u32 {
    (canvas_height / 100).clamp(5, 20)
}

/// Compute where the trimmed (and possibly resized) box goes on the
/// canvas. The box is centered horizontally; vertically it is anchored
/// to the bottom when its source position was below the picture
/// midline, to the top otherwise.
pub fn place(
    canvas_width: u32,
    canvas_height: u32,
    trim: &TrimReport,
    effective_width: u32,
    effective_height: u32,
) -> PlacementDecision {
    let margin = i64::from(subtitle_margin(canvas_height));
    let picture_center = canvas_height / 2;

    let horizontal_offset = i64::from(canvas_width / 2) - i64::from(effective_width / 2);

    let vertical_offset = if trim.trimmed_y > picture_center {
        i64::from(canvas_height) - i64::from(effective_height) - margin
    } else {
        margin
    };

    PlacementDecision {
        horizontal_offset,
        vertical_offset,
    }
}

/// Run the full trim, resize, place, composite sequence for one frame.
/// Every failure is logged and skips this frame only; a single
/// malformed subtitle must never abort the batch.
pub async fn layout_frame(
    oracle: &impl ImageOracle,
    frame_id: u64,
    source: &Path,
    dest: &Path,
    canvas: &CanvasSpec,
) -> LayoutOutcome {
    let trim = match oracle.trim(source, dest, canvas.grayscale).await {
        Ok(report) => report,
        Err(e) => {
            error!("Trimming subtitle frame {} failed: {}", frame_id, e);
            return LayoutOutcome::Skipped;
        }
    };

    let effective = match canvas.resize_factor {
        Some(factor) => match oracle.resize(dest, factor).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                error!("Resizing subtitle frame {} failed: {}", frame_id, e);
                return LayoutOutcome::Skipped;
            }
        },
        None => (trim.trimmed_width, trim.trimmed_height),
    };

    let placement = place(canvas.width, canvas.height, &trim, effective.0, effective.1);

    debug!(
        "Frame {}: trimmed {}x{} at y={}, placed at {:+}{:+}",
        frame_id,
        trim.trimmed_width,
        trim.trimmed_height,
        trim.trimmed_y,
        placement.horizontal_offset,
        placement.vertical_offset
    );

    let composite = oracle
        .composite_on_canvas(
            canvas.width,
            canvas.height,
            dest,
            placement.horizontal_offset,
            placement.vertical_offset,
        )
        .await;

    if let Err(e) = composite {
        error!("Repositioning subtitle frame {} failed: {}", frame_id, e);
        return LayoutOutcome::Skipped;
    }

    LayoutOutcome::Completed
}
