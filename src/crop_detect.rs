/*!
 * Frequency-voted crop rectangle selection.
 *
 * The crop-detection oracle reports a noisy stream of candidate
 * rectangles while scanning the picture for black borders. Every
 * proposal is counted as a vote, and the most frequent rectangle wins:
 * it is the value that can be applied without cropping too much or too
 * little. Long files get a quick pass of short spot checks spread
 * across the scan window; short files, and files where the quick pass
 * came up empty, get one contiguous scan.
 */

use std::collections::HashMap;

use anyhow::Result;
use log::{debug, info, warn};

use crate::errors::CropError;
use crate::media_tools::{CropProbe, SourceGeometry};

/// Scan windows longer than this get the spot-check treatment
pub const QUICK_SCAN_THRESHOLD_SECS: u64 = 300;

/// Number of spot checks spread across the scan window
pub const SPOT_CHECK_COUNT: u64 = 10;

/// Seconds of video scanned per spot check
pub const SPOT_CHECK_LENGTH_SECS: u64 = 10;

/// Upper bound on the contiguous scan length
pub const FULL_SCAN_CAP_SECS: u64 = 1800;

/// The picture region to keep after removing detected borders
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CropRectangle {
    /// Width of the kept region
    pub keep_width: u32,
    /// Height of the kept region
    pub keep_height: u32,
    /// Pixels cropped off the left edge
    pub left_offset: u32,
    /// Pixels cropped off the top edge
    pub top_offset: u32,
}

impl CropRectangle {
    /// True when the rectangle fits inside the given source picture
    pub fn fits_within(&self, source_width: u32, source_height: u32) -> bool {
        self.keep_width + self.left_offset <= source_width
            && self.keep_height + self.top_offset <= source_height
    }

    /// Render in the W:H:X:Y form the crop filter takes
    pub fn filter_string(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.keep_width, self.keep_height, self.left_offset, self.top_offset
        )
    }
}

/// The outcome of crop detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropDecision {
    /// Crop to the winning rectangle
    Cropped(CropRectangle),
    /// Keep the full picture
    Uncropped,
}

impl CropDecision {
    /// Picture dimensions after the decision is applied
    pub fn canvas_size(&self, source: SourceGeometry) -> (u32, u32) {
        match self {
            CropDecision::Cropped(rect) => (rect.keep_width, rect.keep_height),
            CropDecision::Uncropped => (source.width, source.height),
        }
    }
}

/// The region of the file to scan for borders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    /// Scan start offset in seconds
    pub start_secs: u64,
    /// Scan window length in seconds
    pub length_secs: u64,
}

impl ScanWindow {
    /// Window covering the whole file, optionally restricted by the user
    pub fn from_user_bounds(
        duration_secs: u64,
        user_start: Option<u64>,
        user_length: Option<u64>,
    ) -> Self {
        let start_secs = user_start.unwrap_or(0).min(duration_secs);
        let remaining = duration_secs - start_secs;
        let length_secs = user_length.unwrap_or(remaining).min(remaining);

        ScanWindow {
            start_secs,
            length_secs,
        }
    }
}

/// Vote tally over crop rectangle proposals
#[derive(Debug, Clone, Default)]
pub struct CropVote {
    counts: HashMap<CropRectangle, u32>,
}

impl CropVote {
    /// Empty tally
    pub fn new() -> Self {
        CropVote::default()
    }

    /// Count one proposal
    pub fn add(&mut self, rectangle: CropRectangle) {
        *self.counts.entry(rectangle).or_insert(0) += 1;
    }

    /// Count a batch of proposals
    pub fn extend(&mut self, rectangles: impl IntoIterator<Item = CropRectangle>) {
        for rectangle in rectangles {
            self.add(rectangle);
        }
    }

    /// True when no proposals have been counted
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of votes a rectangle has received
    pub fn count(&self, rectangle: &CropRectangle) -> u32 {
        self.counts.get(rectangle).copied().unwrap_or(0)
    }

    /// The rectangle with the highest vote. Ties go to the smallest
    /// rectangle in (width, height, left, top) order, so the winner
    /// never depends on map iteration order.
    pub fn winner(&self) -> Result<CropRectangle, CropError> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(rect, _)| *rect)
            .ok_or(CropError::NoCropData)
    }
}

/// Scan the file and pick the crop rectangle to apply, falling back to
/// the uncropped picture when detection comes up empty or the winner
/// does not fit the source geometry.
pub async fn detect_crop(
    probe: &impl CropProbe,
    source: SourceGeometry,
    window: ScanWindow,
) -> Result<CropDecision> {
    let votes = collect_votes(probe, window).await?;

    let winner = match votes.winner() {
        Ok(winner) => winner,
        Err(CropError::NoCropData) => {
            warn!("Crop detection found no usable crop values, keeping the full picture");
            return Ok(CropDecision::Uncropped);
        }
    };

    if !winner.fits_within(source.width, source.height) {
        warn!(
            "Discarding crop value {} that does not fit the {}x{} source picture",
            winner.filter_string(),
            source.width,
            source.height
        );
        return Ok(CropDecision::Uncropped);
    }

    info!(
        "Most frequent crop value is {} with {} votes",
        winner.filter_string(),
        votes.count(&winner)
    );

    Ok(CropDecision::Cropped(winner))
}

/// Accumulate crop proposals over the scan window. Quick spot checks
/// for long windows, one contiguous scan otherwise or as the fallback.
pub async fn collect_votes(probe: &impl CropProbe, window: ScanWindow) -> Result<CropVote> {
    let mut votes = CropVote::new();
    let mut quick_scan_failed = false;

    if window.length_secs > QUICK_SCAN_THRESHOLD_SECS {
        let spot_interval = window.length_secs / SPOT_CHECK_COUNT;
        let scan_stop = window.start_secs + window.length_secs;

        let mut offset = window.start_secs + SPOT_CHECK_LENGTH_SECS;
        while offset + SPOT_CHECK_LENGTH_SECS < scan_stop {
            match probe.probe(offset, SPOT_CHECK_LENGTH_SECS).await {
                Ok(proposals) => {
                    debug!("Spot check at {}s produced {} proposals", offset, proposals.len());
                    votes.extend(proposals);
                }
                Err(e) => {
                    warn!("Quick scan for crop failed, switching to the slow method: {}", e);
                    quick_scan_failed = true;
                    break;
                }
            }

            offset += spot_interval;
        }
    }

    if window.length_secs <= QUICK_SCAN_THRESHOLD_SECS || quick_scan_failed || votes.is_empty() {
        let scan_length = window.length_secs.min(FULL_SCAN_CAP_SECS);

        let proposals = probe.probe(window.start_secs, scan_length).await?;
        debug!("Contiguous scan produced {} proposals", proposals.len());
        votes.extend(proposals);
    }

    Ok(votes)
}
