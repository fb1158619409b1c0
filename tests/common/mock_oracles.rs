/*!
 * Mock oracle implementations for testing.
 *
 * The mocks transform file contents deterministically instead of
 * shelling out to ffmpeg and ImageMagick, so pipeline results can be
 * compared byte for byte across runs:
 * - `MockImageOracle` - trim/resize/composite as traceable rewrites
 * - `MockCropProbe` - scripted crop proposals per probe call
 */

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;

use vidprep::crop_detect::CropRectangle;
use vidprep::errors::OracleError;
use vidprep::media_tools::{CropProbe, ImageOracle, TrimReport};

/// Default trim measurements handed out for every successful trim
pub fn default_trim_report() -> TrimReport {
    TrimReport {
        original_width: 1920,
        original_height: 1080,
        trimmed_width: 600,
        trimmed_height: 88,
        trimmed_x: 660,
        trimmed_y: 900,
    }
}

/// Image oracle that rewrites file contents deterministically
pub struct MockImageOracle {
    /// File names that report no visible content when trimmed
    empty_frames: HashSet<String>,

    /// File names whose trim fails outright
    broken_frames: HashSet<String>,

    /// Measurements returned for every successful trim
    report: TrimReport,

    /// Number of trim invocations observed
    trim_calls: AtomicUsize,
}

impl MockImageOracle {
    /// Oracle where every frame trims successfully
    pub fn working() -> Self {
        Self {
            empty_frames: HashSet::new(),
            broken_frames: HashSet::new(),
            report: default_trim_report(),
            trim_calls: AtomicUsize::new(0),
        }
    }

    /// Mark frame file names as carrying no visible content
    pub fn with_empty_frames(mut self, names: &[&str]) -> Self {
        self.empty_frames = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Mark frame file names whose trim fails outright
    pub fn with_broken_frames(mut self, names: &[&str]) -> Self {
        self.broken_frames = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Use specific trim measurements
    pub fn with_report(mut self, report: TrimReport) -> Self {
        self.report = report;
        self
    }

    /// Number of trim invocations observed so far
    pub fn trim_call_count(&self) -> usize {
        self.trim_calls.load(Ordering::SeqCst)
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageOracle for MockImageOracle {
    async fn trim(
        &self,
        source: &Path,
        dest: &Path,
        grayscale: bool,
    ) -> Result<TrimReport, OracleError> {
        self.trim_calls.fetch_add(1, Ordering::SeqCst);
        let name = Self::file_name(source);

        if self.empty_frames.contains(&name) {
            return Err(OracleError::NoVisibleContent);
        }

        if self.broken_frames.contains(&name) {
            return Err(OracleError::Tool(format!("mock trim failure for {}", name)));
        }

        let content = std::fs::read(source)
            .map_err(|e| OracleError::Tool(format!("mock read failed: {}", e)))?;

        let mut output = format!("TRIM(gray={}):", grayscale).into_bytes();
        output.extend_from_slice(&content);
        std::fs::write(dest, output)
            .map_err(|e| OracleError::Tool(format!("mock write failed: {}", e)))?;

        Ok(self.report)
    }

    async fn resize(&self, path: &Path, factor: f64) -> Result<(u32, u32), OracleError> {
        let content = std::fs::read(path)
            .map_err(|e| OracleError::Tool(format!("mock read failed: {}", e)))?;

        let mut output = content;
        output.extend_from_slice(format!(":RESIZE({})", factor).as_bytes());
        std::fs::write(path, output)
            .map_err(|e| OracleError::Tool(format!("mock write failed: {}", e)))?;

        let width = (f64::from(self.report.trimmed_width) * factor) as u32;
        let height = (f64::from(self.report.trimmed_height) * factor) as u32;
        Ok((width, height))
    }

    async fn composite_on_canvas(
        &self,
        canvas_width: u32,
        canvas_height: u32,
        path: &Path,
        x: i64,
        y: i64,
    ) -> Result<(), OracleError> {
        let content = std::fs::read(path)
            .map_err(|e| OracleError::Tool(format!("mock read failed: {}", e)))?;

        let mut output =
            format!("CANVAS({}x{})@{:+}{:+}:", canvas_width, canvas_height, x, y).into_bytes();
        output.extend_from_slice(&content);
        std::fs::write(path, output)
            .map_err(|e| OracleError::Tool(format!("mock write failed: {}", e)))
    }

    async fn blank_canvas(
        &self,
        width: u32,
        height: u32,
        dest: &Path,
    ) -> Result<(), OracleError> {
        std::fs::write(dest, format!("BLANK({}x{})", width, height))
            .map_err(|e| OracleError::Tool(format!("mock write failed: {}", e)))
    }
}

/// Behavior mode for the mock crop probe
#[derive(Debug, Clone)]
pub enum MockCropBehavior {
    /// Return the same proposals on every probe
    Fixed(Vec<CropRectangle>),
    /// Never propose anything
    Empty,
    /// Fail short spot checks, answer the contiguous scan
    QuickFailsThenFull(Vec<CropRectangle>),
    /// Return nothing for spot checks, answer the contiguous scan
    QuickEmptyThenFull(Vec<CropRectangle>),
}

/// Crop probe with scripted behavior that records every call
pub struct MockCropProbe {
    behavior: MockCropBehavior,

    /// Every (offset, scan length) the voter asked for
    pub calls: Mutex<Vec<(u64, u64)>>,
}

impl MockCropProbe {
    pub fn new(behavior: MockCropBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Probe lengths of every observed call
    pub fn observed_scan_lengths(&self) -> Vec<u64> {
        self.calls.lock().iter().map(|(_, len)| *len).collect()
    }
}

#[async_trait]
impl CropProbe for MockCropProbe {
    async fn probe(&self, offset_secs: u64, scan_secs: u64) -> Result<Vec<CropRectangle>> {
        self.calls.lock().push((offset_secs, scan_secs));

        // Spot checks are recognizable by their short fixed length
        let is_spot_check = scan_secs == vidprep::crop_detect::SPOT_CHECK_LENGTH_SECS;

        match &self.behavior {
            MockCropBehavior::Fixed(proposals) => Ok(proposals.clone()),
            MockCropBehavior::Empty => Ok(Vec::new()),
            MockCropBehavior::QuickFailsThenFull(proposals) => {
                if is_spot_check {
                    Err(anyhow!("mock spot check failure"))
                } else {
                    Ok(proposals.clone())
                }
            }
            MockCropBehavior::QuickEmptyThenFull(proposals) => {
                if is_spot_check {
                    Ok(Vec::new())
                } else {
                    Ok(proposals.clone())
                }
            }
        }
    }
}
