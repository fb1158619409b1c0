/*!
 * Adapters for the external media tools.
 *
 * Crop detection, subtitle image trimming, resizing and compositing are
 * delegated to ffmpeg and ImageMagick. Each tool is wrapped behind an
 * async trait so the pipeline stages can be exercised against mock
 * implementations in tests.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::error;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, from_str};
use tokio::process::Command;

use crate::crop_detect::CropRectangle;
use crate::errors::OracleError;

// @const: ffmpeg cropdetect output regex, matches crop=W:H:X:Y
static CROP_VALUE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"crop=(\d+):(\d+):(\d+):(\d+)").unwrap()
});

// External tool calls are given a generous ceiling so a wedged process
// cannot hang the whole batch.
const TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// Picture geometry and play length of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceGeometry {
    /// Picture width in pixels
    pub width: u32,
    /// Picture height in pixels
    pub height: u32,
    /// Play length in whole seconds, fractions dropped
    pub duration_secs: u64,
}

/// Result of trimming a subtitle image to its visible content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimReport {
    /// Width of the source frame before trimming
    pub original_width: u32,
    /// Height of the source frame before trimming
    pub original_height: u32,
    /// Width of the tight bounding box around visible content
    pub trimmed_width: u32,
    /// Height of the tight bounding box around visible content
    pub trimmed_height: u32,
    /// Horizontal origin of the bounding box within the source frame
    pub trimmed_x: u32,
    /// Vertical origin of the bounding box within the source frame
    pub trimmed_y: u32,
}

/// Sampling interface for the crop-detection oracle
#[async_trait]
pub trait CropProbe: Send + Sync {
    /// Scan `scan_secs` seconds starting at `offset_secs` and return the
    /// crop rectangles the oracle proposed for that window
    async fn probe(&self, offset_secs: u64, scan_secs: u64) -> Result<Vec<CropRectangle>>;
}

/// Image manipulation interface for the subtitle pipeline
#[async_trait]
pub trait ImageOracle: Send + Sync {
    /// Trim `source` to the tightest box around non-transparent content,
    /// writing the result to `dest`. Desaturates when `grayscale` is set.
    async fn trim(
        &self,
        source: &Path,
        dest: &Path,
        grayscale: bool,
    ) -> Result<TrimReport, OracleError>;

    /// Scale the image in place by `factor`, preserving aspect ratio.
    /// Returns the width and height after scaling.
    async fn resize(&self, path: &Path, factor: f64) -> Result<(u32, u32), OracleError>;

    /// Composite the image onto a fresh transparent canvas of the given
    /// size at the given offsets, overwriting the image in place
    async fn composite_on_canvas(
        &self,
        canvas_width: u32,
        canvas_height: u32,
        path: &Path,
        x: i64,
        y: i64,
    ) -> Result<(), OracleError>;

    /// Write a fully transparent canvas of the given size to `dest`
    async fn blank_canvas(
        &self,
        width: u32,
        height: u32,
        dest: &Path,
    ) -> Result<(), OracleError>;
}

/// Extract every crop proposal embedded in the oracle's free-text output
pub fn parse_crop_proposals(lines: &[String]) -> Vec<CropRectangle> {
    let mut proposals = Vec::new();

    for line in lines {
        for capture in CROP_VALUE_REGEX.captures_iter(line) {
            let fields: Option<[u32; 4]> = (1..=4)
                .map(|i| capture[i].parse::<u32>().ok())
                .collect::<Option<Vec<u32>>>()
                .and_then(|v| v.try_into().ok());

            if let Some([width, height, left, top]) = fields {
                proposals.push(CropRectangle {
                    keep_width: width,
                    keep_height: height,
                    left_offset: left,
                    top_offset: top,
                });
            }
        }
    }

    proposals
}

/// Probe picture geometry and duration of a media file with ffprobe
pub async fn probe_source_geometry<P: AsRef<Path>>(media_path: P) -> Result<SourceGeometry> {
    let media_path = media_path.as_ref();

    if !media_path.exists() {
        return Err(anyhow!("Media file not found: {:?}", media_path));
    }

    let ffprobe_future = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-show_format",
            "-select_streams", "v:0",
            media_path.to_str().unwrap_or(""),
        ])
        .output();

    let timeout_duration = Duration::from_secs(60);
    let output = tokio::select! {
        result = ffprobe_future => {
            result.map_err(|e| anyhow!("Failed to execute ffprobe command: {}", e))?
        },
        _ = tokio::time::sleep(timeout_duration) => {
            return Err(anyhow!("ffprobe command timed out after 60 seconds"));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("ffprobe failed: {}", stderr);
        return Err(anyhow!("ffprobe command failed: {}", stderr));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: Value = from_str(&stdout).context("Failed to parse ffprobe JSON output")?;

    let stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .ok_or_else(|| anyhow!("No video stream found in {:?}", media_path))?;

    let width = stream
        .get("width")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow!("Video stream has no width"))? as u32;

    let height = stream
        .get("height")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow!("Video stream has no height"))? as u32;

    let duration_secs = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.split('.').next())
        .and_then(|d| d.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(SourceGeometry {
        width,
        height,
        duration_secs,
    })
}

/// Extract one subtitle stream as a numbered image sequence. The
/// zero-padded pattern keeps lexicographic order equal to temporal
/// order for everything downstream.
pub async fn extract_subtitle_frames<P1: AsRef<Path>, P2: AsRef<Path>>(
    input: P1,
    stream_index: usize,
    dest_dir: P2,
    image_format: &str,
) -> Result<()> {
    let pattern = dest_dir
        .as_ref()
        .join(format!("subtitle-%010d.{}", image_format));

    let args: Vec<String> = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.as_ref().to_string_lossy().to_string(),
        "-vn".to_string(),
        "-an".to_string(),
        "-filter_complex".to_string(),
        format!("[0:s:{}]copy[subtitle_stream]", stream_index),
        "-map".to_string(),
        "[subtitle_stream]".to_string(),
        pattern.to_string_lossy().to_string(),
    ];

    run_tool("ffmpeg", &args).await.map(|_| ())
}

/// Crop-detection oracle backed by ffmpeg's cropdetect filter
pub struct FfmpegCropProbe {
    // @field: Media file being scanned
    input: PathBuf,
}

impl FfmpegCropProbe {
    /// Create a probe for one media file
    pub fn new<P: AsRef<Path>>(input: P) -> Self {
        FfmpegCropProbe {
            input: input.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CropProbe for FfmpegCropProbe {
    async fn probe(&self, offset_secs: u64, scan_secs: u64) -> Result<Vec<CropRectangle>> {
        // cropdetect=24:8:250 means: consider pixels darker than 24 to be
        // black, round crop values to multiples of 8, re-evaluate every
        // 250 frames. ffmpeg prints its measurements on stderr.
        let mut args: Vec<String> = Vec::new();

        if offset_secs > 0 {
            args.push("-ss".to_string());
            args.push(offset_secs.to_string());
        }

        args.extend(
            [
                "-t", &scan_secs.to_string(),
                "-i", self.input.to_str().unwrap_or(""),
                "-f", "matroska",
                "-sn",
                "-an",
                "-filter_complex", "cropdetect=24:8:250",
                "-y",
                "-crf", "51",
                "-preset", "ultrafast",
                "/dev/null",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        let (_, stderr_lines) = run_tool("ffmpeg", &args).await?;

        Ok(parse_crop_proposals(&stderr_lines))
    }
}

/// Subtitle image oracle backed by ImageMagick
pub struct MagickOracle;

#[async_trait]
impl ImageOracle for MagickOracle {
    async fn trim(
        &self,
        source: &Path,
        dest: &Path,
        grayscale: bool,
    ) -> Result<TrimReport, OracleError> {
        let mut args: Vec<String> = vec![
            source.to_string_lossy().to_string(),
            "-trim".to_string(),
        ];

        if grayscale {
            args.push("-colorspace".to_string());
            args.push("Gray".to_string());
        }

        args.extend(
            [
                "-print",
                "%[W],%[H],%[fx:w],%[fx:h],%[fx:page.x],%[fx:page.y]",
                "-compress",
                "rle",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(dest.to_string_lossy().to_string());

        // A nonzero exit here means ImageMagick found nothing to trim,
        // which is how fully transparent subtitle frames announce
        // themselves.
        let (stdout_lines, _) = run_tool("magick", &args)
            .await
            .map_err(|_| OracleError::NoVisibleContent)?;

        let printed = stdout_lines
            .first()
            .ok_or_else(|| OracleError::Tool("trim printed no measurements".to_string()))?;

        parse_trim_report(printed)
    }

    async fn resize(&self, path: &Path, factor: f64) -> Result<(u32, u32), OracleError> {
        let args: Vec<String> = vec![
            "+distort".to_string(),
            "SRT".to_string(),
            format!("{},0", factor),
            "+repage".to_string(),
            "-print".to_string(),
            "%[fx:w],%[fx:h]".to_string(),
            "-compress".to_string(),
            "rle".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let (stdout_lines, stderr_lines) = run_tool("mogrify", &args)
            .await
            .map_err(|_| OracleError::Tool(format!("resize failed: {}", path.display())))?;

        let printed = stdout_lines.first().ok_or_else(|| {
            OracleError::Tool(format!("resize printed no measurements: {:?}", stderr_lines))
        })?;

        let mut fields = printed.trim().split(',');
        let width = parse_dimension(fields.next(), printed)?;
        let height = parse_dimension(fields.next(), printed)?;

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
        let args: Vec<String> = vec![
            "-size".to_string(),
            format!("{}x{}", canvas_width, canvas_height),
            "canvas:transparent".to_string(),
            path.to_string_lossy().to_string(),
            "-geometry".to_string(),
            format!("{:+}{:+}", x, y),
            "-composite".to_string(),
            "-compose".to_string(),
            "over".to_string(),
            "-compress".to_string(),
            "rle".to_string(),
            path.to_string_lossy().to_string(),
        ];

        run_tool("magick", &args)
            .await
            .map(|_| ())
            .map_err(|e| OracleError::Tool(format!("composite failed: {}", e)))
    }

    async fn blank_canvas(
        &self,
        width: u32,
        height: u32,
        dest: &Path,
    ) -> Result<(), OracleError> {
        let args: Vec<String> = vec![
            "-size".to_string(),
            format!("{}x{}", width, height),
            "canvas:transparent".to_string(),
            "-alpha".to_string(),
            "on".to_string(),
            "-compress".to_string(),
            "rle".to_string(),
            dest.to_string_lossy().to_string(),
        ];

        run_tool("magick", &args)
            .await
            .map(|_| ())
            .map_err(|e| OracleError::Tool(format!("blank canvas failed: {}", e)))
    }
}

// Parse the 6-tuple printed by the trim invocation:
// origW,origH,trimW,trimH,trimX,trimY
fn parse_trim_report(printed: &str) -> Result<TrimReport, OracleError> {
    let fields: Vec<u32> = printed
        .trim()
        .split(',')
        .map(|f| f.trim().parse::<u32>())
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|_| OracleError::Tool(format!("unreadable trim measurements: {}", printed)))?;

    if fields.len() != 6 {
        return Err(OracleError::Tool(format!(
            "expected 6 trim measurements, got {}: {}",
            fields.len(),
            printed
        )));
    }

    Ok(TrimReport {
        original_width: fields[0],
        original_height: fields[1],
        trimmed_width: fields[2],
        trimmed_height: fields[3],
        trimmed_x: fields[4],
        trimmed_y: fields[5],
    })
}

fn parse_dimension(field: Option<&str>, printed: &str) -> Result<u32, OracleError> {
    field
        .and_then(|f| f.trim().parse::<u32>().ok())
        .ok_or_else(|| OracleError::Tool(format!("unreadable dimensions: {}", printed)))
}

// Run an external tool, returning stdout and stderr as line lists.
// A nonzero exit status is an error carrying the stderr tail.
async fn run_tool(program: &str, args: &[String]) -> Result<(Vec<String>, Vec<String>)> {
    let tool_future = Command::new(program).args(args).output();

    let output = tokio::select! {
        result = tool_future => {
            result.map_err(|e| anyhow!("Failed to execute {} command: {}", program, e))?
        },
        _ = tokio::time::sleep(TOOL_TIMEOUT) => {
            return Err(anyhow!("{} command timed out after {} seconds", program, TOOL_TIMEOUT.as_secs()));
        }
    };

    let stdout_lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| l.to_string())
        .collect();

    let stderr_lines: Vec<String> = String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(|l| l.to_string())
        .collect();

    if !output.status.success() {
        let tail = stderr_lines
            .iter()
            .rev()
            .take(5)
            .rev()
            .cloned()
            .collect::<Vec<String>>()
            .join("\n");
        return Err(anyhow!("{} exited with {}: {}", program, output.status, tail));
    }

    Ok((stdout_lines, stderr_lines))
}
