use anyhow::{Result, anyhow};
use log::{warn, info, debug};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

use crate::app_config::Config;
use crate::crop_detect::{self, CropDecision, ScanWindow};
use crate::cutlist::Cutlist;
use crate::file_utils::FileManager;
use crate::media_tools::{
    self, FfmpegCropProbe, MagickOracle, SourceGeometry,
};
use crate::subtitle::dedup;
use crate::subtitle::layout::CanvasSpec;
use crate::subtitle::scheduler::{self, FrameJob, TrimStats};

// @module: Application controller for one input file's preparation run

/// What one preparation run is asked to do
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// The media file to prepare
    pub input_file: PathBuf,

    /// Cut timecode pairs, e.g. "0,01:10:00,01:15:30.500,end"
    pub cut_times: Option<String>,

    /// Detect and remove black borders
    pub autocrop: bool,

    /// Subtitle stream to extract and prepare for burn-in
    pub subtitle_stream: Option<usize>,
}

/// Everything a run decided, for the caller and for tests
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Source picture geometry and duration
    pub source: SourceGeometry,

    /// The cut list, when cutting was requested
    pub cutlist: Option<Cutlist>,

    /// The crop decision
    pub crop: CropDecision,

    /// Layout stage counters, when the subtitle pipeline ran
    pub trim_stats: Option<TrimStats>,

    /// Directory holding the finalized overlay frames
    pub overlay_dir: Option<PathBuf>,
}

/// Main application controller for one input file
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the full preparation workflow for one input file
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let start_time = Instant::now();

        if !options.input_file.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", options.input_file));
        }

        let source = media_tools::probe_source_geometry(&options.input_file).await?;
        debug!(
            "Source is {}x{}, {} seconds",
            source.width, source.height, source.duration_secs
        );

        let work_dir = self.work_dir(&options.input_file)?;
        let log_file = work_dir.join("processing.log");

        // Cut list construction runs first and is fatal on any error:
        // a bad edit specification means the run cannot be trusted.
        let cutlist = match &options.cut_times {
            Some(cut_times) => Some(self.build_cutlist(cut_times, &log_file)?),
            None => None,
        };

        let crop = if options.autocrop {
            self.detect_crop(&options.input_file, source, &log_file).await?
        } else {
            CropDecision::Uncropped
        };

        let (trim_stats, overlay_dir) = match options.subtitle_stream {
            Some(stream_index) => {
                let (stats, dir) = self
                    .prepare_subtitles(&options.input_file, stream_index, source, crop, &work_dir)
                    .await?;
                (Some(stats), Some(dir))
            }
            None => (None, None),
        };

        info!(
            "Preparation finished in {:.1}s",
            start_time.elapsed().as_secs_f64()
        );

        Ok(RunSummary {
            source,
            cutlist,
            crop,
            trim_stats,
            overlay_dir,
        })
    }

    // Work files for one input live next to it, named after the file
    fn work_dir(&self, input_file: &Path) -> Result<PathBuf> {
        let stem = input_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "input".to_string());

        let parent = input_file.parent().unwrap_or(Path::new("."));
        let work_dir = parent.join(format!("{}-vidprep", stem));
        FileManager::ensure_dir(&work_dir)?;

        Ok(work_dir)
    }

    fn build_cutlist(&self, cut_times: &str, log_file: &Path) -> Result<Cutlist> {
        let cutlist = Cutlist::build(cut_times)?;

        info!("Kept segments:");
        for (index, segment) in cutlist.segments.iter().enumerate() {
            match segment.duration {
                Some(duration) => info!(
                    "  {}: start {} duration {}",
                    index + 1,
                    segment.start.to_timecode(),
                    duration.to_timecode()
                ),
                None => info!(
                    "  {}: start {} to the end of file",
                    index + 1,
                    segment.start.to_timecode()
                ),
            }
        }

        let markers = cutlist.edit_marker_timecodes();
        if !markers.is_empty() {
            info!("Edit points in the processed file: {}", markers.join(", "));
            FileManager::append_to_log_file(
                log_file,
                &format!("Edit points in the processed file: {}", markers.join(", ")),
            )?;
        }

        Ok(cutlist)
    }

    async fn detect_crop(
        &self,
        input_file: &Path,
        source: SourceGeometry,
        log_file: &Path,
    ) -> Result<CropDecision> {
        let spinner = stage_spinner(&format!(
            "Finding crop values for: {}",
            input_file.file_name().unwrap_or_default().to_string_lossy()
        ));

        let probe = FfmpegCropProbe::new(input_file);
        let window = ScanWindow::from_user_bounds(
            source.duration_secs,
            self.config.crop.scan_start_secs,
            self.config.crop.scan_duration_secs,
        );

        let crop = crop_detect::detect_crop(&probe, source, window).await?;
        spinner.finish_and_clear();

        if let CropDecision::Cropped(rect) = crop {
            let bottom = source.height - rect.keep_height - rect.top_offset;
            let right = source.width - rect.keep_width - rect.left_offset;

            info!(
                "Crop values are, Top: {}, Bottom: {}, Left: {}, Right: {}",
                rect.top_offset, bottom, rect.left_offset, right
            );
            FileManager::append_to_log_file(
                log_file,
                &format!(
                    "Crop values are, Top: {}, Bottom: {}, Left: {}, Right: {}. After cropping video width is: {}, and height is: {}",
                    rect.top_offset, bottom, rect.left_offset, right, rect.keep_width, rect.keep_height
                ),
            )?;
        }

        Ok(crop)
    }

    async fn prepare_subtitles(
        &self,
        input_file: &Path,
        stream_index: usize,
        source: SourceGeometry,
        crop: CropDecision,
        work_dir: &Path,
    ) -> Result<(TrimStats, PathBuf)> {
        let original_dir = work_dir.join("subtitles-original");
        let fixed_dir = work_dir.join("subtitles-fixed");
        FileManager::ensure_dir(&original_dir)?;
        FileManager::ensure_dir(&fixed_dir)?;

        let image_format = self.config.subtitle.image_format.as_str();

        let spinner = stage_spinner(&format!(
            "Extracting subtitle stream as {} - images",
            image_format
        ));
        media_tools::extract_subtitle_frames(input_file, stream_index, &original_dir, image_format)
            .await?;
        spinner.finish_and_clear();

        let frame_files = FileManager::list_frame_files(&original_dir, image_format)?;
        if frame_files.is_empty() {
            warn!("Subtitle stream {} produced no frames", stream_index);
            return Ok((TrimStats::default(), fixed_dir));
        }
        info!("Extracted {} subtitle frames", frame_files.len());

        // Canvas follows the crop decision so burned subtitles line up
        // with the cropped picture.
        let (canvas_width, canvas_height) = crop.canvas_size(source);
        let canvas = CanvasSpec {
            width: canvas_width,
            height: canvas_height,
            resize_factor: self.config.subtitle.resize_factor,
            grayscale: self.config.subtitle.grayscale,
        };

        let spinner = stage_spinner("Removing duplicate subtitle slides");
        let oracle = Arc::new(MagickOracle);
        let frames = dedup::hash_frames(&frame_files)?;
        let outcome =
            dedup::deduplicate(oracle.as_ref(), &frames, &fixed_dir, canvas_width, canvas_height)
                .await?;
        spinner.finish_and_clear();
        info!(
            "{} distinct subtitle images out of {} frames",
            outcome.groups.len(),
            frames.len()
        );

        let jobs: Vec<FrameJob> = outcome
            .layout_ids
            .iter()
            .filter_map(|id| frames.iter().find(|frame| frame.id == *id))
            .map(|frame| FrameJob {
                id: frame.id,
                source: frame.path.clone(),
                dest: fixed_dir.join(frame.file_name()),
            })
            .collect();

        let workers = scheduler::worker_count(self.config.subtitle.workers);
        let spinner = stage_spinner(&format!(
            "Trimming subtitle images in {} parallel tasks",
            workers
        ));
        let report = scheduler::run_layout_pool(oracle, jobs, canvas, workers).await?;
        spinner.finish_and_clear();

        if report.stats.skipped > 0 {
            warn!(
                "Skipped {} subtitle frames after tool failures",
                report.stats.skipped
            );
        }

        dedup::verify_representatives(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;
        dedup::materialize_links(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;

        Ok((report.stats, fixed_dir))
    }
}

// A steady-tick spinner for coarse stage progress
fn stage_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner
}
