use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use std::fs::OpenOptions;
use std::io::Write;
use chrono::Local;

// @module: File and directory utilities

// Width of the zero-padded sequence number in frame file names. Wide
// enough that lexicographic order always equals temporal order.
const SEQUENCE_WIDTH: usize = 10;

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// File name for a subtitle frame with the given sequence number,
    /// e.g. `subtitle-0000000042.tiff`
    pub fn frame_file_name(sequence: u64, extension: &str) -> String {
        format!("subtitle-{:0width$}.{}", sequence, extension, width = SEQUENCE_WIDTH)
    }

    /// Sequence number parsed back out of a frame file name
    pub fn frame_sequence_number<P: AsRef<Path>>(path: P) -> Option<u64> {
        let stem = path.as_ref().file_stem()?.to_str()?;
        let digits = stem.strip_prefix("subtitle-")?;
        digits.parse::<u64>().ok()
    }

    /// Enumerate frame files with the given extension in a directory,
    /// sorted by sequence number
    pub fn list_frame_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<(u64, PathBuf)>> {
        let mut frames = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).max_depth(1) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let matches_extension = path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                .unwrap_or(false);

            if !matches_extension {
                continue;
            }

            if let Some(sequence) = Self::frame_sequence_number(path) {
                frames.push((sequence, path.to_path_buf()));
            }
        }

        frames.sort_by_key(|(sequence, _)| *sequence);

        Ok(frames)
    }

    /// Create a reference link at `link` resolving to `target`. On unix
    /// the link is a symlink carrying no payload of its own; elsewhere
    /// the target is copied. The target must already exist.
    pub fn create_reference_link<P1: AsRef<Path>, P2: AsRef<Path>>(target: P1, link: P2) -> Result<()> {
        let target = target.as_ref();
        let link = link.as_ref();

        if let Some(parent) = link.parent() {
            Self::ensure_dir(parent)?;
        }

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
                .with_context(|| format!("Failed to link {:?} to {:?}", link, target))?;
        }

        #[cfg(not(unix))]
        {
            fs::copy(target, link)
                .with_context(|| format!("Failed to copy {:?} to {:?}", target, link))?;
        }

        Ok(())
    }

    /// Append content to a log file with timestamp
    pub fn append_to_log_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Get current timestamp
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        // Open file in append mode, create if it doesn't exist
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {:?}", path.as_ref()))?;

        // Write content with timestamp
        writeln!(file, "[{}] {}", timestamp, content)
            .with_context(|| format!("Failed to write to log file: {:?}", path.as_ref()))?;

        Ok(())
    }
}
