use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Crop scan settings
    #[serde(default)]
    pub crop: CropScanConfig,

    /// Subtitle pipeline settings
    #[serde(default)]
    pub subtitle: SubtitleConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Settings restricting the crop-detection scan window
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CropScanConfig {
    // @field: Scan start offset in seconds, from the file start when unset
    #[serde(default)]
    pub scan_start_secs: Option<u64>,

    // @field: Scan window length in seconds, to the file end when unset
    #[serde(default)]
    pub scan_duration_secs: Option<u64>,
}

/// Settings for the subtitle overlay pipeline
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubtitleConfig {
    // @field: Extracted frame image format
    #[serde(default = "default_image_format")]
    pub image_format: String,

    // @field: Optional scale multiplier for the trimmed subtitle box
    #[serde(default)]
    pub resize_factor: Option<f64>,

    // @field: Desaturate subtitles during trimming
    #[serde(default)]
    pub grayscale: bool,

    // @field: Worker count override, physical core count when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        SubtitleConfig {
            image_format: default_image_format(),
            resize_factor: None,
            grayscale: false,
            workers: None,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_image_format() -> String {
    // png extraction is an order of magnitude slower in ffmpeg
    "tiff".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.subtitle.image_format.trim().is_empty() {
            return Err(anyhow!("Subtitle image format must not be empty"));
        }

        if let Some(factor) = self.subtitle.resize_factor {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(anyhow!(
                    "Subtitle resize factor must be a positive number, got {}",
                    factor
                ));
            }
        }

        if let Some(workers) = self.subtitle.workers {
            if workers == 0 {
                return Err(anyhow!("Worker count must be at least 1"));
            }
        }

        if let Some(duration) = self.crop.scan_duration_secs {
            if duration == 0 {
                return Err(anyhow!("Crop scan duration must be at least 1 second"));
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            crop: CropScanConfig::default(),
            subtitle: SubtitleConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
