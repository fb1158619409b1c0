// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_arguments)]

use anyhow::{Result, anyhow, Context};
use log::{warn, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::{Path, PathBuf};
use std::io::Write;
use std::fs::File;
use std::io::BufReader;
use clap::{Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use crate::app_config::Config;
use crate::app_controller::{Controller, RunOptions};

mod app_config;
mod app_controller;
mod crop_detect;
mod cutlist;
mod errors;
mod file_utils;
mod media_tools;
mod subtitle;
mod timecode;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prepare cut, crop and subtitle decisions for a media file (default command)
    #[command(alias = "prep")]
    Prepare(PrepareArgs),

    /// Generate shell completions for vidprep
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct PrepareArgs {
    /// Input media file to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Cut times as start/stop timecode pairs, e.g. '0,01:10:00,01:15:30.500,end'
    #[arg(short, long)]
    cut: Option<String>,

    /// Detect black borders and pick the crop automatically
    #[arg(short, long)]
    autocrop: bool,

    /// Subtitle stream to extract and prepare for burn-in
    #[arg(short, long)]
    subtitle_stream: Option<usize>,

    /// Scale multiplier for trimmed subtitles, e.g. 0.8
    #[arg(short, long)]
    resize_subtitles: Option<f64>,

    /// Desaturate subtitles during trimming
    #[arg(short, long)]
    grayscale: bool,

    /// Number of parallel layout tasks (default: physical core count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Configuration file path
    #[arg(long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// vidprep - Media geometry and timeline preparation
///
/// Prepares exact cut lists, crop rectangles and subtitle overlay images
/// for a batch video-transcoding pipeline.
#[derive(Parser, Debug)]
#[command(name = "vidprep")]
#[command(version = "1.0.0")]
#[command(about = "Cut, crop and subtitle preparation for video transcoding")]
#[command(long_about = "vidprep scans a media file and prepares the decisions a transcoder needs:
where to cut, what picture region to keep after removing black borders, and
a directory of deduplicated, repositioned subtitle overlay images.

EXAMPLES:
    vidprep movie.mkv -a                             # Autocrop only
    vidprep movie.mkv -c '0,01:10:00,01:15:30.500,end'  # Cut list with review points
    vidprep movie.mkv -a -s 0                        # Crop and prepare subtitle stream 0
    vidprep movie.mkv -s 0 -r 0.8 -g                 # Downscaled, desaturated subtitles
    vidprep completions bash > vidprep.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default
    one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input media file to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Cut times as start/stop timecode pairs, e.g. '0,01:10:00,01:15:30.500,end'
    #[arg(short, long)]
    cut: Option<String>,

    /// Detect black borders and pick the crop automatically
    #[arg(short, long)]
    autocrop: bool,

    /// Subtitle stream to extract and prepare for burn-in
    #[arg(short, long)]
    subtitle_stream: Option<usize>,

    /// Scale multiplier for trimmed subtitles, e.g. 0.8
    #[arg(short, long)]
    resize_subtitles: Option<f64>,

    /// Desaturate subtitles during trimming
    #[arg(short, long)]
    grayscale: bool,

    /// Number of parallel layout tasks (default: physical core count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Configuration file path
    #[arg(long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {}\x1B[0m", color, now, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    // Handle subcommands
    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "vidprep", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Prepare(args)) => run_prepare(args).await,
        None => {
            // Default behavior - use top-level args for backwards compatibility
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;

            let prepare_args = PrepareArgs {
                input_path,
                cut: cli.cut,
                autocrop: cli.autocrop,
                subtitle_stream: cli.subtitle_stream,
                resize_subtitles: cli.resize_subtitles,
                grayscale: cli.grayscale,
                workers: cli.workers,
                config_path: cli.config_path,
                log_level: cli.log_level,
            };
            run_prepare(prepare_args).await
        }
    }
}

async fn run_prepare(options: PrepareArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level_filter_for(&config_log_level));
    }

    // Load or create configuration
    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        // Load existing configuration
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        // Create default configuration if not exists
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    // Override config with CLI options if provided
    if let Some(factor) = options.resize_subtitles {
        config.subtitle.resize_factor = Some(factor);
    }

    if options.grayscale {
        config.subtitle.grayscale = true;
    }

    if let Some(workers) = options.workers {
        config.subtitle.workers = Some(workers);
    }

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    // Validate the configuration after loading and overriding
    config.validate()
        .context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level(level_filter_for(&config.log_level));
    }

    // Create controller and run the preparation workflow
    let controller = Controller::with_config(config)?;

    let run_options = RunOptions {
        input_file: options.input_path,
        cut_times: options.cut,
        autocrop: options.autocrop,
        subtitle_stream: options.subtitle_stream,
    };

    controller.run(run_options).await?;

    Ok(())
}

fn level_filter_for(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}
