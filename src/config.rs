//! Command-line configuration for the `wsi-tilefx` binary.
//!
//! Every command takes its paths as arguments; the tunables can also be set
//! through environment variables with the `TILEFX_` prefix:
//!
//! - `TILEFX_MEAN_THRESHOLD` - keep tiles with at least this mean (default: 200)
//! - `TILEFX_SPREAD_THRESHOLD` - keep tiles with a larger p90-p10 spread (default: 100)
//! - `TILEFX_PALETTE` - palette file for `colorize`
//! - `TILEFX_CHANNELS` - comma-separated channel selection for `colorize`
//! - `TILEFX_BIGTIFF` - write BigTIFF output (default: false)
//! - `TILEFX_FORMAT` - report format, `text` or `json` (default: text)
//!
//! # Example
//!
//! ```text
//! wsi-tilefx compress slide.tif filtered.tif
//! wsi-tilefx colorize slide.tif rgb.tif --palette palette.txt --channels 0,2,5
//! wsi-tilefx merge --red r.tif --green g.tif --blue b.tif rgb.tif
//! wsi-tilefx inspect slide.tif --format json
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::transform::{DIFF_THRESHOLD, MEAN_THRESHOLD};

// =============================================================================
// Default Values
// =============================================================================

/// Default mean threshold for the quantile filter.
pub const DEFAULT_MEAN_THRESHOLD: u64 = MEAN_THRESHOLD;

/// Default spread threshold for the quantile filter.
pub const DEFAULT_SPREAD_THRESHOLD: u64 = DIFF_THRESHOLD;

/// Largest value a supported sample can hold.
const MAX_SAMPLE_VALUE: u64 = u16::MAX as u64;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile-streaming transforms for multi-channel tiled TIFF images.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tilefx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Zero out dark, flat tiles in every directory.
    Compress(CompressConfig),

    /// Blend selected channels into one RGB directory using a palette.
    Colorize(ColorizeConfig),

    /// Merge three 8-bit grayscale planes into one RGB directory.
    Merge(MergeConfig),

    /// Print the directories of an image.
    Inspect(InspectConfig),
}

/// How reports are printed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "TILEFX_FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Compress
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CompressConfig {
    /// Input multi-directory TIFF.
    pub input: PathBuf,

    /// Output TIFF, one directory per input directory.
    pub output: PathBuf,

    /// Tiles with a mean at or above this value are kept.
    #[arg(long, default_value_t = DEFAULT_MEAN_THRESHOLD, env = "TILEFX_MEAN_THRESHOLD")]
    pub mean_threshold: u64,

    /// Tiles with a p90 - p10 spread above this value are kept.
    #[arg(long, default_value_t = DEFAULT_SPREAD_THRESHOLD, env = "TILEFX_SPREAD_THRESHOLD")]
    pub spread_threshold: u64,

    /// Write BigTIFF instead of classic TIFF.
    #[arg(long, default_value_t = false, env = "TILEFX_BIGTIFF")]
    pub bigtiff: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl CompressConfig {
    /// Validate the configuration and return an error message if invalid.
    ///
    /// Any threshold is accepted; see [`CompressConfig::threshold_warnings`].
    pub fn validate(&self) -> Result<(), String> {
        check_paths(&self.input, &self.output)
    }

    /// Notes on thresholds that make one of the two criteria moot.
    pub fn threshold_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.mean_threshold == 0 {
            warnings.push("mean_threshold is 0: every tile is kept".to_string());
        } else if self.mean_threshold > MAX_SAMPLE_VALUE {
            warnings.push(format!(
                "mean_threshold {} exceeds every sample value: only the spread keeps tiles",
                self.mean_threshold
            ));
        }
        if self.spread_threshold >= MAX_SAMPLE_VALUE {
            warnings.push(format!(
                "spread_threshold {} is never exceeded: only the mean keeps tiles",
                self.spread_threshold
            ));
        }
        warnings
    }
}

// =============================================================================
// Colorize
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ColorizeConfig {
    /// Input multi-directory TIFF, one directory per channel.
    pub input: PathBuf,

    /// Output RGB TIFF.
    pub output: PathBuf,

    /// Palette file: one `name lower upper r g b` line per channel.
    #[arg(long, env = "TILEFX_PALETTE")]
    pub palette: PathBuf,

    /// Channels to blend, by directory index (comma-separated).
    #[arg(long, env = "TILEFX_CHANNELS", value_delimiter = ',')]
    pub channels: Vec<usize>,

    /// Write BigTIFF instead of classic TIFF.
    #[arg(long, default_value_t = false, env = "TILEFX_BIGTIFF")]
    pub bigtiff: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl ColorizeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        check_paths(&self.input, &self.output)?;

        if self.palette.as_os_str().is_empty() {
            return Err("Palette path is required. Set --palette or TILEFX_PALETTE".to_string());
        }

        let mut seen = self.channels.clone();
        seen.sort_unstable();
        if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(format!("channel {} is selected more than once", pair[0]));
        }
        Ok(())
    }
}

// =============================================================================
// Merge
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct MergeConfig {
    /// Output RGB TIFF.
    pub output: PathBuf,

    /// Single input with exactly three grayscale directories.
    #[arg(long, conflicts_with_all = ["red", "green", "blue"])]
    pub input: Option<PathBuf>,

    /// Red plane (first directory is used).
    #[arg(long, requires_all = ["green", "blue"])]
    pub red: Option<PathBuf>,

    /// Green plane (first directory is used).
    #[arg(long, requires_all = ["red", "blue"])]
    pub green: Option<PathBuf>,

    /// Blue plane (first directory is used).
    #[arg(long, requires_all = ["red", "green"])]
    pub blue: Option<PathBuf>,

    /// Write BigTIFF instead of classic TIFF.
    #[arg(long, default_value_t = false, env = "TILEFX_BIGTIFF")]
    pub bigtiff: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Where the three merge planes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeInput<'a> {
    Single(&'a Path),
    Planes {
        red: &'a Path,
        green: &'a Path,
        blue: &'a Path,
    },
}

impl MergeConfig {
    /// Resolve the input form.
    pub fn merge_input(&self) -> Result<MergeInput<'_>, String> {
        match (&self.input, &self.red, &self.green, &self.blue) {
            (Some(input), None, None, None) => Ok(MergeInput::Single(input)),
            (None, Some(red), Some(green), Some(blue)) => Ok(MergeInput::Planes {
                red,
                green,
                blue,
            }),
            _ => Err(
                "Provide either --input, or all of --red, --green and --blue".to_string(),
            ),
        }
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.merge_input()? {
            MergeInput::Single(input) => check_paths(input, &self.output),
            MergeInput::Planes { red, green, blue } => {
                for plane in [red, green, blue] {
                    check_paths(plane, &self.output)?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Inspect
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// TIFF to describe.
    pub input: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl InspectConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.input.as_os_str().is_empty() {
            return Err("Input path is required".to_string());
        }
        Ok(())
    }
}

fn check_paths(input: &Path, output: &Path) -> Result<(), String> {
    if input.as_os_str().is_empty() {
        return Err("Input path is required".to_string());
    }
    if output.as_os_str().is_empty() {
        return Err("Output path is required".to_string());
    }
    if input == output {
        return Err(format!(
            "Output {} would overwrite its input",
            output.display()
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
