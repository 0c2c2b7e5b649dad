//! wsi-tilefx - tile-streaming transforms for multi-channel TIFF images.
//!
//! This binary parses the command line, opens the input images and runs one
//! transform, printing its report as text or JSON.

use clap::Parser;
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_tilefx::{
    config::{
        Cli, ColorizeConfig, Command, CompressConfig, InspectConfig, MergeConfig, MergeInput,
        OutputFormat,
    },
    container::{TiffReader, TiffSink},
    inspect::summarize,
    io::LocalFileReader,
    palette::Palette,
    transform::{colorize, compress, merge_gray_planes_to_rgb, merge_gray_to_rgb, QuantileThresholds},
};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.into_command() {
        Command::Compress(config) => run_compress(config).await,
        Command::Colorize(config) => run_colorize(config).await,
        Command::Merge(config) => run_merge(config).await,
        Command::Inspect(config) => run_inspect(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_tilefx=debug"
    } else {
        "wsi_tilefx=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok();
}

fn config_error(message: String) -> String {
    format!("Configuration error: {}", message)
}

/// Print a report in the requested format.
fn print_report<T: Serialize + Display>(report: &T, format: OutputFormat) -> CommandResult {
    match format {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

async fn open_input(path: &Path) -> Result<TiffReader<LocalFileReader>, Box<dyn std::error::Error>> {
    let reader = TiffReader::open_path(path).await?;
    info!("Opened {}", path.display());
    Ok(reader)
}

// =============================================================================
// Compress Command
// =============================================================================

async fn run_compress(config: CompressConfig) -> CommandResult {
    init_logging(config.common.verbose);
    config.validate().map_err(config_error)?;
    for warning in config.threshold_warnings() {
        warn!("{}", warning);
    }

    let mut source = open_input(&config.input).await?;
    let mut sink = TiffSink::create(&config.output, config.bigtiff).await?;

    let thresholds = QuantileThresholds {
        mean: config.mean_threshold,
        spread: config.spread_threshold,
    };
    let report = compress(&mut source, &mut sink, thresholds).await?;
    sink.finish().await?;

    info!("Wrote {}", config.output.display());
    print_report(&report, config.common.format)
}

// =============================================================================
// Colorize Command
// =============================================================================

async fn run_colorize(config: ColorizeConfig) -> CommandResult {
    init_logging(config.common.verbose);
    config.validate().map_err(config_error)?;

    let palette = Palette::load(&config.palette).await?;
    info!(
        "Loaded palette {} with {} channels",
        config.palette.display(),
        palette.len()
    );

    let mut source = open_input(&config.input).await?;
    let mut sink = TiffSink::create(&config.output, config.bigtiff).await?;
    let report = colorize(&mut source, &mut sink, &palette, &config.channels).await?;
    sink.finish().await?;

    info!("Wrote {}", config.output.display());
    print_report(&report, config.common.format)
}

// =============================================================================
// Merge Command
// =============================================================================

async fn run_merge(config: MergeConfig) -> CommandResult {
    init_logging(config.common.verbose);
    config.validate().map_err(config_error)?;

    let report = match config.merge_input()? {
        MergeInput::Single(input) => {
            let mut source = open_input(input).await?;
            let mut sink = TiffSink::create(&config.output, config.bigtiff).await?;
            let report = merge_gray_to_rgb(&mut source, &mut sink).await?;
            sink.finish().await?;
            report
        }
        MergeInput::Planes { red, green, blue } => {
            let mut red = open_input(red).await?;
            let mut green = open_input(green).await?;
            let mut blue = open_input(blue).await?;
            let mut sink = TiffSink::create(&config.output, config.bigtiff).await?;
            let report =
                merge_gray_planes_to_rgb(&mut red, &mut green, &mut blue, &mut sink).await?;
            sink.finish().await?;
            report
        }
    };

    info!("Wrote {}", config.output.display());
    print_report(&report, config.common.format)
}

// =============================================================================
// Inspect Command
// =============================================================================

async fn run_inspect(config: InspectConfig) -> CommandResult {
    init_logging(config.common.verbose);
    config.validate().map_err(config_error)?;

    let mut source = open_input(&config.input).await?;
    let summary = summarize(&mut source)?;
    print_report(&summary, config.common.format)
}
