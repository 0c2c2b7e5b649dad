//! Quantile tile filter.
//!
//! Every tile of every directory is summarized by its mean and the spread
//! between its 10th and 90th percentile. Tiles that are both dark and flat
//! carry no signal and are replaced by zeros; everything else is copied
//! through byte for byte. The output mirrors the input directory for
//! directory, so zero tiles compress away in any downstream codec.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::container::{copy_tags, TileSink, TileSource, DIRECTORY_TAGS};
use crate::error::EngineError;
use crate::format::tiff::{TagValue, TiffTag};
use crate::tile::{decode_samples, write_tile, ChannelReader, Sample};

use super::ChannelRequirements;

/// Tiles with a mean at or above this value are kept.
pub const MEAN_THRESHOLD: u64 = 200;

/// Tiles with a p90 - p10 spread above this value are kept.
pub const DIFF_THRESHOLD: u64 = 100;

const GRAY_CHANNEL: ChannelRequirements = ChannelRequirements {
    bits: &[8, 16],
    min_is_black: true,
};

/// Keep thresholds for the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantileThresholds {
    pub mean: u64,
    pub spread: u64,
}

impl Default for QuantileThresholds {
    fn default() -> Self {
        Self {
            mean: MEAN_THRESHOLD,
            spread: DIFF_THRESHOLD,
        }
    }
}

/// Outcome for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileDecision {
    Keep,
    Drop,
}

impl QuantileThresholds {
    pub fn decide(&self, stats: &TileStatistics) -> TileDecision {
        if stats.mean >= self.mean || stats.spread > self.spread {
            TileDecision::Keep
        } else {
            TileDecision::Drop
        }
    }
}

/// Order statistics of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStatistics {
    pub p10: u64,
    pub p90: u64,
    pub spread: u64,
    /// Integer mean, rounded down
    pub mean: u64,
}

impl TileStatistics {
    /// Compute statistics over `samples`, using `scratch` for selection.
    ///
    /// `p10` is the element at index `N / 10` and `p90` the element at
    /// `9N / 10` of the ascending order. Returns `None` for an empty tile.
    pub fn compute<T: Sample>(samples: &[T], scratch: &mut Vec<T>) -> Option<Self> {
        let n = samples.len();
        if n == 0 {
            return None;
        }

        scratch.clear();
        scratch.extend_from_slice(samples);

        let hi = n * 9 / 10;
        let lo = n / 10;
        let (below, p90, _) = scratch.select_nth_unstable(hi);
        let p90: u64 = (*p90).into();
        // Everything left of `hi` is <= p90, so p10 is the lo-th of that part
        let p10: u64 = if lo < hi {
            (*below.select_nth_unstable(lo).1).into()
        } else {
            p90
        };

        let sum: u64 = samples.iter().map(|&s| s.into()).sum();

        Some(Self {
            p10,
            p90,
            spread: p90 - p10,
            mean: sum / n as u64,
        })
    }
}

/// Filter results for one directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryReport {
    pub directory: usize,
    pub tiles: usize,
    pub dropped: usize,
    pub drop_rate: f64,
}

impl DirectoryReport {
    fn new(directory: usize, tiles: usize, dropped: usize) -> Self {
        Self {
            directory,
            tiles,
            dropped,
            drop_rate: rate(dropped, tiles),
        }
    }
}

/// Filter results for a whole image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressReport {
    pub thresholds: QuantileThresholds,
    pub directories: Vec<DirectoryReport>,
    pub tiles: usize,
    pub dropped: usize,
    pub drop_rate: f64,
}

impl CompressReport {
    fn new(thresholds: QuantileThresholds) -> Self {
        Self {
            thresholds,
            directories: Vec::new(),
            tiles: 0,
            dropped: 0,
            drop_rate: 0.0,
        }
    }

    fn push(&mut self, directory: DirectoryReport) {
        self.tiles += directory.tiles;
        self.dropped += directory.dropped;
        self.drop_rate = rate(self.dropped, self.tiles);
        self.directories.push(directory);
    }
}

impl fmt::Display for CompressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.directories {
            writeln!(
                f,
                "directory {}: {}/{} tiles dropped ({:.2}%)",
                d.directory,
                d.dropped,
                d.tiles,
                d.drop_rate * 100.0
            )?;
        }
        writeln!(
            f,
            "total: {}/{} tiles dropped ({:.2}%)",
            self.dropped,
            self.tiles,
            self.drop_rate * 100.0
        )
    }
}

fn rate(dropped: usize, tiles: usize) -> f64 {
    if tiles == 0 {
        0.0
    } else {
        dropped as f64 / tiles as f64
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Run the quantile filter over every directory of `source`.
///
/// Every directory is validated before the first tile is read. Output
/// directory `i` mirrors input directory `i`, with dropped tiles zero-filled.
pub async fn compress<S, K>(
    source: &mut S,
    sink: &mut K,
    thresholds: QuantileThresholds,
) -> Result<CompressReport, EngineError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
{
    let mut report = CompressReport::new(thresholds);
    let count = source.directory_count();
    if count == 0 {
        warn!(source = source.identifier(), "Image has no directories, nothing to filter");
        return Ok(report);
    }

    let mut readers = Vec::with_capacity(count);
    for directory in 0..count {
        GRAY_CHANNEL.check(source, directory)?;
        readers.push(ChannelReader::tiled(source, &[directory])?);
    }

    info!(
        source = source.identifier(),
        directories = count,
        mean_threshold = thresholds.mean,
        spread_threshold = thresholds.spread,
        "Filtering tiles"
    );

    for (directory, reader) in readers.iter().enumerate() {
        source.select_directory(directory)?;
        copy_tags(source, sink, DIRECTORY_TAGS)?;
        sink.set_tag(TiffTag::Compression, TagValue::Short(vec![1]))?;

        let result = match reader.layout().image.bits_per_sample {
            8 => filter_directory::<S, K, u8>(source, sink, reader, directory, thresholds).await?,
            _ => filter_directory::<S, K, u16>(source, sink, reader, directory, thresholds).await?,
        };
        sink.finalize_directory().await?;

        info!(
            directory,
            tiles = result.tiles,
            dropped = result.dropped,
            "Directory {} drop rate {:.2}%",
            directory,
            result.drop_rate * 100.0
        );
        report.push(result);
    }

    Ok(report)
}

async fn filter_directory<S, K, T>(
    source: &mut S,
    sink: &mut K,
    reader: &ChannelReader,
    directory: usize,
    thresholds: QuantileThresholds,
) -> Result<DirectoryReport, EngineError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
    T: Sample,
{
    let grid = reader.grid()?;
    let zeros = vec![0u8; reader.unit_bytes()];
    let mut samples: Vec<T> = Vec::new();
    let mut scratch: Vec<T> = Vec::new();
    let mut dropped = 0;

    for coord in grid.iter() {
        let raw = reader.read_tile(source, directory, coord).await?;
        decode_samples(&raw, &mut samples);
        let stats = TileStatistics::compute(&samples, &mut scratch)
            .ok_or(EngineError::EmptyTile { directory })?;

        match thresholds.decide(&stats) {
            TileDecision::Keep => write_tile(sink, directory, coord, &raw).await?,
            TileDecision::Drop => {
                debug!(
                    directory,
                    %coord,
                    mean = stats.mean,
                    p10 = stats.p10,
                    p90 = stats.p90,
                    spread = stats.spread,
                    "Dropping tile"
                );
                dropped += 1;
                write_tile(sink, directory, coord, &zeros).await?;
            }
        }
    }

    Ok(DirectoryReport::new(directory, grid.tile_count(), dropped))
}

// =============================================================================
// Tests
// =============================================================================
