//! Affine-window channel compositing.
//!
//! Each selected channel is windowed to `0..=255` through its palette
//! bounds, scaled by the channel's RGB weights and summed. Sums are clamped
//! to `255 * 255` before dividing back down to 8 bits, so saturating
//! channels blend to white instead of wrapping.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::container::{TileSink, TileSource};
use crate::error::EngineError;
use crate::palette::{ChannelDescriptor, Palette, Rgb};
use crate::tile::{write_row, write_tile, ChannelReader, ReadUnit, Sample};

use super::{stage_rgb_directory, ChannelRequirements};

const MAX_WEIGHTED_SUM: u64 = 255 * 255;

const COLOR_CHANNEL: ChannelRequirements = ChannelRequirements {
    bits: &[8, 16],
    min_is_black: false,
};

/// Map `value` from `[lower, upper]` onto `[0, 255]`, truncating.
///
/// Values at or below `lower` give 0, at or above `upper` give 255. An
/// empty or inverted window (`upper <= lower`) maps everything to 0.
pub fn affine_window(value: u64, lower: u32, upper: u32) -> u8 {
    if upper <= lower {
        return 0;
    }
    let (lower, upper) = (u64::from(lower), u64::from(upper));
    if value <= lower {
        0
    } else if value >= upper {
        255
    } else {
        let scale = 255.0 / (upper - lower) as f64;
        ((value - lower) as f64 * scale) as u8
    }
}

/// Blend one pixel's channel values into an RGB triple.
pub fn combine_channels(values: &[u64], channels: &[ChannelDescriptor]) -> Result<Rgb, EngineError> {
    if values.len() != channels.len() {
        return Err(EngineError::InvalidArgument(format!(
            "{} channel values for {} channel descriptors",
            values.len(),
            channels.len()
        )));
    }

    let (mut red, mut green, mut blue) = (0u64, 0u64, 0u64);
    for (&value, channel) in values.iter().zip(channels) {
        let windowed = u64::from(affine_window(value, channel.lower, channel.upper));
        red += windowed * u64::from(channel.color.red);
        green += windowed * u64::from(channel.color.green);
        blue += windowed * u64::from(channel.color.blue);
    }

    let scale = |sum: u64| (sum.min(MAX_WEIGHTED_SUM) / 255) as u8;
    Ok(Rgb::new(scale(red), scale(green), scale(blue)))
}

/// What a colorize run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorizeReport {
    /// Directory indices, in blending order
    pub selection: Vec<usize>,
    pub channels: Vec<String>,
    pub unit: Option<ReadUnit>,
    /// Tiles or rows written
    pub units: usize,
}

impl ColorizeReport {
    fn empty() -> Self {
        Self {
            selection: Vec::new(),
            channels: Vec::new(),
            unit: None,
            units: 0,
        }
    }
}

impl fmt::Display for ColorizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            None => writeln!(f, "no channels selected"),
            Some(unit) => writeln!(
                f,
                "colorized {} ({}): {} {}s",
                self.channels.join(", "),
                self.selection
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
                self.units,
                unit_name(unit)
            ),
        }
    }
}

pub(crate) fn unit_name(unit: ReadUnit) -> &'static str {
    match unit {
        ReadUnit::Tile => "tile",
        ReadUnit::Row => "row",
    }
}

/// Composite the selected channels of `source` into one RGB directory.
///
/// `selection` holds palette indices, which are also directory indices.
/// An empty selection does nothing. Tiled inputs are processed tile by
/// tile; stripped inputs row by row.
pub async fn colorize<S, K>(
    source: &mut S,
    sink: &mut K,
    palette: &Palette,
    selection: &[usize],
) -> Result<ColorizeReport, EngineError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
{
    if selection.is_empty() {
        info!("No channels selected, nothing to colorize");
        return Ok(ColorizeReport::empty());
    }

    let channels = palette.select(selection)?;
    let available = source.directory_count();
    if let Some(&channel) = selection.iter().find(|&&c| c >= available) {
        return Err(EngineError::ChannelOutOfRange { channel, available });
    }

    let mut bits = None;
    for &directory in selection {
        let layout = COLOR_CHANNEL.check(source, directory)?;
        match bits {
            None => bits = Some(layout.image.bits_per_sample),
            Some(b) if b != layout.image.bits_per_sample => {
                return Err(EngineError::UnsupportedLayout {
                    directory,
                    reason: format!(
                        "{} bits per sample, other channels have {}",
                        layout.image.bits_per_sample, b
                    ),
                });
            }
            Some(_) => {}
        }
    }

    source.select_directory(selection[0])?;
    let reader = if source.is_tiled()? {
        ChannelReader::tiled(source, selection)?
    } else {
        ChannelReader::rows(source, selection)?
    };

    source.select_directory(selection[0])?;
    stage_rgb_directory(source, sink, reader.layout())?;

    info!(
        source = source.identifier(),
        channels = ?channels.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        unit = ?reader.unit(),
        "Colorizing"
    );

    let output = sink.directories_written();
    let units = match bits {
        Some(8) => composite::<S, K, u8>(source, sink, &reader, &channels, output).await?,
        _ => composite::<S, K, u16>(source, sink, &reader, &channels, output).await?,
    };
    sink.finalize_directory().await?;

    Ok(ColorizeReport {
        selection: selection.to_vec(),
        channels: channels.into_iter().map(|c| c.name).collect(),
        unit: Some(reader.unit()),
        units,
    })
}

async fn composite<S, K, T>(
    source: &mut S,
    sink: &mut K,
    reader: &ChannelReader,
    channels: &[ChannelDescriptor],
    output: usize,
) -> Result<usize, EngineError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
    T: Sample,
{
    let mut buffers: Vec<Vec<T>> = vec![Vec::new(); reader.directories().len()];
    let mut values: Vec<u64> = Vec::with_capacity(channels.len());
    let mut out: Vec<u8> = Vec::new();

    match reader.unit() {
        ReadUnit::Tile => {
            let grid = reader.grid()?;
            for coord in grid.iter() {
                for (buffer, &directory) in buffers.iter_mut().zip(reader.directories()) {
                    reader
                        .read_tile_into(source, directory, coord, buffer)
                        .await?;
                }
                blend(&buffers, channels, &mut values, &mut out)?;
                write_tile(sink, output, coord, &out).await?;
            }
            debug!(tiles = grid.tile_count(), "Colorized tiles");
            Ok(grid.tile_count())
        }
        ReadUnit::Row => {
            let rows = reader.row_count();
            for row in 0..rows {
                for (buffer, &directory) in buffers.iter_mut().zip(reader.directories()) {
                    reader.read_row_into(source, directory, row, buffer).await?;
                }
                blend(&buffers, channels, &mut values, &mut out)?;
                write_row(sink, output, row, &out).await?;
            }
            debug!(rows, "Colorized rows");
            Ok(rows as usize)
        }
    }
}

/// Blend aligned channel buffers into interleaved RGB bytes.
fn blend<T: Sample>(
    buffers: &[Vec<T>],
    channels: &[ChannelDescriptor],
    values: &mut Vec<u64>,
    out: &mut Vec<u8>,
) -> Result<(), EngineError> {
    let pixels = buffers.first().map_or(0, Vec::len);
    out.clear();
    out.reserve(pixels * 3);
    for i in 0..pixels {
        values.clear();
        values.extend(buffers.iter().map(|b| b[i].into()));
        let rgb = combine_channels(values, channels)?;
        out.extend_from_slice(&[rgb.red, rgb.green, rgb.blue]);
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
