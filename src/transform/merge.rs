//! Grayscale to RGB merge.
//!
//! Three 8-bit grayscale planes become one interleaved RGB image. The
//! planes are either the first three directories of one image or the first
//! directory of three separate images.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::container::{TileSink, TileSource};
use crate::error::EngineError;
use crate::tile::{write_row, write_tile, ChannelReader, ReadUnit, TileCoord};

use super::colorize::unit_name;
use super::{stage_rgb_directory, ChannelRequirements};

const GRAY8: ChannelRequirements = ChannelRequirements {
    bits: &[8],
    min_is_black: true,
};

/// Interleave three planes: `out[3i..3i + 3] = (red[i], green[i], blue[i])`.
pub fn interleave_rgb(
    red: &[u8],
    green: &[u8],
    blue: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), EngineError> {
    if red.len() != green.len() || red.len() != blue.len() {
        return Err(EngineError::InvalidArgument(format!(
            "plane lengths differ: {}, {}, {}",
            red.len(),
            green.len(),
            blue.len()
        )));
    }
    out.clear();
    out.reserve(red.len() * 3);
    for ((&r, &g), &b) in red.iter().zip(green).zip(blue) {
        out.extend_from_slice(&[r, g, b]);
    }
    Ok(())
}

/// What a merge run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub unit: ReadUnit,
    /// Tiles or rows written
    pub units: usize,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "merged {}x{} RGB: {} {}s",
            self.width,
            self.height,
            self.units,
            unit_name(self.unit)
        )
    }
}

/// Merge directories 0, 1 and 2 of `source` into one RGB directory.
pub async fn merge_gray_to_rgb<S, K>(source: &mut S, sink: &mut K) -> Result<MergeReport, EngineError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
{
    let count = source.directory_count();
    if count != 3 {
        return Err(EngineError::DirectoryCount {
            expected: 3,
            actual: count,
        });
    }
    for directory in 0..3 {
        GRAY8.check(source, directory)?;
    }

    source.select_directory(0)?;
    let reader = if source.is_tiled()? {
        ChannelReader::tiled(source, &[0, 1, 2])?
    } else {
        ChannelReader::rows(source, &[0, 1, 2])?
    };
    source.select_directory(0)?;
    stage_rgb_directory(source, sink, reader.layout())?;

    info!(source = source.identifier(), unit = ?reader.unit(), "Merging planes to RGB");

    let output = sink.directories_written();
    let mut planes: [Vec<u8>; 3] = Default::default();
    let mut out = Vec::new();
    let units = match reader.unit() {
        ReadUnit::Tile => {
            let grid = reader.grid()?;
            for coord in grid.iter() {
                for (directory, plane) in planes.iter_mut().enumerate() {
                    reader
                        .read_tile_into(source, directory, coord, plane)
                        .await?;
                }
                interleave_rgb(&planes[0], &planes[1], &planes[2], &mut out)?;
                write_tile(sink, output, coord, &out).await?;
            }
            grid.tile_count()
        }
        ReadUnit::Row => {
            for row in 0..reader.row_count() {
                for (directory, plane) in planes.iter_mut().enumerate() {
                    reader.read_row_into(source, directory, row, plane).await?;
                }
                interleave_rgb(&planes[0], &planes[1], &planes[2], &mut out)?;
                write_row(sink, output, row, &out).await?;
            }
            reader.row_count() as usize
        }
    };
    sink.finalize_directory().await?;

    Ok(report(&reader, units))
}

/// Merge the first directory of three separate images into one RGB
/// directory.
///
/// The three planes must share image size and tiling (or all be stripped).
pub async fn merge_gray_planes_to_rgb<S, K>(
    red: &mut S,
    green: &mut S,
    blue: &mut S,
    sink: &mut K,
) -> Result<MergeReport, EngineError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
{
    let mut sources: [&mut S; 3] = [red, green, blue];
    let mut readers = Vec::with_capacity(3);
    for source in sources.iter_mut() {
        let count = source.directory_count();
        if count == 0 {
            return Err(EngineError::DirectoryCount {
                expected: 1,
                actual: 0,
            });
        }
        GRAY8.check(&mut **source, 0)?;
        let reader = if source.is_tiled()? {
            ChannelReader::tiled(&mut **source, &[0])?
        } else {
            ChannelReader::rows(&mut **source, &[0])?
        };
        readers.push(reader);
    }

    let first = *readers[0].layout();
    for (plane, reader) in readers.iter().enumerate().skip(1) {
        let layout = reader.layout();
        if layout.image.width != first.image.width
            || layout.image.height != first.image.height
            || layout.tile != first.tile
        {
            return Err(EngineError::UnsupportedLayout {
                directory: 0,
                reason: format!(
                    "plane {} of {} is {}x{} with tiles {:?}, expected {}x{} with tiles {:?}",
                    plane,
                    sources[plane].identifier(),
                    layout.image.width,
                    layout.image.height,
                    layout.tile,
                    first.image.width,
                    first.image.height,
                    first.tile
                ),
            });
        }
    }

    stage_rgb_directory(&*sources[0], sink, &first)?;
    info!(
        red = sources[0].identifier(),
        green = sources[1].identifier(),
        blue = sources[2].identifier(),
        unit = ?readers[0].unit(),
        "Merging images to RGB"
    );

    let output = sink.directories_written();
    let mut planes: [Vec<u8>; 3] = Default::default();
    let mut out = Vec::new();
    let units = match readers[0].unit() {
        ReadUnit::Tile => {
            let grid = readers[0].grid()?;
            for coord in grid.iter() {
                read_plane_tiles(&mut sources, &readers, coord, &mut planes).await?;
                interleave_rgb(&planes[0], &planes[1], &planes[2], &mut out)?;
                write_tile(sink, output, coord, &out).await?;
            }
            grid.tile_count()
        }
        ReadUnit::Row => {
            for row in 0..readers[0].row_count() {
                for ((source, reader), plane) in
                    sources.iter_mut().zip(&readers).zip(planes.iter_mut())
                {
                    reader.read_row_into(&mut **source, 0, row, plane).await?;
                }
                interleave_rgb(&planes[0], &planes[1], &planes[2], &mut out)?;
                write_row(sink, output, row, &out).await?;
            }
            readers[0].row_count() as usize
        }
    };
    sink.finalize_directory().await?;

    Ok(report(&readers[0], units))
}

async fn read_plane_tiles<S: TileSource + ?Sized>(
    sources: &mut [&mut S; 3],
    readers: &[ChannelReader],
    coord: TileCoord,
    planes: &mut [Vec<u8>; 3],
) -> Result<(), EngineError> {
    for ((source, reader), plane) in sources.iter_mut().zip(readers).zip(planes.iter_mut()) {
        reader.read_tile_into(&mut **source, 0, coord, plane).await?;
    }
    Ok(())
}

fn report(reader: &ChannelReader, units: usize) -> MergeReport {
    MergeReport {
        unit: reader.unit(),
        units,
        width: reader.layout().image.width,
        height: reader.layout().image.height,
    }
}

// =============================================================================
// Tests
// =============================================================================
