//! Aligned tile and row access across channel directories.
//!
//! A [`ChannelReader`] is validated once for a set of directories and then
//! fetches the same tile (or row) from each of them in turn, decoding into
//! caller-owned buffers. Every failure carries the directory and the tile
//! coordinate or row it happened at.

use bytes::Bytes;
use serde::Serialize;

use crate::container::{DirectoryLayout, TileSink, TileSource};
use crate::error::{ContainerError, EngineError};

use super::{decode_samples, Sample, TileCoord, TileGrid};

/// Granularity a reader was validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadUnit {
    Tile,
    Row,
}

/// Validated plan for reading the same unit from several directories.
#[derive(Debug, Clone)]
pub struct ChannelReader {
    directories: Vec<usize>,
    layout: DirectoryLayout,
    unit: ReadUnit,
    unit_bytes: usize,
}

impl ChannelReader {
    /// Validate `directories` for tile-wise reading.
    ///
    /// Every directory must exist, be tiled, and share a non-zero tile
    /// byte size with the first one.
    pub fn tiled<S: TileSource + ?Sized>(
        source: &mut S,
        directories: &[usize],
    ) -> Result<Self, EngineError> {
        Self::validate(source, directories, ReadUnit::Tile)
    }

    /// Validate `directories` for row-wise reading.
    pub fn rows<S: TileSource + ?Sized>(
        source: &mut S,
        directories: &[usize],
    ) -> Result<Self, EngineError> {
        Self::validate(source, directories, ReadUnit::Row)
    }

    fn validate<S: TileSource + ?Sized>(
        source: &mut S,
        directories: &[usize],
        unit: ReadUnit,
    ) -> Result<Self, EngineError> {
        let available = source.directory_count();
        let mut first: Option<(DirectoryLayout, usize)> = None;

        for &directory in directories {
            if directory >= available {
                return Err(EngineError::ChannelOutOfRange {
                    channel: directory,
                    available,
                });
            }
            source.select_directory(directory)?;
            let layout = *source.layout()?;

            let unit_bytes = match unit {
                ReadUnit::Tile => layout.tile_byte_size().ok_or_else(|| {
                    EngineError::UnsupportedLayout {
                        directory,
                        reason: "directory is not tiled".to_string(),
                    }
                })?,
                ReadUnit::Row => {
                    if layout.is_tiled() {
                        return Err(EngineError::UnsupportedLayout {
                            directory,
                            reason: "directory is tiled, expected strips".to_string(),
                        });
                    }
                    layout.scanline_byte_size()
                }
            };
            if unit_bytes == 0 {
                return Err(EngineError::EmptyTile { directory });
            }

            match first {
                None => first = Some((layout, unit_bytes)),
                Some((_, expected)) if expected != unit_bytes => {
                    return Err(EngineError::TileSizeMismatch {
                        directory,
                        expected,
                        actual: unit_bytes,
                    });
                }
                Some(_) => {}
            }
        }

        let (layout, unit_bytes) = first.ok_or_else(|| {
            EngineError::InvalidArgument("no directories selected".to_string())
        })?;

        Ok(Self {
            directories: directories.to_vec(),
            layout,
            unit,
            unit_bytes,
        })
    }

    /// Directories in the order they were given.
    pub fn directories(&self) -> &[usize] {
        &self.directories
    }

    /// Layout of the first directory.
    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn unit(&self) -> ReadUnit {
        self.unit
    }

    /// Bytes per tile (or row) shared by all directories.
    pub fn unit_bytes(&self) -> usize {
        self.unit_bytes
    }

    /// Tile grid of the first directory.
    pub fn grid(&self) -> Result<TileGrid, EngineError> {
        let tile = self.layout.tile.ok_or_else(|| {
            EngineError::InvalidGeometry("directory is not tiled".to_string())
        })?;
        TileGrid::new(
            self.layout.image.width,
            self.layout.image.height,
            tile.tile_width,
            tile.tile_height,
        )
    }

    /// Rows to traverse for row-wise reading.
    pub fn row_count(&self) -> u32 {
        self.layout.image.height
    }

    /// Select `directory` and read the raw tile at `coord`.
    pub async fn read_tile<S: TileSource + ?Sized>(
        &self,
        source: &mut S,
        directory: usize,
        coord: TileCoord,
    ) -> Result<Bytes, EngineError> {
        let tile_io = |source: ContainerError| EngineError::TileIo {
            directory,
            coord,
            source,
        };
        source.select_directory(directory).map_err(tile_io)?;
        let bytes = source
            .read_tile(coord.x, coord.y)
            .await
            .map_err(tile_io)?;
        self.check_len(directory, bytes.len())?;
        Ok(bytes)
    }

    /// Read the tile at `coord` of `directory` into `out` as samples.
    pub async fn read_tile_into<S, T>(
        &self,
        source: &mut S,
        directory: usize,
        coord: TileCoord,
        out: &mut Vec<T>,
    ) -> Result<(), EngineError>
    where
        S: TileSource + ?Sized,
        T: Sample,
    {
        let bytes = self.read_tile(source, directory, coord).await?;
        decode_samples(&bytes, out);
        Ok(())
    }

    /// Select `directory` and read the raw row.
    pub async fn read_row<S: TileSource + ?Sized>(
        &self,
        source: &mut S,
        directory: usize,
        row: u32,
    ) -> Result<Bytes, EngineError> {
        let scanline_io = |source: ContainerError| EngineError::ScanlineIo {
            directory,
            row,
            source,
        };
        source.select_directory(directory).map_err(scanline_io)?;
        let bytes = source.read_scanline(row).await.map_err(scanline_io)?;
        self.check_len(directory, bytes.len())?;
        Ok(bytes)
    }

    /// Read `row` of `directory` into `out` as samples.
    pub async fn read_row_into<S, T>(
        &self,
        source: &mut S,
        directory: usize,
        row: u32,
        out: &mut Vec<T>,
    ) -> Result<(), EngineError>
    where
        S: TileSource + ?Sized,
        T: Sample,
    {
        let bytes = self.read_row(source, directory, row).await?;
        decode_samples(&bytes, out);
        Ok(())
    }

    fn check_len(&self, directory: usize, actual: usize) -> Result<(), EngineError> {
        if actual != self.unit_bytes {
            return Err(EngineError::TileSizeMismatch {
                directory,
                expected: self.unit_bytes,
                actual,
            });
        }
        Ok(())
    }
}

/// Write a tile to the sink's current directory.
///
/// `directory` is the index of the output directory, for error reporting.
pub async fn write_tile<K: TileSink + ?Sized>(
    sink: &mut K,
    directory: usize,
    coord: TileCoord,
    data: &[u8],
) -> Result<(), EngineError> {
    sink.write_tile(coord.x, coord.y, data)
        .await
        .map_err(|source| EngineError::TileIo {
            directory,
            coord,
            source,
        })
}

/// Write a row to the sink's current directory.
pub async fn write_row<K: TileSink + ?Sized>(
    sink: &mut K,
    directory: usize,
    row: u32,
    data: &[u8],
) -> Result<(), EngineError> {
    sink.write_scanline(row, data)
        .await
        .map_err(|source| EngineError::ScanlineIo {
            directory,
            row,
            source,
        })
}

// =============================================================================
// Tests
// =============================================================================
