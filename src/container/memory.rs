//! In-memory container.
//!
//! [`MemoryContainer`] is both a [`TileSource`] and a [`TileSink`]: finalized
//! directories become readable from the same value. It is what the tests
//! build synthetic channel images with, and it lets library callers run a
//! transform without touching the filesystem.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ContainerError;
use crate::format::tiff::{Photometric, PlanarConfiguration, TagSet, TagValue, TiffTag};
use crate::tile::{encode_samples, Sample, TileCoord};

use super::{DirectoryLayout, ImageGeometry, TileGeometry, TileSink, TileSource};

/// One directory: tags, layout and the stored tiles or rows.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    tags: TagSet,
    layout: DirectoryLayout,
    /// Tiles in row-major order, or one entry per image row
    chunks: Vec<Option<Bytes>>,
}

impl MemoryDirectory {
    /// Build a directory from tags, with no data yet.
    pub fn from_tags(tags: TagSet) -> Result<Self, ContainerError> {
        let layout = DirectoryLayout::from_tags(&tags)?;
        let chunk_count = if layout.is_tiled() {
            layout.tile_count()
        } else {
            layout.image.height as usize
        };
        Ok(Self {
            tags,
            layout,
            chunks: vec![None; chunk_count],
        })
    }

    /// Single-channel tiled directory cut from a full row-major image.
    ///
    /// Edge tiles are padded with zero samples.
    pub fn tiled<T: Sample>(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        pixels: &[T],
    ) -> Result<Self, ContainerError> {
        let layout = DirectoryLayout {
            image: gray_geometry::<T>(width, height),
            tile: Some(TileGeometry {
                tile_width,
                tile_height,
            }),
            rows_per_strip: height,
        };
        check_pixel_count(width, height, pixels.len())?;
        let mut directory = Self::from_tags(gray_tags(&layout))?;

        let grid = layout
            .grid()
            .ok_or_else(|| ContainerError::Layout("zero tile size".to_string()))?;
        let mut tile = vec![T::default(); (tile_width * tile_height) as usize];
        let mut encoded = Vec::new();
        for (index, coord) in grid.iter().enumerate() {
            tile.iter_mut().for_each(|s| *s = T::default());
            for ty in 0..tile_height {
                let y = coord.y + ty;
                if y >= height {
                    break;
                }
                for tx in 0..tile_width {
                    let x = coord.x + tx;
                    if x >= width {
                        break;
                    }
                    tile[(ty * tile_width + tx) as usize] = pixels[(y * width + x) as usize];
                }
            }
            encode_samples(&tile, &mut encoded);
            directory.chunks[index] = Some(Bytes::copy_from_slice(&encoded));
        }
        Ok(directory)
    }

    /// Single-channel stripped directory, one row per chunk.
    pub fn stripped<T: Sample>(width: u32, height: u32, pixels: &[T]) -> Result<Self, ContainerError> {
        let layout = DirectoryLayout {
            image: gray_geometry::<T>(width, height),
            tile: None,
            rows_per_strip: 1,
        };
        check_pixel_count(width, height, pixels.len())?;
        let mut directory = Self::from_tags(gray_tags(&layout))?;

        let mut encoded = Vec::new();
        for (row, samples) in pixels.chunks_exact(width as usize).enumerate() {
            encode_samples(samples, &mut encoded);
            directory.chunks[row] = Some(Bytes::copy_from_slice(&encoded));
        }
        Ok(directory)
    }

    /// Set or replace a tag without touching the stored data.
    pub fn with_tag(mut self, tag: TiffTag, value: TagValue) -> Self {
        self.tags.insert(tag, value);
        if let Ok(layout) = DirectoryLayout::from_tags(&self.tags) {
            self.layout = layout;
        }
        self
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }
}

fn gray_geometry<T: Sample>(width: u32, height: u32) -> ImageGeometry {
    ImageGeometry {
        width,
        height,
        bits_per_sample: T::BITS,
        samples_per_pixel: 1,
        planar: PlanarConfiguration::Contiguous,
    }
}

fn gray_tags(layout: &DirectoryLayout) -> TagSet {
    let mut tags = layout.to_tags();
    tags.insert(TiffTag::Compression, TagValue::Short(vec![1]));
    tags.insert(
        TiffTag::PhotometricInterpretation,
        TagValue::Short(vec![Photometric::MinIsBlack as u16]),
    );
    tags.insert(TiffTag::SampleFormat, TagValue::Short(vec![1]));
    tags.insert(TiffTag::SubfileType, TagValue::Long(vec![0]));
    tags
}

fn check_pixel_count(width: u32, height: u32, actual: usize) -> Result<(), ContainerError> {
    let expected = width as usize * height as usize;
    if actual != expected {
        return Err(ContainerError::Layout(format!(
            "{}x{} image needs {} samples, got {}",
            width, height, expected, actual
        )));
    }
    Ok(())
}

/// In-memory multi-directory image.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    identifier: String,
    directories: Vec<MemoryDirectory>,
    current: usize,
    pending: TagSet,
    pending_chunks: HashMap<usize, Bytes>,
    failing_tiles: Vec<(usize, TileCoord)>,
}

impl MemoryContainer {
    /// Empty container, ready to be written to.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Container holding the given directories.
    pub fn with_directories(
        identifier: impl Into<String>,
        directories: Vec<MemoryDirectory>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            directories,
            ..Self::default()
        }
    }

    pub fn push_directory(&mut self, directory: MemoryDirectory) {
        self.directories.push(directory);
    }

    pub fn directories(&self) -> &[MemoryDirectory] {
        &self.directories
    }

    /// Make every read of the tile at `coord` in `directory` fail.
    pub fn fail_tile_read(&mut self, directory: usize, coord: TileCoord) {
        self.failing_tiles.push((directory, coord));
    }

    /// Stored bytes of a tile, bypassing failure injection.
    pub fn tile_bytes(&self, directory: usize, x: u32, y: u32) -> Option<&Bytes> {
        let dir = self.directories.get(directory)?;
        let index = dir.layout.tile_index(x, y).ok()?;
        dir.chunks.get(index)?.as_ref()
    }

    fn directory(&self) -> Result<&MemoryDirectory, ContainerError> {
        self.directories
            .get(self.current)
            .ok_or(ContainerError::DirectoryOutOfRange {
                index: self.current,
                count: self.directories.len(),
            })
    }

    fn chunk(&self, index: usize, expected: usize) -> Result<Bytes, ContainerError> {
        let chunk = self
            .directory()?
            .chunks
            .get(index)
            .and_then(|c| c.clone())
            .ok_or(ContainerError::ShortRead {
                expected,
                actual: 0,
            })?;
        if chunk.len() < expected {
            return Err(ContainerError::ShortRead {
                expected,
                actual: chunk.len(),
            });
        }
        Ok(chunk)
    }

    fn pending_layout(&self) -> Result<DirectoryLayout, ContainerError> {
        DirectoryLayout::from_tags(&self.pending)
    }
}

#[async_trait]
impl TileSource for MemoryContainer {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn directory_count(&self) -> usize {
        self.directories.len()
    }

    fn current_directory(&self) -> usize {
        self.current
    }

    fn select_directory(&mut self, index: usize) -> Result<(), ContainerError> {
        if index >= self.directories.len() {
            return Err(ContainerError::DirectoryOutOfRange {
                index,
                count: self.directories.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    fn tags(&self) -> Result<&TagSet, ContainerError> {
        Ok(&self.directory()?.tags)
    }

    fn layout(&self) -> Result<&DirectoryLayout, ContainerError> {
        Ok(&self.directory()?.layout)
    }

    async fn read_tile(&mut self, x: u32, y: u32) -> Result<Bytes, ContainerError> {
        let coord = TileCoord::new(x, y);
        if self.failing_tiles.contains(&(self.current, coord)) {
            return Err(ContainerError::ReadFailed(format!(
                "injected failure at {} in directory {}",
                coord, self.current
            )));
        }
        let layout = *self.layout()?;
        let index = layout.tile_index(x, y)?;
        self.chunk(index, layout.tile_byte_size().unwrap_or(0))
    }

    async fn read_scanline(&mut self, row: u32) -> Result<Bytes, ContainerError> {
        let layout = *self.layout()?;
        if layout.is_tiled() {
            return Err(ContainerError::Layout(
                "scanline access on a tiled directory".to_string(),
            ));
        }
        if row >= layout.image.height {
            return Err(ContainerError::RowOutOfRange {
                row,
                height: layout.image.height,
            });
        }
        self.chunk(row as usize, layout.scanline_byte_size())
    }
}

#[async_trait]
impl TileSink for MemoryContainer {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn set_tag(&mut self, tag: TiffTag, value: TagValue) -> Result<(), ContainerError> {
        if !tag.is_data_location() {
            self.pending.insert(tag, value);
        }
        Ok(())
    }

    async fn write_tile(&mut self, x: u32, y: u32, data: &[u8]) -> Result<(), ContainerError> {
        let layout = self.pending_layout()?;
        let index = layout.tile_index(x, y)?;
        let expected = layout.tile_byte_size().unwrap_or(0);
        if data.len() != expected {
            return Err(ContainerError::ShortWrite {
                expected,
                actual: data.len(),
            });
        }
        self.pending_chunks
            .insert(index, Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn write_scanline(&mut self, row: u32, data: &[u8]) -> Result<(), ContainerError> {
        let layout = self.pending_layout()?;
        if layout.is_tiled() {
            return Err(ContainerError::Layout(
                "scanline write to a tiled directory".to_string(),
            ));
        }
        if row >= layout.image.height {
            return Err(ContainerError::RowOutOfRange {
                row,
                height: layout.image.height,
            });
        }
        let expected = layout.scanline_byte_size();
        if data.len() != expected {
            return Err(ContainerError::ShortWrite {
                expected,
                actual: data.len(),
            });
        }
        self.pending_chunks
            .insert(row as usize, Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn finalize_directory(&mut self) -> Result<(), ContainerError> {
        let tags = std::mem::take(&mut self.pending);
        let mut directory = MemoryDirectory::from_tags(tags)?;
        for (index, chunk) in self.pending_chunks.drain() {
            if let Some(slot) = directory.chunks.get_mut(index) {
                *slot = Some(chunk);
            }
        }
        self.directories.push(directory);
        Ok(())
    }

    fn directories_written(&self) -> usize {
        self.directories.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
