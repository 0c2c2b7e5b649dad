//! Tile containers.
//!
//! A container is a multi-directory image that can be read tile by tile
//! ([`TileSource`]) or written tile by tile ([`TileSink`]). Each handle has
//! one current-directory cursor; tile and tag operations act on whichever
//! directory is selected.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Transforms (quantile, colorize, ...)  │
//! └────────────────────┬────────────────────┘
//!                      │  ChannelReader / write_tile
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       TileSource / TileSink traits      │
//! └──────┬──────────────┬────────────┬──────┘
//!        ▼              ▼            ▼
//! ┌────────────┐ ┌─────────────┐ ┌──────────────────┐
//! │ TiffReader │ │  TiffSink   │ │ MemoryContainer  │
//! └─────┬──────┘ └──────┬──────┘ └──────────────────┘
//!       ▼               ▼
//!  RangeReader      TiffWriter
//! ```
//!
//! Selecting a directory requires `&mut self`, so a handle can never be
//! re-pointed while another caller is mid-read. Callers that share one
//! handle across tasks go through [`SharedSource`], which performs select
//! and read as one locked unit.
//!
//! Pixel data crosses these traits as little-endian sample bytes.

mod layout;
mod memory;
mod shared;
mod tag_copy;
mod tiff_file;

pub use layout::{DirectoryLayout, ImageGeometry, TileGeometry};
pub use memory::{MemoryContainer, MemoryDirectory};
pub use shared::SharedSource;
pub use tag_copy::{copy_tags, TagCopyReport, TagCopyRule, DESCRIPTIVE_TAGS, DIRECTORY_TAGS};
pub use tiff_file::{TiffReader, TiffSink};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ContainerError;
use crate::format::tiff::{TagSet, TagValue, TiffTag};

// =============================================================================
// TileSource
// =============================================================================

/// Read access to a multi-directory tiled or stripped image.
#[async_trait]
pub trait TileSource: Send {
    /// Name of the underlying file or buffer, for logs and errors.
    fn identifier(&self) -> &str;

    fn directory_count(&self) -> usize;

    /// Index of the selected directory.
    fn current_directory(&self) -> usize;

    /// Point the cursor at directory `index`.
    fn select_directory(&mut self, index: usize) -> Result<(), ContainerError>;

    /// Tags of the selected directory.
    fn tags(&self) -> Result<&TagSet, ContainerError>;

    /// Layout of the selected directory.
    fn layout(&self) -> Result<&DirectoryLayout, ContainerError>;

    /// Value of one tag of the selected directory.
    fn tag(&self, tag: TiffTag) -> Option<&TagValue> {
        self.tags().ok()?.get(tag)
    }

    fn is_tiled(&self) -> Result<bool, ContainerError> {
        Ok(self.layout()?.is_tiled())
    }

    /// Read the full tile whose origin is `(x, y)`.
    async fn read_tile(&mut self, x: u32, y: u32) -> Result<Bytes, ContainerError>;

    /// Read one image row of a stripped directory.
    async fn read_scanline(&mut self, row: u32) -> Result<Bytes, ContainerError>;
}

// =============================================================================
// TileSink
// =============================================================================

/// Write access to a multi-directory image, one directory at a time.
///
/// Geometry tags must be staged with [`TileSink::set_tag`] before the first
/// tile or row of a directory is written.
#[async_trait]
pub trait TileSink: Send {
    fn identifier(&self) -> &str;

    /// Stage a tag for the directory being written.
    fn set_tag(&mut self, tag: TiffTag, value: TagValue) -> Result<(), ContainerError>;

    /// Write the full tile whose origin is `(x, y)`.
    async fn write_tile(&mut self, x: u32, y: u32, data: &[u8]) -> Result<(), ContainerError>;

    /// Write one image row of a stripped directory.
    async fn write_scanline(&mut self, row: u32, data: &[u8]) -> Result<(), ContainerError>;

    /// Close the current directory and start a new one.
    async fn finalize_directory(&mut self) -> Result<(), ContainerError>;

    /// Directories closed so far.
    fn directories_written(&self) -> usize;
}

/// Stage every tag in `tags` on `sink`.
pub fn stage_tags<K: TileSink + ?Sized>(sink: &mut K, tags: &TagSet) -> Result<(), ContainerError> {
    for (id, value) in tags.iter() {
        if let Some(tag) = TiffTag::from_u16(id) {
            sink.set_tag(tag, value.clone())?;
        }
    }
    Ok(())
}
