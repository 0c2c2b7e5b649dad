//! Geometry of one directory, derived from its tags.

use serde::Serialize;

use crate::error::ContainerError;
use crate::format::tiff::{PlanarConfiguration, TagSet, TagValue, TiffTag};
use crate::tile::{TileCoord, TileGrid};

/// Pixel geometry of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageGeometry {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub planar: PlanarConfiguration,
}

/// Tile dimensions of a tiled directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileGeometry {
    pub tile_width: u32,
    pub tile_height: u32,
}

/// Everything needed to address tiles or rows of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DirectoryLayout {
    pub image: ImageGeometry,
    pub tile: Option<TileGeometry>,
    pub rows_per_strip: u32,
}

impl DirectoryLayout {
    /// Build a layout from geometry tags.
    ///
    /// Data location tags are not consulted, so this works both for parsed
    /// directories and for tags staged on a sink before any data is written.
    pub fn from_tags(tags: &TagSet) -> Result<Self, ContainerError> {
        let width = tags
            .u32(TiffTag::ImageWidth)
            .ok_or(ContainerError::MissingTag("ImageWidth"))?;
        let height = tags
            .u32(TiffTag::ImageLength)
            .ok_or(ContainerError::MissingTag("ImageLength"))?;
        if width == 0 || height == 0 {
            return Err(ContainerError::Layout(format!(
                "image size {}x{} has a zero dimension",
                width, height
            )));
        }

        let bits_per_sample = tags.u16(TiffTag::BitsPerSample).unwrap_or(1);
        let samples_per_pixel = tags.u16(TiffTag::SamplesPerPixel).unwrap_or(1);
        let planar = tags
            .u16(TiffTag::PlanarConfiguration)
            .and_then(PlanarConfiguration::from_u16)
            .unwrap_or_default();

        let tile = match (tags.u32(TiffTag::TileWidth), tags.u32(TiffTag::TileLength)) {
            (Some(tile_width), Some(tile_height)) => {
                if tile_width == 0 || tile_height == 0 {
                    return Err(ContainerError::Layout(format!(
                        "tile size {}x{} has a zero dimension",
                        tile_width, tile_height
                    )));
                }
                Some(TileGeometry {
                    tile_width,
                    tile_height,
                })
            }
            (None, None) => None,
            (Some(_), None) => return Err(ContainerError::MissingTag("TileLength")),
            (None, Some(_)) => return Err(ContainerError::MissingTag("TileWidth")),
        };

        let rows_per_strip = tags
            .u32(TiffTag::RowsPerStrip)
            .unwrap_or(height)
            .clamp(1, height);

        Ok(Self {
            image: ImageGeometry {
                width,
                height,
                bits_per_sample,
                samples_per_pixel,
                planar,
            },
            tile,
            rows_per_strip,
        })
    }

    /// Geometry tags describing this layout, for staging on a sink.
    pub fn to_tags(&self) -> TagSet {
        let mut tags = TagSet::new();
        tags.insert(TiffTag::ImageWidth, TagValue::Long(vec![self.image.width]));
        tags.insert(TiffTag::ImageLength, TagValue::Long(vec![self.image.height]));
        tags.insert(
            TiffTag::BitsPerSample,
            TagValue::Short(vec![
                self.image.bits_per_sample;
                self.image.samples_per_pixel as usize
            ]),
        );
        tags.insert(
            TiffTag::SamplesPerPixel,
            TagValue::Short(vec![self.image.samples_per_pixel]),
        );
        tags.insert(
            TiffTag::PlanarConfiguration,
            TagValue::Short(vec![self.image.planar as u16]),
        );
        match self.tile {
            Some(tile) => {
                tags.insert(TiffTag::TileWidth, TagValue::Long(vec![tile.tile_width]));
                tags.insert(TiffTag::TileLength, TagValue::Long(vec![tile.tile_height]));
            }
            None => {
                tags.insert(
                    TiffTag::RowsPerStrip,
                    TagValue::Long(vec![self.rows_per_strip]),
                );
            }
        }
        tags
    }

    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.tile.is_some()
    }

    /// Samples stored together in one tile or strip.
    pub fn samples_per_plane(&self) -> u16 {
        match self.image.planar {
            PlanarConfiguration::Contiguous => self.image.samples_per_pixel,
            PlanarConfiguration::Separate => 1,
        }
    }

    fn row_bytes(&self, pixels: u32) -> usize {
        let bits = pixels as u64 * self.image.bits_per_sample as u64 * self.samples_per_plane() as u64;
        bits.div_ceil(8) as usize
    }

    /// Bytes in one full tile, `None` for stripped directories.
    pub fn tile_byte_size(&self) -> Option<usize> {
        self.tile
            .map(|t| self.row_bytes(t.tile_width) * t.tile_height as usize)
    }

    /// Bytes in one image row.
    pub fn scanline_byte_size(&self) -> usize {
        self.row_bytes(self.image.width)
    }

    /// Tile grid of a tiled directory.
    pub fn grid(&self) -> Option<TileGrid> {
        let tile = self.tile?;
        TileGrid::new(
            self.image.width,
            self.image.height,
            tile.tile_width,
            tile.tile_height,
        )
        .ok()
    }

    /// Tiles per plane, or 0 for stripped directories.
    pub fn tile_count(&self) -> usize {
        self.grid().map(|g| g.tile_count()).unwrap_or(0)
    }

    pub fn strip_count(&self) -> usize {
        self.image.height.div_ceil(self.rows_per_strip) as usize
    }

    /// Index of the tile whose origin is `(x, y)`.
    pub fn tile_index(&self, x: u32, y: u32) -> Result<usize, ContainerError> {
        let grid = self
            .grid()
            .ok_or_else(|| ContainerError::Layout("directory is not tiled".to_string()))?;
        grid.tile_index(TileCoord { x, y })
            .ok_or(ContainerError::TileOutOfRange { x, y })
    }
}

// =============================================================================
// Tests
// =============================================================================
