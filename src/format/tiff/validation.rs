//! Directory validation for streamed tile access.
//!
//! A directory can be streamed only when its pixel data is stored
//! uncompressed and the data location tags are complete and consistent.
//! Directories outside this subset are rejected when a file is opened,
//! with the index of the offending directory in the message.
//!
//! # Supported Subset
//!
//! - **Compression**: none
//! - **Organization**: tiles (TileWidth/TileLength/TileOffsets/TileByteCounts)
//!   or strips (StripOffsets/StripByteCounts, RowsPerStrip optional)
//! - **Dimensions**: non-zero image and tile sizes
//!
//! Tile sizes that are not multiples of 16 are legal to read but produce a
//! warning, since TIFF 6.0 requires the multiple for writers.

use crate::error::TiffError;

use super::tags::{Compression, TagSet, TiffTag};

// =============================================================================
// Validation Result
// =============================================================================

/// Result of validating one directory.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Validation errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// Non-fatal issues
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Convert to the first error, or `Ok(())` if valid.
    pub fn into_result(self) -> Result<(), TiffError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// A specific validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Pixel data is compressed
    UnsupportedCompression {
        directory: usize,
        compression: u16,
        compression_name: String,
    },

    /// ImageWidth or ImageLength absent or zero
    MissingDimensions { directory: usize },

    /// Neither a complete tile nor a complete strip tag set is present
    MissingDataTags {
        directory: usize,
        missing_tags: Vec<&'static str>,
    },

    /// Offsets and byte counts arrays differ in length
    MismatchedDataTags {
        directory: usize,
        offsets: usize,
        byte_counts: usize,
    },

    /// Tile width or length is zero
    InvalidTileDimensions {
        directory: usize,
        tile_width: u32,
        tile_height: u32,
    },
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::UnsupportedCompression {
                directory,
                compression_name,
                ..
            } => TiffError::UnsupportedCompression(format!(
                "{} in directory {}",
                compression_name, directory
            )),
            ValidationError::MissingDimensions { .. } => TiffError::MissingTag("ImageWidth/ImageLength"),
            ValidationError::MissingDataTags { missing_tags, .. } => {
                TiffError::MissingTag(missing_tags.first().copied().unwrap_or("TileOffsets"))
            }
            ValidationError::MismatchedDataTags {
                directory,
                offsets,
                byte_counts,
            } => TiffError::InvalidTagValue {
                tag: "Offsets/ByteCounts",
                message: format!(
                    "directory {} has {} offsets but {} byte counts",
                    directory, offsets, byte_counts
                ),
            },
            ValidationError::InvalidTileDimensions {
                directory,
                tile_width,
                tile_height,
            } => TiffError::InvalidTagValue {
                tag: "TileWidth/TileLength",
                message: format!(
                    "directory {} has tile size {}x{}",
                    directory, tile_width, tile_height
                ),
            },
        }
    }
}

// =============================================================================
// Validation Functions
// =============================================================================

/// Validate the tags of one directory for streamed access.
pub fn validate_directory(tags: &TagSet, directory: usize) -> ValidationResult {
    let mut result = ValidationResult::default();

    // Missing Compression means uncompressed per TIFF 6.0
    let compression = tags.u16(TiffTag::Compression).unwrap_or(1);
    let supported = Compression::from_u16(compression)
        .map(|c| c.is_supported())
        .unwrap_or(false);
    if !supported {
        let compression_name = Compression::from_u16(compression)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| format!("Unknown ({})", compression));
        result.add_error(ValidationError::UnsupportedCompression {
            directory,
            compression,
            compression_name,
        });
    }

    let width = tags.u32(TiffTag::ImageWidth).unwrap_or(0);
    let height = tags.u32(TiffTag::ImageLength).unwrap_or(0);
    if width == 0 || height == 0 {
        result.add_error(ValidationError::MissingDimensions { directory });
    }

    if is_tiled(tags) {
        check_tile_tags(tags, directory, &mut result);
    } else {
        check_strip_tags(tags, directory, &mut result);
    }

    result
}

/// Whether a directory declares tile organization.
pub fn is_tiled(tags: &TagSet) -> bool {
    tags.contains(TiffTag::TileWidth) || tags.contains(TiffTag::TileOffsets)
}

fn check_tile_tags(tags: &TagSet, directory: usize, result: &mut ValidationResult) {
    let missing: Vec<&'static str> = [
        TiffTag::TileWidth,
        TiffTag::TileLength,
        TiffTag::TileOffsets,
        TiffTag::TileByteCounts,
    ]
    .into_iter()
    .filter(|tag| !tags.contains(*tag))
    .map(|tag| tag.name())
    .collect();

    if !missing.is_empty() {
        result.add_error(ValidationError::MissingDataTags {
            directory,
            missing_tags: missing,
        });
        return;
    }

    let tile_width = tags.u32(TiffTag::TileWidth).unwrap_or(0);
    let tile_height = tags.u32(TiffTag::TileLength).unwrap_or(0);
    if tile_width == 0 || tile_height == 0 {
        result.add_error(ValidationError::InvalidTileDimensions {
            directory,
            tile_width,
            tile_height,
        });
    } else if tile_width % 16 != 0 || tile_height % 16 != 0 {
        result.add_warning(format!(
            "directory {} tile size {}x{} is not a multiple of 16",
            directory, tile_width, tile_height
        ));
    }

    check_lengths(tags, directory, TiffTag::TileOffsets, TiffTag::TileByteCounts, result);
}

fn check_strip_tags(tags: &TagSet, directory: usize, result: &mut ValidationResult) {
    let missing: Vec<&'static str> = [TiffTag::StripOffsets, TiffTag::StripByteCounts]
        .into_iter()
        .filter(|tag| !tags.contains(*tag))
        .map(|tag| tag.name())
        .collect();

    if !missing.is_empty() {
        result.add_error(ValidationError::MissingDataTags {
            directory,
            missing_tags: missing,
        });
        return;
    }

    check_lengths(tags, directory, TiffTag::StripOffsets, TiffTag::StripByteCounts, result);
}

fn check_lengths(
    tags: &TagSet,
    directory: usize,
    offsets_tag: TiffTag,
    counts_tag: TiffTag,
    result: &mut ValidationResult,
) {
    let offsets = tags.u64_array(offsets_tag).map(|v| v.len()).unwrap_or(0);
    let byte_counts = tags.u64_array(counts_tag).map(|v| v.len()).unwrap_or(0);
    if offsets != byte_counts {
        result.add_error(ValidationError::MismatchedDataTags {
            directory,
            offsets,
            byte_counts,
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
