//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary for TIFF reading and writing:
//! - Field types that determine how values are encoded
//! - Tag IDs that identify metadata fields
//! - [`TagSet`], the per-directory map of tag values
//!
//! The definitions support both classic TIFF and BigTIFF formats.

use std::collections::BTreeMap;

use serde::Serialize;

use super::values::TagValue;

// =============================================================================
// Field Types
// =============================================================================

/// Encoding of the values in one IFD entry.
///
/// Only the types that appear in uncompressed channel directories are
/// modeled. Entries with signed or floating point types are skipped on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    /// Numerator and denominator, both Long
    Rational = 5,
    Undefined = 7,
    /// BigTIFF only
    Long8 = 16,
}

impl FieldType {
    const ALL: [FieldType; 7] = [
        FieldType::Byte,
        FieldType::Ascii,
        FieldType::Short,
        FieldType::Long,
        FieldType::Rational,
        FieldType::Undefined,
        FieldType::Long8,
    ];

    /// Bytes per element.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u16 == value)
    }

    /// Whether `count` elements fit in the value slot of an entry (4 bytes
    /// in classic TIFF, 8 in BigTIFF).
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let slot: u64 = if is_bigtiff { 8 } else { 4 };
        count.saturating_mul(self.size_in_bytes() as u64) <= slot
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs known to the reader, writer and tag-copy table.
///
/// Tags not listed here are still carried through [`TagSet`] by their raw
/// id, they just have no name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    SubfileType = 254,
    OSubfileType = 255,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    Threshholding = 263,
    CellWidth = 264,
    CellLength = 265,
    FillOrder = 266,
    Orientation = 274,
    SamplesPerPixel = 277,
    MinSampleValue = 280,
    MaxSampleValue = 281,
    PlanarConfiguration = 284,
    GrayResponseUnit = 290,
    SampleFormat = 339,

    // -------------------------------------------------------------------------
    // Descriptive
    // -------------------------------------------------------------------------
    DocumentName = 269,
    ImageDescription = 270,
    Make = 271,
    Model = 272,
    PageName = 285,
    PageNumber = 297,
    Software = 305,
    DateTime = 306,
    Artist = 315,
    HostComputer = 316,
    Copyright = 33432,

    // -------------------------------------------------------------------------
    // Strip Organization
    // -------------------------------------------------------------------------
    StripOffsets = 273,
    RowsPerStrip = 278,
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------
    XResolution = 282,
    YResolution = 283,
    ResolutionUnit = 296,
}

impl TiffTag {
    /// Every tag in this vocabulary, in ascending id order.
    pub const ALL: [TiffTag; 39] = [
        TiffTag::SubfileType,
        TiffTag::OSubfileType,
        TiffTag::ImageWidth,
        TiffTag::ImageLength,
        TiffTag::BitsPerSample,
        TiffTag::Compression,
        TiffTag::PhotometricInterpretation,
        TiffTag::Threshholding,
        TiffTag::CellWidth,
        TiffTag::CellLength,
        TiffTag::FillOrder,
        TiffTag::DocumentName,
        TiffTag::ImageDescription,
        TiffTag::Make,
        TiffTag::Model,
        TiffTag::StripOffsets,
        TiffTag::Orientation,
        TiffTag::SamplesPerPixel,
        TiffTag::RowsPerStrip,
        TiffTag::StripByteCounts,
        TiffTag::MinSampleValue,
        TiffTag::MaxSampleValue,
        TiffTag::XResolution,
        TiffTag::YResolution,
        TiffTag::PlanarConfiguration,
        TiffTag::PageName,
        TiffTag::GrayResponseUnit,
        TiffTag::ResolutionUnit,
        TiffTag::PageNumber,
        TiffTag::Software,
        TiffTag::DateTime,
        TiffTag::Artist,
        TiffTag::HostComputer,
        TiffTag::TileWidth,
        TiffTag::TileLength,
        TiffTag::TileOffsets,
        TiffTag::TileByteCounts,
        TiffTag::SampleFormat,
        TiffTag::Copyright,
    ];

    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for unrecognized tags.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(TiffTag::SubfileType),
            255 => Some(TiffTag::OSubfileType),
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            263 => Some(TiffTag::Threshholding),
            264 => Some(TiffTag::CellWidth),
            265 => Some(TiffTag::CellLength),
            266 => Some(TiffTag::FillOrder),
            269 => Some(TiffTag::DocumentName),
            270 => Some(TiffTag::ImageDescription),
            271 => Some(TiffTag::Make),
            272 => Some(TiffTag::Model),
            273 => Some(TiffTag::StripOffsets),
            274 => Some(TiffTag::Orientation),
            277 => Some(TiffTag::SamplesPerPixel),
            278 => Some(TiffTag::RowsPerStrip),
            279 => Some(TiffTag::StripByteCounts),
            280 => Some(TiffTag::MinSampleValue),
            281 => Some(TiffTag::MaxSampleValue),
            282 => Some(TiffTag::XResolution),
            283 => Some(TiffTag::YResolution),
            284 => Some(TiffTag::PlanarConfiguration),
            285 => Some(TiffTag::PageName),
            290 => Some(TiffTag::GrayResponseUnit),
            296 => Some(TiffTag::ResolutionUnit),
            297 => Some(TiffTag::PageNumber),
            305 => Some(TiffTag::Software),
            306 => Some(TiffTag::DateTime),
            315 => Some(TiffTag::Artist),
            316 => Some(TiffTag::HostComputer),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            339 => Some(TiffTag::SampleFormat),
            33432 => Some(TiffTag::Copyright),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Tag name as written in the TIFF 6.0 specification.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::SubfileType => "NewSubfileType",
            TiffTag::OSubfileType => "SubfileType",
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::Threshholding => "Threshholding",
            TiffTag::CellWidth => "CellWidth",
            TiffTag::CellLength => "CellLength",
            TiffTag::FillOrder => "FillOrder",
            TiffTag::DocumentName => "DocumentName",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::Make => "Make",
            TiffTag::Model => "Model",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::Orientation => "Orientation",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::RowsPerStrip => "RowsPerStrip",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::MinSampleValue => "MinSampleValue",
            TiffTag::MaxSampleValue => "MaxSampleValue",
            TiffTag::XResolution => "XResolution",
            TiffTag::YResolution => "YResolution",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::PageName => "PageName",
            TiffTag::GrayResponseUnit => "GrayResponseUnit",
            TiffTag::ResolutionUnit => "ResolutionUnit",
            TiffTag::PageNumber => "PageNumber",
            TiffTag::Software => "Software",
            TiffTag::DateTime => "DateTime",
            TiffTag::Artist => "Artist",
            TiffTag::HostComputer => "HostComputer",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::SampleFormat => "SampleFormat",
            TiffTag::Copyright => "Copyright",
        }
    }

    /// Tags that describe where image data lives in a file.
    ///
    /// These are owned by the container that writes the data and are never
    /// copied from one file to another.
    pub const fn is_data_location(self) -> bool {
        matches!(
            self,
            TiffTag::StripOffsets
                | TiffTag::StripByteCounts
                | TiffTag::TileOffsets
                | TiffTag::TileByteCounts
        )
    }
}

// =============================================================================
// Enumerated Values
// =============================================================================

/// Compression schemes, named so that rejections are readable.
///
/// Only [`Compression::None`] is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    None = 1,
    Lzw = 5,
    Jpeg = 7,
    Deflate = 8,
    PackBits = 32773,
    Jpeg2000 = 33003,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => Compression::None,
            5 => Compression::Lzw,
            6 | 7 => Compression::Jpeg,
            8 | 32946 => Compression::Deflate,
            32773 => Compression::PackBits,
            33003 | 33005 => Compression::Jpeg2000,
            _ => return None,
        })
    }

    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(self, Compression::None)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Lzw => "LZW",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::PackBits => "PackBits",
            Compression::Jpeg2000 => "JPEG 2000",
        }
    }
}

/// Photometric interpretation values used by channel images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Photometric {
    MinIsWhite = 0,
    MinIsBlack = 1,
    Rgb = 2,
    Palette = 3,
}

impl Photometric {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Photometric::MinIsWhite),
            1 => Some(Photometric::MinIsBlack),
            2 => Some(Photometric::Rgb),
            3 => Some(Photometric::Palette),
            _ => None,
        }
    }
}

/// How components of a pixel are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum PlanarConfiguration {
    /// Components interleaved per pixel ("chunky")
    #[default]
    Contiguous = 1,

    /// One plane per component
    Separate = 2,
}

impl PlanarConfiguration {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(PlanarConfiguration::Contiguous),
            2 => Some(PlanarConfiguration::Separate),
            _ => None,
        }
    }
}

// =============================================================================
// TagSet
// =============================================================================

/// The tags of one directory, keyed by raw tag id.
///
/// Iteration is in ascending tag order, which is the order IFD entries must
/// be written in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    values: BTreeMap<u16, TagValue>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a known tag.
    pub fn get(&self, tag: TiffTag) -> Option<&TagValue> {
        self.values.get(&tag.as_u16())
    }

    /// Get the value of a tag by raw id.
    pub fn get_raw(&self, tag_id: u16) -> Option<&TagValue> {
        self.values.get(&tag_id)
    }

    /// Set a tag, replacing any previous value.
    pub fn insert(&mut self, tag: TiffTag, value: TagValue) {
        self.values.insert(tag.as_u16(), value);
    }

    /// Set a tag by raw id.
    pub fn insert_raw(&mut self, tag_id: u16, value: TagValue) {
        self.values.insert(tag_id, value);
    }

    pub fn remove(&mut self, tag: TiffTag) -> Option<TagValue> {
        self.values.remove(&tag.as_u16())
    }

    pub fn contains(&self, tag: TiffTag) -> bool {
        self.values.contains_key(&tag.as_u16())
    }

    /// First element of a numeric tag as u32.
    pub fn u32(&self, tag: TiffTag) -> Option<u32> {
        self.get(tag)?.first_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// First element of a numeric tag as u16.
    pub fn u16(&self, tag: TiffTag) -> Option<u16> {
        self.get(tag)?.first_u64().and_then(|v| u16::try_from(v).ok())
    }

    /// All elements of a numeric tag widened to u64.
    pub fn u64_array(&self, tag: TiffTag) -> Option<Vec<u64>> {
        self.get(tag)?.as_u64_vec()
    }

    /// Value of an ASCII tag.
    pub fn ascii(&self, tag: TiffTag) -> Option<&str> {
        match self.get(tag)? {
            TagValue::Ascii(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(tag id, value)` pairs in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.values.iter().map(|(id, value)| (*id, value))
    }
}

// =============================================================================
// Tests
// =============================================================================
