//! TIFF header and IFD structure parsing.
//!
//! This module parses the fixed-layout parts of a TIFF file: the header
//! and the Image File Directories (IFDs) chained from it. Tag payloads are
//! decoded separately by [`super::values`].
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```
//!
//! # IFD Structure
//! ```text
//! entry count          (2 bytes TIFF, 8 bytes BigTIFF)
//! entries[count]       (12 bytes TIFF, 20 bytes BigTIFF)
//!   tag id             2
//!   field type         2
//!   count              4 | 8
//!   value or offset    4 | 8
//! next IFD offset      (4 bytes TIFF, 8 bytes BigTIFF; 0 ends the chain)
//! ```

use crate::error::TiffError;

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

const MAGIC_II: [u8; 2] = *b"II";
const MAGIC_MM: [u8; 2] = *b"MM";
const VERSION_CLASSIC: u16 = 42;
const VERSION_BIG: u16 = 43;

pub const TIFF_HEADER_SIZE: usize = 8;
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

/// Integer decoding in the file's byte order.
///
/// Callers slice exactly enough bytes; a short slice panics.
impl ByteOrder {
    fn array<const N: usize>(self, bytes: &[u8]) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes[..N]);
        if self == ByteOrder::BigEndian {
            out.reverse();
        }
        out
    }

    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        u16::from_le_bytes(self.array(bytes))
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        u32::from_le_bytes(self.array(bytes))
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        u64::from_le_bytes(self.array(bytes))
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// What the first bytes of a file say about the rest of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// 64-bit offsets and counts
    pub is_bigtiff: bool,

    /// 0 when the file holds no directories
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Decode the header at the start of `bytes`.
    ///
    /// A first IFD offset of 0 is accepted and means the file has no
    /// directories; any other offset must point inside the file.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        let too_small = |required: usize| TiffError::FileTooSmall {
            required: required as u64,
            actual: bytes.len() as u64,
        };
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(too_small(TIFF_HEADER_SIZE));
        }

        let byte_order = match [bytes[0], bytes[1]] {
            MAGIC_II => ByteOrder::LittleEndian,
            MAGIC_MM => ByteOrder::BigEndian,
            other => return Err(TiffError::InvalidMagic(u16::from_le_bytes(other))),
        };

        let first_ifd_offset;
        let is_bigtiff;
        match byte_order.read_u16(&bytes[2..]) {
            VERSION_CLASSIC => {
                is_bigtiff = false;
                first_ifd_offset = byte_order.read_u32(&bytes[4..]) as u64;
            }
            VERSION_BIG => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(too_small(BIGTIFF_HEADER_SIZE));
                }
                let offset_size = byte_order.read_u16(&bytes[4..]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                is_bigtiff = true;
                first_ifd_offset = byte_order.read_u64(&bytes[8..]);
            }
            version => return Err(TiffError::InvalidVersion(version)),
        }

        if first_ifd_offset != 0 && first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Little-endian header bytes with a zero first-IFD offset.
    ///
    /// The writer patches the offset once the first directory is placed.
    pub fn encode_le(is_bigtiff: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(BIGTIFF_HEADER_SIZE);
        out.extend_from_slice(&MAGIC_II);
        if is_bigtiff {
            out.extend_from_slice(&VERSION_BIG.to_le_bytes());
            out.extend_from_slice(&8u16.to_le_bytes());
            out.extend_from_slice(&[0u8; 10]);
        } else {
            out.extend_from_slice(&VERSION_CLASSIC.to_le_bytes());
            out.extend_from_slice(&[0u8; 4]);
        }
        out
    }

    /// Width of offsets, counts and entry value slots: 4 or 8 bytes.
    #[inline]
    const fn word(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    #[inline]
    pub const fn header_size(&self) -> usize {
        2 * self.word()
    }

    /// Where the first-IFD pointer sits in the header.
    #[inline]
    pub const fn first_ifd_pointer_position(&self) -> u64 {
        self.word() as u64
    }

    /// Tag, type, count and value slot.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        4 + 2 * self.word()
    }

    /// The entry count is a Short in classic TIFF and a Long8 in BigTIFF.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        self.word()
    }

    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        self.word()
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One raw entry of an IFD.
///
/// The value/offset field is kept as raw bytes so it can be interpreted
/// either as an inline value or as a file offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,

    /// Field type, `None` when the type code is not one we decode
    pub field_type: Option<FieldType>,

    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw value/offset field (4 or 8 bytes)
    pub value_offset_bytes: Vec<u8>,

    /// Whether the value is stored in `value_offset_bytes`
    pub is_inline: bool,
}

impl IfdEntry {
    /// Total size of the value in bytes, if the field type is known.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| ft.size_in_bytes() as u64)
            .and_then(|size| size.checked_mul(self.count))
    }

    /// Interpret the value/offset field as a file offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Inline single Short/Long value.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// Entries in file order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD, 0 if this is the last one
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Bytes occupied by an IFD with `entry_count` entries.
    ///
    /// Saturates at `u64::MAX` for counts no file can hold, so size checks
    /// against the file reject them.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> u64 {
        entry_count
            .saturating_mul(header.ifd_entry_size() as u64)
            .saturating_add(header.ifd_count_size() as u64)
            .saturating_add(header.ifd_next_offset_size() as u64)
    }

    /// Largest entry count an IFD starting at `offset` can have in a file of
    /// `file_size` bytes.
    pub fn max_entry_count(offset: u64, file_size: u64, header: &TiffHeader) -> u64 {
        let fixed = (header.ifd_count_size() + header.ifd_next_offset_size()) as u64;
        file_size
            .saturating_sub(offset)
            .saturating_sub(fixed)
            / header.ifd_entry_size() as u64
    }

    /// Read the entry count from the start of an IFD.
    pub fn parse_entry_count(bytes: &[u8], header: &TiffHeader) -> Result<u64, TiffError> {
        let needed = header.ifd_count_size();
        if bytes.len() < needed {
            return Err(TiffError::FileTooSmall {
                required: needed as u64,
                actual: bytes.len() as u64,
            });
        }
        Ok(if header.is_bigtiff {
            header.byte_order.read_u64(bytes)
        } else {
            header.byte_order.read_u16(bytes) as u64
        })
    }

    /// Parse an IFD from bytes starting at the entry count.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let byte_order = header.byte_order;
        let count = Self::parse_entry_count(bytes, header)?;
        let total = Self::calculate_size(count, header);
        if (bytes.len() as u64) < total {
            return Err(TiffError::FileTooSmall {
                required: total,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let value_size = header.value_offset_size();
        let mut entries = Vec::with_capacity(count as usize);

        for i in 0..count as usize {
            let start = header.ifd_count_size() + i * entry_size;
            let raw = &bytes[start..start + entry_size];

            let tag_id = byte_order.read_u16(&raw[0..2]);
            let field_type_raw = byte_order.read_u16(&raw[2..4]);
            let field_type = FieldType::from_u16(field_type_raw);
            let (entry_count, value_bytes) = if header.is_bigtiff {
                (byte_order.read_u64(&raw[4..12]), &raw[12..20])
            } else {
                (byte_order.read_u32(&raw[4..8]) as u64, &raw[8..12])
            };

            let is_inline = field_type
                .map(|ft| ft.fits_inline(entry_count, header.is_bigtiff))
                .unwrap_or(false);

            entries.push(IfdEntry {
                tag_id,
                field_type,
                field_type_raw,
                count: entry_count,
                value_offset_bytes: value_bytes[..value_size].to_vec(),
                is_inline,
            });
        }

        let next_start = (total as usize) - header.ifd_next_offset_size();
        let next_ifd_offset = if header.is_bigtiff {
            byte_order.read_u64(&bytes[next_start..])
        } else {
            byte_order.read_u32(&bytes[next_start..]) as u64
        };

        Ok(Ifd {
            entries,
            next_ifd_offset,
        })
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag_id == tag.as_u16())
    }
}

// =============================================================================
// Tests
// =============================================================================
