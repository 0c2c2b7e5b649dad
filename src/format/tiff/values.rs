//! TIFF tag values.
//!
//! [`TagValue`] is the owned, typed form of an IFD entry's payload. The
//! reader decodes entries into it (honoring the file byte order) and the
//! writer encodes it back out as little-endian bytes.
//!
//! Values can be stored either inline in the IFD entry (for small values)
//! or at an offset in the file (for larger values like arrays). Out-of-line
//! values are fetched with one range request per entry.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// TagValue
// =============================================================================

/// Decoded payload of a single tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Byte(Vec<u8>),
    /// ASCII text without the trailing NUL
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    /// `(numerator, denominator)` pairs
    Rational(Vec<(u32, u32)>),
    Undefined(Vec<u8>),
    Long8(Vec<u64>),
}

impl TagValue {
    /// Field type this value is written as.
    pub fn field_type(&self) -> FieldType {
        match self {
            TagValue::Byte(_) => FieldType::Byte,
            TagValue::Ascii(_) => FieldType::Ascii,
            TagValue::Short(_) => FieldType::Short,
            TagValue::Long(_) => FieldType::Long,
            TagValue::Rational(_) => FieldType::Rational,
            TagValue::Undefined(_) => FieldType::Undefined,
            TagValue::Long8(_) => FieldType::Long8,
        }
    }

    /// Element count as stored in the IFD entry.
    ///
    /// ASCII counts include the NUL terminator.
    pub fn count(&self) -> u64 {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => v.len() as u64,
            TagValue::Ascii(s) => s.len() as u64 + 1,
            TagValue::Short(v) => v.len() as u64,
            TagValue::Long(v) => v.len() as u64,
            TagValue::Rational(v) => v.len() as u64,
            TagValue::Long8(v) => v.len() as u64,
        }
    }

    /// Encoded payload size in bytes.
    pub fn byte_size(&self) -> u64 {
        self.count() * self.field_type().size_in_bytes() as u64
    }

    /// First numeric element widened to u64.
    pub fn first_u64(&self) -> Option<u64> {
        match self {
            TagValue::Byte(v) => v.first().map(|&x| x as u64),
            TagValue::Short(v) => v.first().map(|&x| x as u64),
            TagValue::Long(v) => v.first().map(|&x| x as u64),
            TagValue::Long8(v) => v.first().copied(),
            _ => None,
        }
    }

    /// All numeric elements widened to u64.
    ///
    /// Returns `None` for text, rational and opaque values.
    pub fn as_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Byte(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Short(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long8(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Append the little-endian encoding of this value to `out`.
    pub fn encode_le(&self, out: &mut Vec<u8>) {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => out.extend_from_slice(v),
            TagValue::Ascii(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            TagValue::Short(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TagValue::Long(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TagValue::Rational(v) => v.iter().for_each(|(n, d)| {
                out.extend_from_slice(&n.to_le_bytes());
                out.extend_from_slice(&d.to_le_bytes());
            }),
            TagValue::Long8(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        }
    }
}

/// Decode `count` values of `field_type` from raw entry bytes.
///
/// Trailing elements that do not fit in `bytes` are dropped.
pub fn decode_value(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> TagValue {
    let size = field_type.size_in_bytes();
    let available = count.min(bytes.len() / size);
    let chunks = bytes[..available * size].chunks_exact(size);

    match field_type {
        FieldType::Byte => TagValue::Byte(bytes[..available].to_vec()),
        FieldType::Undefined => TagValue::Undefined(bytes[..available].to_vec()),
        FieldType::Ascii => {
            let raw = &bytes[..available];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            TagValue::Ascii(String::from_utf8_lossy(&raw[..end]).into_owned())
        }
        FieldType::Short => TagValue::Short(chunks.map(|c| byte_order.read_u16(c)).collect()),
        FieldType::Long => TagValue::Long(chunks.map(|c| byte_order.read_u32(c)).collect()),
        FieldType::Rational => TagValue::Rational(
            chunks
                .map(|c| (byte_order.read_u32(&c[..4]), byte_order.read_u32(&c[4..])))
                .collect(),
        ),
        FieldType::Long8 => TagValue::Long8(chunks.map(|c| byte_order.read_u64(c)).collect()),
    }
}

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file.
///
/// This struct combines a RangeReader with TIFF header information to
/// read values respecting the file's byte order and format.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, fetches the bytes from the file.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ))
        } else {
            let offset = entry.value_offset(self.header.byte_order);
            let bytes = self.reader.read_exact_at(offset, size as usize).await?;
            Ok(bytes)
        }
    }

    /// Read and decode the full value of an entry.
    pub async fn read_value(&self, entry: &IfdEntry) -> Result<TagValue, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count == 0 {
            return Ok(decode_value(&[], 0, field_type, self.header.byte_order));
        }

        let bytes = self.read_bytes(entry).await?;
        Ok(decode_value(
            &bytes,
            entry.count as usize,
            field_type,
            self.header.byte_order,
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
