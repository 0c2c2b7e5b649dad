//! TIFF reading and writing primitives.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. Both are read; the writer emits either.
//!
//! - **Directory (IFD)**: One image plane with its own tags and pixel data.
//!   Multi-channel microscopy images store one channel per directory.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod parser;
mod tags;
mod validation;
mod values;
mod writer;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use tags::{Compression, FieldType, Photometric, PlanarConfiguration, TagSet, TiffTag};
pub use validation::{is_tiled, validate_directory, ValidationError, ValidationResult};
pub use values::{decode_value, TagValue, ValueReader};
pub use writer::{DataOrganization, TiffWriter};
