//! On-disk image formats.
//!
//! Only TIFF is supported: classic and BigTIFF, tiled or stripped,
//! uncompressed pixel data.

pub mod tiff;
