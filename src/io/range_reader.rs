use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a resource.
///
/// This abstraction lets the TIFF reader pull only the IFDs and the tiles it
/// needs, so an image is never loaded as a whole. Implementations must be
/// thread-safe.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get a unique identifier for this resource (for logging).
    ///
    /// For local files this is the path as given.
    fn identifier(&self) -> &str;
}

// =============================================================================
// In-memory Reader
// =============================================================================

/// A `RangeReader` over bytes already in memory.
///
/// Used for images produced by [`crate::format::tiff::TiffWriter`] into a
/// buffer, and for tests.
#[derive(Debug, Clone)]
pub struct BytesReader {
    data: Bytes,
    identifier: String,
}

impl BytesReader {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl RangeReader for BytesReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.data.len() as u64;
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= size => Ok(self.data.slice(offset as usize..end as usize)),
            _ => Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            }),
        }
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
