use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::RangeReader;
use crate::error::IoError;

/// Local-file implementation of RangeReader.
///
/// The file size is read once on open. A single file handle is shared
/// between reads, so seek + read happen under a lock.
pub struct LocalFileReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open the file at `path` for range reads.
    ///
    /// Returns `IoError::NotFound` if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(path.display().to_string()),
            _ => IoError::File(format!("{}: {}", path.display(), e)),
        })?;
        let size = file.metadata().await?.len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier: path.display().to_string(),
        })
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        // Validate range bounds
        if offset.saturating_add(len as u64) > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = BytesMut::zeroed(len);
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(&mut buf).await?;

        Ok(buf.freeze())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
