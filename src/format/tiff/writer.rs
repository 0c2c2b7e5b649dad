//! Streaming TIFF writer.
//!
//! Pixel data is appended to the output as it arrives; the IFD for a
//! directory is emitted only when the directory is finalized, at which
//! point the data location tags are known. Each new IFD is linked into the
//! chain by patching the previous next-IFD pointer (or the header pointer
//! for the first directory).
//!
//! ```text
//! header | chunk chunk ... | ext values | IFD 0 | chunk chunk ... | IFD 1 | ...
//!    |                                     ^  |                      ^
//!    +-------------------------------------+  +----------------------+
//! ```
//!
//! Output is always little-endian and uncompressed. Classic TIFF is the
//! default; BigTIFF lifts the 4 GiB offset limit.

use std::io::SeekFrom;

use tokio::io::{AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{IoError, TiffError};

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::tags::{Compression, TagSet, TiffTag};
use super::values::TagValue;

/// How the pixel data of a directory is chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrganization {
    Tiles,
    Strips,
}

/// Appending TIFF writer over any seekable async output.
pub struct TiffWriter<W> {
    inner: W,
    header: TiffHeader,
    /// Current end of the output; the cursor rests here between calls
    end: u64,
    /// Position of the pointer the next IFD offset is written to
    next_pointer_pos: u64,
    tags: TagSet,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    directories: usize,
}

impl<W> TiffWriter<W>
where
    W: AsyncWrite + AsyncSeek + Unpin + Send,
{
    /// Write the file header and return a writer positioned after it.
    pub async fn new(mut inner: W, is_bigtiff: bool) -> Result<Self, TiffError> {
        let header_bytes = TiffHeader::encode_le(is_bigtiff);
        inner.seek(SeekFrom::Start(0)).await.map_err(IoError::from)?;
        inner.write_all(&header_bytes).await.map_err(IoError::from)?;

        let header = TiffHeader {
            byte_order: super::parser::ByteOrder::LittleEndian,
            is_bigtiff,
            first_ifd_offset: 0,
        };
        let end = if is_bigtiff {
            BIGTIFF_HEADER_SIZE
        } else {
            TIFF_HEADER_SIZE
        } as u64;

        Ok(Self {
            inner,
            next_pointer_pos: header.first_ifd_pointer_position(),
            header,
            end,
            tags: TagSet::new(),
            offsets: Vec::new(),
            byte_counts: Vec::new(),
            directories: 0,
        })
    }

    pub fn is_bigtiff(&self) -> bool {
        self.header.is_bigtiff
    }

    /// Directories finalized so far.
    pub fn directories_written(&self) -> usize {
        self.directories
    }

    /// Tags staged for the directory being built.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Whether anything has been staged for the current directory.
    pub fn has_pending(&self) -> bool {
        !self.tags.is_empty() || !self.offsets.is_empty()
    }

    /// Stage a tag for the current directory.
    ///
    /// Data location tags are owned by the writer and ignored here.
    /// Compression other than none is rejected.
    pub fn set_tag(&mut self, tag: TiffTag, value: TagValue) -> Result<(), TiffError> {
        self.set_tag_raw(tag.as_u16(), value)
    }

    pub fn set_tag_raw(&mut self, tag_id: u16, value: TagValue) -> Result<(), TiffError> {
        match TiffTag::from_u16(tag_id) {
            Some(tag) if tag.is_data_location() => return Ok(()),
            Some(TiffTag::Compression) => {
                let code = value.first_u64().unwrap_or(0);
                let supported = u16::try_from(code)
                    .ok()
                    .and_then(Compression::from_u16)
                    .map(|c| c.is_supported())
                    .unwrap_or(false);
                if !supported {
                    return Err(TiffError::UnsupportedCompression(format!(
                        "cannot write compression {}",
                        code
                    )));
                }
            }
            _ => {}
        }
        self.tags.insert_raw(tag_id, value);
        Ok(())
    }

    /// Append one tile or strip of the current directory.
    ///
    /// Rewriting an index replaces the recorded location; the earlier bytes
    /// stay in the file unreferenced.
    pub async fn write_chunk(&mut self, index: usize, data: &[u8]) -> Result<(), TiffError> {
        let offset = self.end;
        self.check_offset(offset + data.len() as u64)?;
        self.inner.write_all(data).await.map_err(IoError::from)?;
        self.end += data.len() as u64;

        if self.offsets.len() <= index {
            self.offsets.resize(index + 1, 0);
            self.byte_counts.resize(index + 1, 0);
        }
        self.offsets[index] = offset;
        self.byte_counts[index] = data.len() as u64;
        Ok(())
    }

    /// Emit the IFD for the current directory and link it into the chain.
    ///
    /// `chunk_count` is the number of tiles or strips the directory has;
    /// chunks never written are recorded with zero offset and length.
    pub async fn finalize_directory(
        &mut self,
        organization: DataOrganization,
        chunk_count: usize,
    ) -> Result<u64, TiffError> {
        let mut offsets = std::mem::take(&mut self.offsets);
        let mut byte_counts = std::mem::take(&mut self.byte_counts);
        offsets.resize(chunk_count, 0);
        byte_counts.resize(chunk_count, 0);

        let (offsets_tag, counts_tag) = match organization {
            DataOrganization::Tiles => (TiffTag::TileOffsets, TiffTag::TileByteCounts),
            DataOrganization::Strips => (TiffTag::StripOffsets, TiffTag::StripByteCounts),
        };
        let mut tags = std::mem::take(&mut self.tags);
        tags.insert(offsets_tag, self.offset_value(offsets)?);
        tags.insert(counts_tag, self.offset_value(byte_counts)?);

        let entries = tags
            .iter()
            .map(|(id, value)| Ok((id, self.narrow(value.clone())?)))
            .collect::<Result<Vec<_>, TiffError>>()?;

        // Out-of-line values go ahead of the IFD
        let inline_size = self.header.value_offset_size() as u64;
        let mut value_fields = Vec::with_capacity(entries.len());
        for (_, value) in &entries {
            if value.byte_size() > inline_size {
                self.align().await?;
                let position = self.end;
                let mut encoded = Vec::with_capacity(value.byte_size() as usize);
                value.encode_le(&mut encoded);
                self.check_offset(position + encoded.len() as u64)?;
                self.inner.write_all(&encoded).await.map_err(IoError::from)?;
                self.end += encoded.len() as u64;
                value_fields.push(self.pointer_bytes(position));
            } else {
                let mut encoded = Vec::with_capacity(inline_size as usize);
                value.encode_le(&mut encoded);
                encoded.resize(inline_size as usize, 0);
                value_fields.push(encoded);
            }
        }

        self.align().await?;
        let ifd_pos = self.end;
        let ifd_bytes = self.encode_ifd(&entries, &value_fields);
        self.check_offset(ifd_pos + ifd_bytes.len() as u64)?;
        self.inner.write_all(&ifd_bytes).await.map_err(IoError::from)?;
        self.end += ifd_bytes.len() as u64;

        self.patch_pointer(self.next_pointer_pos, ifd_pos).await?;
        self.next_pointer_pos = ifd_pos + Ifd::calculate_size(entries.len() as u64, &self.header)
            - self.header.ifd_next_offset_size() as u64;

        debug!(
            directory = self.directories,
            ifd_offset = ifd_pos,
            entries = entries.len(),
            chunks = chunk_count,
            "Wrote directory"
        );
        self.directories += 1;
        Ok(ifd_pos)
    }

    /// Flush the output and hand it back.
    pub async fn finish(mut self) -> Result<W, TiffError> {
        self.inner.flush().await.map_err(IoError::from)?;
        Ok(self.inner)
    }

    // -------------------------------------------------------------------------
    // Encoding helpers
    // -------------------------------------------------------------------------

    fn encode_ifd(&self, entries: &[(u16, TagValue)], value_fields: &[Vec<u8>]) -> Vec<u8> {
        let size = Ifd::calculate_size(entries.len() as u64, &self.header) as usize;
        let mut out = Vec::with_capacity(size);

        if self.header.is_bigtiff {
            out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        } else {
            out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        }
        for ((tag_id, value), field) in entries.iter().zip(value_fields) {
            out.extend_from_slice(&tag_id.to_le_bytes());
            out.extend_from_slice(&(value.field_type() as u16).to_le_bytes());
            if self.header.is_bigtiff {
                out.extend_from_slice(&value.count().to_le_bytes());
            } else {
                out.extend_from_slice(&(value.count() as u32).to_le_bytes());
            }
            out.extend_from_slice(field);
        }
        out.extend_from_slice(&self.pointer_bytes(0));
        out
    }

    fn pointer_bytes(&self, value: u64) -> Vec<u8> {
        if self.header.is_bigtiff {
            value.to_le_bytes().to_vec()
        } else {
            (value as u32).to_le_bytes().to_vec()
        }
    }

    /// Offset arrays use LONG in classic files and LONG8 in BigTIFF.
    fn offset_value(&self, values: Vec<u64>) -> Result<TagValue, TiffError> {
        if self.header.is_bigtiff {
            Ok(TagValue::Long8(values))
        } else {
            self.narrow(TagValue::Long8(values))
        }
    }

    /// LONG8 is not a classic TIFF type; narrow it to LONG.
    fn narrow(&self, value: TagValue) -> Result<TagValue, TiffError> {
        match value {
            TagValue::Long8(values) if !self.header.is_bigtiff => values
                .into_iter()
                .map(|v| u32::try_from(v).map_err(|_| TiffError::OffsetOverflow(v)))
                .collect::<Result<Vec<_>, _>>()
                .map(TagValue::Long),
            other => Ok(other),
        }
    }

    fn check_offset(&self, offset: u64) -> Result<(), TiffError> {
        if !self.header.is_bigtiff && offset > u32::MAX as u64 {
            return Err(TiffError::OffsetOverflow(offset));
        }
        Ok(())
    }

    async fn align(&mut self) -> Result<(), TiffError> {
        if self.end % 2 == 1 {
            self.inner.write_all(&[0]).await.map_err(IoError::from)?;
            self.end += 1;
        }
        Ok(())
    }

    async fn patch_pointer(&mut self, position: u64, value: u64) -> Result<(), TiffError> {
        let bytes = self.pointer_bytes(value);
        self.inner
            .seek(SeekFrom::Start(position))
            .await
            .map_err(IoError::from)?;
        self.inner.write_all(&bytes).await.map_err(IoError::from)?;
        self.inner
            .seek(SeekFrom::Start(self.end))
            .await
            .map_err(IoError::from)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
