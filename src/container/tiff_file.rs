//! TIFF-backed containers.
//!
//! [`TiffReader`] serves tiles and rows of an existing file through any
//! [`RangeReader`]. All IFDs and tag values are read once at open; after
//! that each tile read is a single range request at the offset recorded in
//! the directory's TileOffsets table.
//!
//! [`TiffSink`] writes a new file through [`TiffWriter`], deriving the
//! chunk index of each tile or row from the staged geometry tags.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncSeek, AsyncWrite};
use tracing::{debug, warn};

use crate::error::{ContainerError, TiffError};
use crate::format::tiff::{
    validate_directory, ByteOrder, DataOrganization, Ifd, TagSet, TagValue, TiffHeader, TiffTag,
    TiffWriter, ValueReader, BIGTIFF_HEADER_SIZE,
};
use crate::io::{LocalFileReader, RangeReader};
use crate::tile::swap_sample_bytes;

use super::{DirectoryLayout, TileSink, TileSource};

/// Upper bound on IFDs followed before giving up on a chain.
const MAX_DIRECTORIES: usize = 65_536;

// =============================================================================
// TiffReader
// =============================================================================

struct TiffDirectory {
    tags: TagSet,
    layout: DirectoryLayout,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

/// Read-only container over a classic or BigTIFF file.
pub struct TiffReader<R> {
    reader: R,
    header: TiffHeader,
    directories: Vec<TiffDirectory>,
    current: usize,
}

impl TiffReader<LocalFileReader> {
    /// Open a TIFF file on the local filesystem.
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let reader = LocalFileReader::open(path).await?;
        Self::open(reader).await
    }
}

impl<R: RangeReader> TiffReader<R> {
    /// Parse the header and every directory of the file.
    ///
    /// Fails if any directory is compressed or lacks a complete set of
    /// tile or strip location tags.
    pub async fn open(reader: R) -> Result<Self, ContainerError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let mut directories = Vec::new();
        let mut visited = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 {
            if !visited.insert(offset) || directories.len() >= MAX_DIRECTORIES {
                warn!(
                    identifier = reader.identifier(),
                    offset, "IFD chain loops or is too long, stopping"
                );
                break;
            }

            let ifd = read_ifd(&reader, &header, offset).await?;
            let index = directories.len();
            let directory = load_directory(&reader, &header, &ifd, index).await?;
            directories.push(directory);
            offset = ifd.next_ifd_offset;
        }

        debug!(
            identifier = reader.identifier(),
            directories = directories.len(),
            bigtiff = header.is_bigtiff,
            "Opened TIFF"
        );

        Ok(Self {
            reader,
            header,
            directories,
            current: 0,
        })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    fn directory(&self) -> Result<&TiffDirectory, ContainerError> {
        self.directories
            .get(self.current)
            .ok_or(ContainerError::DirectoryOutOfRange {
                index: self.current,
                count: self.directories.len(),
            })
    }

    /// Read `len` bytes at `offset` and normalize samples to little-endian.
    async fn read_samples(
        &self,
        offset: u64,
        len: usize,
        bits_per_sample: u16,
    ) -> Result<Bytes, ContainerError> {
        let bytes = self.reader.read_exact_at(offset, len).await?;
        if self.header.byte_order == ByteOrder::BigEndian && bits_per_sample > 8 {
            let mut owned = BytesMut::from(&bytes[..]);
            swap_sample_bytes(&mut owned, bits_per_sample);
            return Ok(owned.freeze());
        }
        Ok(bytes)
    }
}

async fn read_ifd<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> Result<Ifd, ContainerError> {
    let count_bytes = reader
        .read_exact_at(offset, header.ifd_count_size())
        .await?;
    let count = Ifd::parse_entry_count(&count_bytes, header)?;
    if count > Ifd::max_entry_count(offset, reader.size(), header) {
        return Err(TiffError::InvalidIfdOffset(offset).into());
    }
    let size = Ifd::calculate_size(count, header);
    if offset.saturating_add(size) > reader.size() {
        return Err(TiffError::InvalidIfdOffset(offset).into());
    }
    let bytes = reader.read_exact_at(offset, size as usize).await?;
    Ok(Ifd::parse(&bytes, header)?)
}

async fn load_directory<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    ifd: &Ifd,
    index: usize,
) -> Result<TiffDirectory, ContainerError> {
    let values = ValueReader::new(reader, header);
    let mut tags = TagSet::new();
    for entry in &ifd.entries {
        if entry.field_type.is_none() {
            debug!(
                tag = entry.tag_id,
                field_type = entry.field_type_raw,
                directory = index,
                "Skipping tag with unsupported field type"
            );
            continue;
        }
        let value = values.read_value(entry).await?;
        tags.insert_raw(entry.tag_id, value);
    }

    let validation = validate_directory(&tags, index);
    for warning in &validation.warnings {
        warn!(directory = index, "{}", warning);
    }
    validation.into_result()?;

    let layout = DirectoryLayout::from_tags(&tags)?;
    let (offsets_tag, counts_tag) = if layout.is_tiled() {
        (TiffTag::TileOffsets, TiffTag::TileByteCounts)
    } else {
        (TiffTag::StripOffsets, TiffTag::StripByteCounts)
    };
    let offsets = tags.u64_array(offsets_tag).unwrap_or_default();
    let byte_counts = tags.u64_array(counts_tag).unwrap_or_default();

    Ok(TiffDirectory {
        tags,
        layout,
        offsets,
        byte_counts,
    })
}

#[async_trait]
impl<R: RangeReader> TileSource for TiffReader<R> {
    fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    fn directory_count(&self) -> usize {
        self.directories.len()
    }

    fn current_directory(&self) -> usize {
        self.current
    }

    fn select_directory(&mut self, index: usize) -> Result<(), ContainerError> {
        if index >= self.directories.len() {
            return Err(ContainerError::DirectoryOutOfRange {
                index,
                count: self.directories.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    fn tags(&self) -> Result<&TagSet, ContainerError> {
        Ok(&self.directory()?.tags)
    }

    fn layout(&self) -> Result<&DirectoryLayout, ContainerError> {
        Ok(&self.directory()?.layout)
    }

    async fn read_tile(&mut self, x: u32, y: u32) -> Result<Bytes, ContainerError> {
        let directory = self.directory()?;
        let layout = directory.layout;
        let index = layout.tile_index(x, y)?;
        let expected = layout.tile_byte_size().unwrap_or(0);

        let (offset, available) = match (directory.offsets.get(index), directory.byte_counts.get(index)) {
            (Some(&offset), Some(&count)) => (offset, count as usize),
            _ => return Err(ContainerError::TileOutOfRange { x, y }),
        };
        if available < expected {
            return Err(ContainerError::ShortRead {
                expected,
                actual: available,
            });
        }

        self.read_samples(offset, expected, layout.image.bits_per_sample)
            .await
    }

    async fn read_scanline(&mut self, row: u32) -> Result<Bytes, ContainerError> {
        let directory = self.directory()?;
        let layout = directory.layout;
        if layout.is_tiled() {
            return Err(ContainerError::Layout(
                "scanline access on a tiled directory".to_string(),
            ));
        }
        if row >= layout.image.height {
            return Err(ContainerError::RowOutOfRange {
                row,
                height: layout.image.height,
            });
        }

        let strip = (row / layout.rows_per_strip) as usize;
        let row_in_strip = (row % layout.rows_per_strip) as usize;
        let row_bytes = layout.scanline_byte_size();

        let (offset, available) = match (directory.offsets.get(strip), directory.byte_counts.get(strip)) {
            (Some(&offset), Some(&count)) => (offset, count as usize),
            _ => {
                return Err(ContainerError::RowOutOfRange {
                    row,
                    height: layout.image.height,
                })
            }
        };
        let needed = (row_in_strip + 1) * row_bytes;
        if available < needed {
            return Err(ContainerError::ShortRead {
                expected: needed,
                actual: available,
            });
        }

        let start = offset + (row_in_strip * row_bytes) as u64;
        self.read_samples(start, row_bytes, layout.image.bits_per_sample)
            .await
    }
}

// =============================================================================
// TiffSink
// =============================================================================

/// Container that writes a new TIFF file directory by directory.
///
/// Stripped output is written with one row per strip.
pub struct TiffSink<W> {
    writer: TiffWriter<W>,
    layout: Option<DirectoryLayout>,
    identifier: String,
}

impl TiffSink<File> {
    /// Create (or truncate) a TIFF file on the local filesystem.
    pub async fn create(path: impl AsRef<Path>, bigtiff: bool) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let file = File::create(path)
            .await
            .map_err(crate::error::IoError::from)?;
        let mut sink = Self::new(file, bigtiff).await?;
        sink.identifier = path.display().to_string();
        Ok(sink)
    }
}

impl<W> TiffSink<W>
where
    W: AsyncWrite + AsyncSeek + Unpin + Send,
{
    pub async fn new(inner: W, bigtiff: bool) -> Result<Self, ContainerError> {
        let writer = TiffWriter::new(inner, bigtiff).await?;
        Ok(Self {
            writer,
            layout: None,
            identifier: if bigtiff { "bigtiff" } else { "tiff" }.to_string(),
        })
    }

    /// Flush the output and hand it back.
    ///
    /// A directory with staged tags or data that was never finalized is
    /// dropped with a warning.
    pub async fn finish(self) -> Result<W, ContainerError> {
        if self.writer.has_pending() {
            warn!(
                identifier = %self.identifier,
                "Discarding directory that was never finalized"
            );
        }
        Ok(self.writer.finish().await?)
    }

    fn current_layout(&mut self) -> Result<DirectoryLayout, ContainerError> {
        if let Some(layout) = self.layout {
            return Ok(layout);
        }
        let layout = DirectoryLayout::from_tags(self.writer.tags())?;
        self.layout = Some(layout);
        Ok(layout)
    }
}

#[async_trait]
impl<W> TileSink for TiffSink<W>
where
    W: AsyncWrite + AsyncSeek + Unpin + Send,
{
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn set_tag(&mut self, tag: TiffTag, value: TagValue) -> Result<(), ContainerError> {
        self.writer.set_tag(tag, value)?;
        self.layout = None;
        Ok(())
    }

    async fn write_tile(&mut self, x: u32, y: u32, data: &[u8]) -> Result<(), ContainerError> {
        let layout = self.current_layout()?;
        let index = layout.tile_index(x, y)?;
        let expected = layout.tile_byte_size().unwrap_or(0);
        if data.len() != expected {
            return Err(ContainerError::ShortWrite {
                expected,
                actual: data.len(),
            });
        }
        self.writer.write_chunk(index, data).await?;
        Ok(())
    }

    async fn write_scanline(&mut self, row: u32, data: &[u8]) -> Result<(), ContainerError> {
        let layout = self.current_layout()?;
        if layout.is_tiled() {
            return Err(ContainerError::Layout(
                "scanline write to a tiled directory".to_string(),
            ));
        }
        if row >= layout.image.height {
            return Err(ContainerError::RowOutOfRange {
                row,
                height: layout.image.height,
            });
        }
        let expected = layout.scanline_byte_size();
        if data.len() != expected {
            return Err(ContainerError::ShortWrite {
                expected,
                actual: data.len(),
            });
        }
        self.writer.write_chunk(row as usize, data).await?;
        Ok(())
    }

    async fn finalize_directory(&mut self) -> Result<(), ContainerError> {
        let layout = self.current_layout()?;
        let (organization, chunks) = if layout.is_tiled() {
            (DataOrganization::Tiles, layout.tile_count())
        } else {
            self.writer
                .set_tag(TiffTag::RowsPerStrip, TagValue::Long(vec![1]))?;
            (DataOrganization::Strips, layout.image.height as usize)
        };
        self.writer.finalize_directory(organization, chunks).await?;
        self.layout = None;
        Ok(())
    }

    fn directories_written(&self) -> usize {
        self.writer.directories_written()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::io::BytesReader;

    fn gray_tags(width: u32, height: u32, bits: u16, tile: Option<u32>) -> TagSet {
        let mut tags = TagSet::new();
        tags.insert(TiffTag::ImageWidth, TagValue::Long(vec![width]));
        tags.insert(TiffTag::ImageLength, TagValue::Long(vec![height]));
        tags.insert(TiffTag::BitsPerSample, TagValue::Short(vec![bits]));
        tags.insert(TiffTag::SamplesPerPixel, TagValue::Short(vec![1]));
        tags.insert(TiffTag::Compression, TagValue::Short(vec![1]));
        tags.insert(TiffTag::PhotometricInterpretation, TagValue::Short(vec![1]));
        if let Some(size) = tile {
            tags.insert(TiffTag::TileWidth, TagValue::Long(vec![size]));
            tags.insert(TiffTag::TileLength, TagValue::Long(vec![size]));
        }
        tags
    }

    async fn sink(bigtiff: bool) -> TiffSink<Cursor<Vec<u8>>> {
        TiffSink::new(Cursor::new(Vec::new()), bigtiff).await.unwrap()
    }

    async fn reopen(sink: TiffSink<Cursor<Vec<u8>>>) -> TiffReader<BytesReader> {
        let bytes = sink.finish().await.unwrap().into_inner();
        TiffReader::open(BytesReader::new(bytes, "mem://out.tif"))
            .await
            .unwrap()
    }

    fn stage(sink: &mut TiffSink<Cursor<Vec<u8>>>, tags: &TagSet) {
        crate::container::stage_tags(sink, tags).unwrap();
    }

    // -------------------------------------------------------------------------
    // Round trips
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_tiled_round_trip() {
        for bigtiff in [false, true] {
            let mut out = sink(bigtiff).await;
            stage(&mut out, &gray_tags(4, 4, 8, Some(2)));
            for (i, (x, y)) in [(0, 0), (2, 0), (0, 2), (2, 2)].into_iter().enumerate() {
                out.write_tile(x, y, &[i as u8; 4]).await.unwrap();
            }
            out.finalize_directory().await.unwrap();
            assert_eq!(out.directories_written(), 1);

            let mut reader = reopen(out).await;
            assert_eq!(reader.header().is_bigtiff, bigtiff);
            assert_eq!(reader.directory_count(), 1);
            assert!(reader.is_tiled().unwrap());
            assert_eq!(&reader.read_tile(2, 2).await.unwrap()[..], &[3u8; 4]);
            assert_eq!(&reader.read_tile(2, 0).await.unwrap()[..], &[1u8; 4]);
        }
    }

    #[tokio::test]
    async fn test_stripped_round_trip_multiple_directories() {
        let mut out = sink(false).await;
        for directory in 0..3u8 {
            stage(&mut out, &gray_tags(3, 2, 8, None));
            out.write_scanline(0, &[directory; 3]).await.unwrap();
            out.write_scanline(1, &[directory + 10; 3]).await.unwrap();
            out.finalize_directory().await.unwrap();
        }

        let mut reader = reopen(out).await;
        assert_eq!(reader.directory_count(), 3);
        reader.select_directory(2).unwrap();
        assert_eq!(reader.layout().unwrap().rows_per_strip, 1);
        assert_eq!(&reader.read_scanline(1).await.unwrap()[..], &[12u8; 3]);
        assert!(matches!(
            reader.read_scanline(2).await,
            Err(ContainerError::RowOutOfRange { row: 2, height: 2 })
        ));
    }

    #[tokio::test]
    async fn test_tags_survive_round_trip() {
        let mut out = sink(false).await;
        let mut tags = gray_tags(2, 1, 16, None);
        tags.insert(TiffTag::Software, TagValue::Ascii("tilefx".to_string()));
        tags.insert(TiffTag::XResolution, TagValue::Rational(vec![(300, 1)]));
        stage(&mut out, &tags);
        out.write_scanline(0, &[1, 0, 2, 0]).await.unwrap();
        out.finalize_directory().await.unwrap();

        let reader = reopen(out).await;
        assert_eq!(reader.tags().unwrap().ascii(TiffTag::Software), Some("tilefx"));
        assert_eq!(
            reader.tag(TiffTag::XResolution),
            Some(&TagValue::Rational(vec![(300, 1)]))
        );
        assert_eq!(reader.layout().unwrap().image.bits_per_sample, 16);
    }

    // -------------------------------------------------------------------------
    // Sink validation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sink_rejects_wrong_sizes() {
        let mut out = sink(false).await;
        stage(&mut out, &gray_tags(4, 4, 8, Some(2)));
        assert!(matches!(
            out.write_tile(0, 0, &[0u8; 3]).await,
            Err(ContainerError::ShortWrite {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            out.write_tile(1, 0, &[0u8; 4]).await,
            Err(ContainerError::TileOutOfRange { x: 1, y: 0 })
        ));
        assert!(matches!(
            out.write_scanline(0, &[0u8; 4]).await,
            Err(ContainerError::Layout(_))
        ));
    }

    #[tokio::test]
    async fn test_sink_requires_geometry() {
        let mut out = sink(false).await;
        assert!(matches!(
            out.write_tile(0, 0, &[0u8; 4]).await,
            Err(ContainerError::MissingTag("ImageWidth"))
        ));
    }

    // -------------------------------------------------------------------------
    // Reader specifics
    // -------------------------------------------------------------------------

    /// Big-endian classic TIFF, one 2x1 strip of 16-bit samples.
    fn big_endian_tiff() -> Vec<u8> {
        let mut data = vec![0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x0C];
        data.extend_from_slice(&[0x12, 0x34, 0xAB, 0xCD]); // samples at 8
        let entries: [(u16, u16, u32, u32); 6] = [
            (256, 4, 1, 2),
            (257, 4, 1, 1),
            (258, 3, 1, 16 << 16),
            (259, 3, 1, 1 << 16),
            (273, 4, 1, 8),
            (279, 4, 1, 4),
        ];
        data.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        for (tag, field_type, count, value) in entries {
            data.extend_from_slice(&tag.to_be_bytes());
            data.extend_from_slice(&field_type.to_be_bytes());
            data.extend_from_slice(&count.to_be_bytes());
            data.extend_from_slice(&value.to_be_bytes());
        }
        data.extend_from_slice(&0u32.to_be_bytes());
        data
    }

    #[tokio::test]
    async fn test_big_endian_samples_are_swapped() {
        let mut reader = TiffReader::open(BytesReader::new(big_endian_tiff(), "mem://be.tif"))
            .await
            .unwrap();
        assert_eq!(reader.header().byte_order, ByteOrder::BigEndian);
        let row = reader.read_scanline(0).await.unwrap();
        assert_eq!(&row[..], &[0x34, 0x12, 0xCD, 0xAB]);
    }

    #[tokio::test]
    async fn test_reader_rejects_compressed_directory() {
        let mut data = big_endian_tiff();
        // Compression value lives in the fourth entry's value field
        let value_pos = 8 + 4 + 2 + 3 * 12 + 8;
        data[value_pos..value_pos + 2].copy_from_slice(&5u16.to_be_bytes());
        let result = TiffReader::open(BytesReader::new(data, "mem://lzw.tif")).await;
        assert!(matches!(
            result,
            Err(ContainerError::Tiff(TiffError::UnsupportedCompression(_)))
        ));
    }

    #[tokio::test]
    async fn test_select_directory_out_of_range() {
        let mut reader = TiffReader::open(BytesReader::new(big_endian_tiff(), "mem://be.tif"))
            .await
            .unwrap();
        assert!(matches!(
            reader.select_directory(1),
            Err(ContainerError::DirectoryOutOfRange { index: 1, count: 1 })
        ));
        assert!(matches!(
            reader.read_tile(0, 0).await,
            Err(ContainerError::Layout(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_file_has_no_directories() {
        let out = sink(false).await;
        let reader = reopen(out).await;
        assert_eq!(reader.directory_count(), 0);
        assert!(matches!(
            reader.layout(),
            Err(ContainerError::DirectoryOutOfRange { index: 0, count: 0 })
        ));
    }

    #[tokio::test]
    async fn test_reader_rejects_impossible_entry_count() {
        let mut data = Vec::new();
        data.extend_from_slice(b"II");
        data.extend_from_slice(&43u16.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&16u64.to_le_bytes());
        data.extend_from_slice(&0xCCCC_CCCC_CCCC_CCCDu64.to_le_bytes());
        data.extend_from_slice(&[0u8; 28]);

        let result = TiffReader::open(BytesReader::new(data, "mem://hostile.tif")).await;
        assert!(matches!(
            result,
            Err(ContainerError::Tiff(TiffError::InvalidIfdOffset(16)))
        ));
    }
}
