//! Test utilities for integration tests.
//!
//! Builders for synthetic multi-channel images, both in memory and as TIFF
//! bytes, plus helpers to move images between the two.

use std::io::Cursor;

use wsi_tilefx::container::{stage_tags, MemoryContainer, MemoryDirectory, TiffReader, TiffSink};
use wsi_tilefx::io::BytesReader;
use wsi_tilefx::{TileSink, TileSource};

// =============================================================================
// Synthetic Images
// =============================================================================

/// Row-major pixels of a `width` x `height` image from a function of (x, y).
pub fn raster<T>(width: u32, height: u32, f: impl Fn(u32, u32) -> T) -> Vec<T> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| f(x, y))
        .collect()
}

/// The three-channel 4x4 16-bit image with 2x2 tiles used across tests.
///
/// - channel 0: every tile bright (mean 1000), all kept
/// - channel 1: every tile dark and flat (10), all dropped
/// - channel 2: tile (0, 0) dark with a wide spread, kept; the other three
///   tiles dark and flat, dropped
pub fn three_channel_scenario() -> MemoryContainer {
    let bright = raster(4, 4, |_, _| 1000u16);
    let dark = raster(4, 4, |_, _| 10u16);
    let mixed = raster(4, 4, |x, y| match (x, y) {
        (0, 0) => 0u16,
        (1, 1) => 400,
        _ => 20,
    });

    MemoryContainer::with_directories(
        "mem://scenario",
        vec![
            MemoryDirectory::tiled(4, 4, 2, 2, &bright).unwrap(),
            MemoryDirectory::tiled(4, 4, 2, 2, &dark).unwrap(),
            MemoryDirectory::tiled(4, 4, 2, 2, &mixed).unwrap(),
        ],
    )
}

/// Tile origin holding the zero tile of each channel in
/// [`zero_tile_scenario`].
pub const ZERO_TILES: [(u32, u32); 3] = [(0, 0), (2, 0), (0, 2)];

/// The three-channel 4x4 16-bit image with 2x2 tiles where every channel
/// has exactly one all-zero tile, at a different position per channel, and
/// mid-range values (30000) everywhere else.
pub fn zero_tile_scenario() -> MemoryContainer {
    let directories = ZERO_TILES
        .iter()
        .map(|&(zx, zy)| {
            let pixels = raster(4, 4, |x, y| {
                if x / 2 * 2 == zx && y / 2 * 2 == zy {
                    0u16
                } else {
                    30000
                }
            });
            MemoryDirectory::tiled(4, 4, 2, 2, &pixels).unwrap()
        })
        .collect();
    MemoryContainer::with_directories("mem://zero-tiles", directories)
}

/// Three 8-bit planes of a `width` x `height` image.
pub fn rgb_planes(width: u32, height: u32) -> [Vec<u8>; 3] {
    [
        raster(width, height, |x, y| (x * 7 + y) as u8),
        raster(width, height, |x, y| (x + y * 11) as u8),
        raster(width, height, |x, y| (x * y) as u8 ^ 0x5a),
    ]
}

// =============================================================================
// TIFF Conversion
// =============================================================================

/// Serialize every directory of `source` into TIFF bytes.
pub async fn to_tiff_bytes<S: TileSource>(source: &mut S, bigtiff: bool) -> Vec<u8> {
    let mut sink = TiffSink::new(Cursor::new(Vec::new()), bigtiff)
        .await
        .unwrap();

    for index in 0..source.directory_count() {
        source.select_directory(index).unwrap();
        let tags = source.tags().unwrap().clone();
        let layout = *source.layout().unwrap();
        stage_tags(&mut sink, &tags).unwrap();

        match layout.grid() {
            Some(grid) => {
                for coord in grid.iter() {
                    let tile = source.read_tile(coord.x, coord.y).await.unwrap();
                    sink.write_tile(coord.x, coord.y, &tile).await.unwrap();
                }
            }
            None => {
                for row in 0..layout.image.height {
                    let line = source.read_scanline(row).await.unwrap();
                    sink.write_scanline(row, &line).await.unwrap();
                }
            }
        }
        sink.finalize_directory().await.unwrap();
    }

    sink.finish().await.unwrap().into_inner()
}

/// Open TIFF bytes as a source.
pub async fn open_tiff(bytes: Vec<u8>, name: &str) -> TiffReader<BytesReader> {
    TiffReader::open(BytesReader::new(bytes, name)).await.unwrap()
}

/// Fresh in-memory TIFF sink.
pub async fn tiff_sink(bigtiff: bool) -> TiffSink<Cursor<Vec<u8>>> {
    TiffSink::new(Cursor::new(Vec::new()), bigtiff).await.unwrap()
}

/// Finish a sink and reopen what it wrote.
pub async fn reopen(sink: TiffSink<Cursor<Vec<u8>>>) -> TiffReader<BytesReader> {
    let bytes = sink.finish().await.unwrap().into_inner();
    open_tiff(bytes, "mem://output.tif").await
}

/// Reassemble the full row-major image of the current directory.
///
/// Works for tiled and stripped directories alike; tile padding is cut off.
pub async fn read_raster<S: TileSource>(source: &mut S) -> Vec<u8> {
    let layout = *source.layout().unwrap();
    let width = layout.image.width as usize;
    let height = layout.image.height as usize;
    let pixel_bytes =
        (layout.image.bits_per_sample as usize / 8) * layout.image.samples_per_pixel as usize;
    let row_bytes = width * pixel_bytes;
    let mut image = vec![0u8; row_bytes * height];

    match layout.grid() {
        Some(grid) => {
            let tile_row_bytes = grid.tile_width() as usize * pixel_bytes;
            for coord in grid.iter() {
                let tile = source.read_tile(coord.x, coord.y).await.unwrap();
                for ty in 0..grid.tile_height() as usize {
                    let y = coord.y as usize + ty;
                    if y >= height {
                        break;
                    }
                    let x0 = coord.x as usize * pixel_bytes;
                    let len = tile_row_bytes.min(row_bytes - x0);
                    let src = &tile[ty * tile_row_bytes..ty * tile_row_bytes + len];
                    image[y * row_bytes + x0..y * row_bytes + x0 + len].copy_from_slice(src);
                }
            }
        }
        None => {
            for row in 0..height {
                let line = source.read_scanline(row as u32).await.unwrap();
                image[row * row_bytes..(row + 1) * row_bytes].copy_from_slice(&line);
            }
        }
    }
    image
}

// =============================================================================
// Hand-built TIFF Files
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// One tiled, single-channel directory for [`RawTiffBuilder`].
pub struct RawDirectory {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub bits_per_sample: u16,
    pub compression: u16,
    /// Tile payloads, already in the file's byte order
    pub tiles: Vec<Vec<u8>>,
}

/// Writes classic TIFF files byte by byte, in either byte order, without
/// going through the crate's own writer.
pub struct RawTiffBuilder {
    byte_order: ByteOrderType,
    directories: Vec<RawDirectory>,
}

impl RawTiffBuilder {
    pub fn new(byte_order: ByteOrderType) -> Self {
        Self {
            byte_order,
            directories: Vec::new(),
        }
    }

    pub fn add_directory(mut self, directory: RawDirectory) -> Self {
        self.directories.push(directory);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(match self.byte_order {
            ByteOrderType::LittleEndian => b"II",
            ByteOrderType::BigEndian => b"MM",
        });
        self.put16(&mut out, 42);
        let mut pointer_pos = out.len();
        self.put32(&mut out, 0);

        for dir in &self.directories {
            let mut offsets = Vec::new();
            for tile in &dir.tiles {
                offsets.push(out.len() as u32);
                out.extend_from_slice(tile);
            }
            let counts: Vec<u32> = dir.tiles.iter().map(|t| t.len() as u32).collect();
            let offsets_field = self.array_field(&mut out, &offsets);
            let counts_field = self.array_field(&mut out, &counts);
            if out.len() % 2 == 1 {
                out.push(0);
            }

            let ifd_pos = out.len() as u32;
            self.patch32(&mut out, pointer_pos, ifd_pos);

            let n = dir.tiles.len() as u32;
            let entries: [(u16, u16, u32, u32); 12] = [
                (256, 4, 1, dir.width),
                (257, 4, 1, dir.height),
                (258, 3, 1, dir.bits_per_sample as u32),
                (259, 3, 1, dir.compression as u32),
                (262, 3, 1, 1),
                (277, 3, 1, 1),
                (284, 3, 1, 1),
                (322, 4, 1, dir.tile_width),
                (323, 4, 1, dir.tile_height),
                (324, 4, n, offsets_field),
                (325, 4, n, counts_field),
                (339, 3, 1, 1),
            ];
            self.put16(&mut out, entries.len() as u16);
            for (tag, field_type, count, value) in entries {
                self.put16(&mut out, tag);
                self.put16(&mut out, field_type);
                self.put32(&mut out, count);
                if field_type == 3 {
                    // Short values are left-justified in the 4-byte field
                    self.put16(&mut out, value as u16);
                    self.put16(&mut out, 0);
                } else {
                    self.put32(&mut out, value);
                }
            }
            pointer_pos = out.len();
            self.put32(&mut out, 0);
        }
        out
    }

    /// Inline value for a one-element array, otherwise the offset of the
    /// array written at the end of `out`.
    fn array_field(&self, out: &mut Vec<u8>, values: &[u32]) -> u32 {
        if values.len() == 1 {
            return values[0];
        }
        if out.len() % 2 == 1 {
            out.push(0);
        }
        let offset = out.len() as u32;
        for &v in values {
            self.put32(out, v);
        }
        offset
    }

    fn put16(&self, out: &mut Vec<u8>, value: u16) {
        match self.byte_order {
            ByteOrderType::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrderType::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn put32(&self, out: &mut Vec<u8>, value: u32) {
        match self.byte_order {
            ByteOrderType::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrderType::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn patch32(&self, out: &mut [u8], pos: usize, value: u32) {
        let bytes = match self.byte_order {
            ByteOrderType::LittleEndian => value.to_le_bytes(),
            ByteOrderType::BigEndian => value.to_be_bytes(),
        };
        out[pos..pos + 4].copy_from_slice(&bytes);
    }
}

/// Encode 16-bit samples in the given byte order.
pub fn encode_u16(samples: &[u16], byte_order: ByteOrderType) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| match byte_order {
            ByteOrderType::LittleEndian => s.to_le_bytes(),
            ByteOrderType::BigEndian => s.to_be_bytes(),
        })
        .collect()
}
