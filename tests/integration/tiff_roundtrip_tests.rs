//! TIFF container tests: byte orders, BigTIFF, strips, rejection of
//! unsupported directories, shared access and summaries.

use wsi_tilefx::container::{MemoryContainer, MemoryDirectory, SharedSource};
use wsi_tilefx::format::tiff::{TagValue, TiffTag};
use wsi_tilefx::inspect::summarize;
use wsi_tilefx::transform::{compress, QuantileThresholds};
use wsi_tilefx::{ContainerError, TiffError, TileCoord, TileSource};

use super::test_utils::{
    encode_u16, open_tiff, raster, read_raster, reopen, three_channel_scenario, tiff_sink,
    to_tiff_bytes, ByteOrderType, RawDirectory, RawTiffBuilder,
};

fn raw_gray16(order: ByteOrderType, samples: &[u16], compression: u16) -> Vec<u8> {
    RawTiffBuilder::new(order)
        .add_directory(RawDirectory {
            width: 2,
            height: 2,
            tile_width: 2,
            tile_height: 2,
            bits_per_sample: 16,
            compression,
            tiles: vec![encode_u16(samples, order)],
        })
        .build()
}

// =============================================================================
// Byte Order
// =============================================================================

#[tokio::test]
async fn test_big_endian_samples_read_as_native() {
    let samples = [0x0102u16, 0x0304, 0xA0B0, 0xFFFE];
    let mut big = open_tiff(raw_gray16(ByteOrderType::BigEndian, &samples, 1), "be.tif").await;
    let mut little =
        open_tiff(raw_gray16(ByteOrderType::LittleEndian, &samples, 1), "le.tif").await;

    let from_big = big.read_tile(0, 0).await.unwrap();
    let from_little = little.read_tile(0, 0).await.unwrap();
    assert_eq!(from_big, from_little);
    assert_eq!(from_big.as_ref(), encode_u16(&samples, ByteOrderType::LittleEndian));
}

#[tokio::test]
async fn test_big_endian_input_filters_like_little_endian() {
    let bright = [1000u16; 4];
    let dark = [10u16; 4];
    let build = |order| {
        RawTiffBuilder::new(order)
            .add_directory(RawDirectory {
                width: 2,
                height: 2,
                tile_width: 2,
                tile_height: 2,
                bits_per_sample: 16,
                compression: 1,
                tiles: vec![encode_u16(&bright, order)],
            })
            .add_directory(RawDirectory {
                width: 2,
                height: 2,
                tile_width: 2,
                tile_height: 2,
                bits_per_sample: 16,
                compression: 1,
                tiles: vec![encode_u16(&dark, order)],
            })
            .build()
    };

    let mut source = open_tiff(build(ByteOrderType::BigEndian), "be.tif").await;
    let mut sink = tiff_sink(false).await;
    let report = compress(&mut source, &mut sink, QuantileThresholds::default())
        .await
        .unwrap();
    assert_eq!(report.dropped, 1);

    // Output is always little-endian
    let mut output = reopen(sink).await;
    output.select_directory(0).unwrap();
    let kept = output.read_tile(0, 0).await.unwrap();
    assert_eq!(kept.as_ref(), encode_u16(&bright, ByteOrderType::LittleEndian));
}

// =============================================================================
// Round Trips
// =============================================================================

#[tokio::test]
async fn test_bigtiff_round_trip() {
    let mut memory = three_channel_scenario();
    let bytes = to_tiff_bytes(&mut memory, true).await;
    assert_eq!(&bytes[..4], &[0x49, 0x49, 43, 0]);

    let mut reader = open_tiff(bytes, "mem://big.tif").await;
    assert!(reader.header().is_bigtiff);
    assert_eq!(reader.directory_count(), 3);
    for directory in 0..3 {
        reader.select_directory(directory).unwrap();
        memory.select_directory(directory).unwrap();
        assert_eq!(read_raster(&mut reader).await, read_raster(&mut memory).await);
    }
}

#[tokio::test]
async fn test_stripped_round_trip_keeps_descriptive_tags() {
    let pixels = raster(5, 3, |x, y| (x * 40 + y) as u8);
    let mut memory = MemoryContainer::with_directories(
        "mem://strips",
        vec![MemoryDirectory::stripped(5, 3, &pixels)
            .unwrap()
            .with_tag(TiffTag::ImageDescription, TagValue::Ascii("DAPI".to_string()))],
    );

    let mut reader = open_tiff(to_tiff_bytes(&mut memory, false).await, "strips.tif").await;
    assert!(!reader.is_tiled().unwrap());
    assert_eq!(
        reader.tags().unwrap().ascii(TiffTag::ImageDescription),
        Some("DAPI")
    );
    assert_eq!(read_raster(&mut reader).await, pixels);
    assert!(matches!(
        reader.read_scanline(3).await,
        Err(ContainerError::RowOutOfRange { row: 3, height: 3 })
    ));
}

// =============================================================================
// Rejection
// =============================================================================

#[tokio::test]
async fn test_compressed_directory_is_rejected() {
    let bytes = raw_gray16(ByteOrderType::LittleEndian, &[0; 4], 5);
    let result = wsi_tilefx::TiffReader::open(wsi_tilefx::BytesReader::new(bytes, "lzw.tif")).await;
    assert!(matches!(
        result,
        Err(ContainerError::Tiff(TiffError::UnsupportedCompression(_)))
    ));
}

#[tokio::test]
async fn test_not_a_tiff_is_rejected() {
    let result = wsi_tilefx::TiffReader::open(wsi_tilefx::BytesReader::new(
        b"GIF89a-not-a-tiff".to_vec(),
        "image.gif",
    ))
    .await;
    assert!(matches!(
        result,
        Err(ContainerError::Tiff(TiffError::InvalidMagic(_)))
    ));
}

// =============================================================================
// Shared Access and Summaries
// =============================================================================

#[tokio::test]
async fn test_shared_reader_serves_concurrent_tasks() {
    let bytes = to_tiff_bytes(&mut three_channel_scenario(), false).await;
    let shared = SharedSource::new(open_tiff(bytes, "mem://shared.tif").await);

    let mut handles = Vec::new();
    for directory in [2usize, 0, 1, 2, 0, 1] {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            let tile = shared
                .read_tile_in(directory, TileCoord::new(2, 2))
                .await
                .unwrap();
            (directory, tile)
        }));
    }

    let expected = three_channel_scenario();
    for handle in handles {
        let (directory, tile) = handle.await.unwrap();
        assert_eq!(Some(&tile), expected.tile_bytes(directory, 2, 2));
    }
}

#[tokio::test]
async fn test_summary_of_written_file() {
    let bytes = to_tiff_bytes(&mut three_channel_scenario(), false).await;
    let mut reader = open_tiff(bytes, "mem://summary.tif").await;

    let summary = summarize(&mut reader).unwrap();
    assert_eq!(summary.identifier, "mem://summary.tif");
    assert_eq!(summary.directories.len(), 3);
    for (index, directory) in summary.directories.iter().enumerate() {
        assert_eq!(directory.index, index);
        assert_eq!(directory.chunks, 4);
        assert_eq!(directory.layout.image.bits_per_sample, 16);
    }

    let text = summary.to_string();
    assert!(text.starts_with("mem://summary.tif: 3 directories"), "{}", text);
    assert!(text.contains("[2] 4x4 16-bit x1, tiles 2x2 (4 tiles)"), "{}", text);
}
