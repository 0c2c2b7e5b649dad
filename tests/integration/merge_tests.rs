//! End-to-end tests for grayscale-to-RGB merging.

use wsi_tilefx::container::{MemoryContainer, MemoryDirectory};
use wsi_tilefx::tile::ReadUnit;
use wsi_tilefx::transform::{merge_gray_planes_to_rgb, merge_gray_to_rgb};
use wsi_tilefx::{EngineError, TileSource};

use super::test_utils::{open_tiff, read_raster, reopen, rgb_planes, tiff_sink, to_tiff_bytes};

fn interleaved(planes: &[Vec<u8>; 3]) -> Vec<u8> {
    (0..planes[0].len())
        .flat_map(|i| [planes[0][i], planes[1][i], planes[2][i]])
        .collect()
}

fn tiled_planes(width: u32, height: u32, tile: u32) -> MemoryContainer {
    let planes = rgb_planes(width, height);
    MemoryContainer::with_directories(
        "mem://planes",
        planes
            .iter()
            .map(|p| MemoryDirectory::tiled(width, height, tile, tile, p.as_slice()).unwrap())
            .collect(),
    )
}

fn single_plane(name: &str, width: u32, height: u32, pixels: &[u8]) -> MemoryContainer {
    MemoryContainer::with_directories(
        name,
        vec![MemoryDirectory::tiled(width, height, 4, 4, pixels).unwrap()],
    )
}

// =============================================================================
// Single image
// =============================================================================

#[tokio::test]
async fn test_tiled_merge_through_tiff_files() {
    let bytes = to_tiff_bytes(&mut tiled_planes(9, 7, 4), false).await;
    let mut source = open_tiff(bytes, "mem://planes.tif").await;
    let mut sink = tiff_sink(false).await;

    let report = merge_gray_to_rgb(&mut source, &mut sink).await.unwrap();
    assert_eq!(report.unit, ReadUnit::Tile);
    assert_eq!(report.units, 6);
    assert_eq!((report.width, report.height), (9, 7));

    let mut output = reopen(sink).await;
    assert_eq!(output.directory_count(), 1);
    output.select_directory(0).unwrap();
    assert_eq!(
        read_raster(&mut output).await,
        interleaved(&rgb_planes(9, 7))
    );
}

#[tokio::test]
async fn test_stripped_merge_matches_tiled_merge() {
    let planes = rgb_planes(9, 7);
    let mut stripped = MemoryContainer::with_directories(
        "mem://stripped",
        planes
            .iter()
            .map(|p| MemoryDirectory::stripped(9, 7, p.as_slice()).unwrap())
            .collect(),
    );
    let mut tiled = tiled_planes(9, 7, 4);

    let mut from_rows = MemoryContainer::new("mem://rows");
    let mut from_tiles = MemoryContainer::new("mem://tiles");
    let report = merge_gray_to_rgb(&mut stripped, &mut from_rows)
        .await
        .unwrap();
    assert_eq!(report.unit, ReadUnit::Row);
    assert_eq!(report.units, 7);
    merge_gray_to_rgb(&mut tiled, &mut from_tiles).await.unwrap();

    from_rows.select_directory(0).unwrap();
    from_tiles.select_directory(0).unwrap();
    let expected = interleaved(&planes);
    assert_eq!(read_raster(&mut from_rows).await, expected);
    assert_eq!(read_raster(&mut from_tiles).await, expected);
}

#[tokio::test]
async fn test_wrong_directory_count_is_rejected() {
    let [red, green, _] = rgb_planes(4, 4);
    let mut source = MemoryContainer::with_directories(
        "mem://two",
        vec![
            MemoryDirectory::tiled(4, 4, 4, 4, &red).unwrap(),
            MemoryDirectory::tiled(4, 4, 4, 4, &green).unwrap(),
        ],
    );
    let mut sink = MemoryContainer::new("mem://rgb");

    assert!(matches!(
        merge_gray_to_rgb(&mut source, &mut sink).await,
        Err(EngineError::DirectoryCount {
            expected: 3,
            actual: 2
        })
    ));
    assert_eq!(sink.directory_count(), 0);
}

#[tokio::test]
async fn test_sixteen_bit_planes_are_rejected() {
    let wide = vec![0u16; 16];
    let mut source = MemoryContainer::with_directories(
        "mem://wide",
        (0..3)
            .map(|_| MemoryDirectory::tiled(4, 4, 4, 4, &wide).unwrap())
            .collect(),
    );
    let mut sink = MemoryContainer::new("mem://rgb");

    assert!(matches!(
        merge_gray_to_rgb(&mut source, &mut sink).await,
        Err(EngineError::UnsupportedLayout { directory: 0, .. })
    ));
}

// =============================================================================
// Three images
// =============================================================================

#[tokio::test]
async fn test_three_images_match_single_image() {
    let [r, g, b] = rgb_planes(8, 8);
    let mut red = single_plane("mem://red", 8, 8, &r);
    let mut green = single_plane("mem://green", 8, 8, &g);
    let mut blue = single_plane("mem://blue", 8, 8, &b);
    let mut combined = MemoryContainer::with_directories(
        "mem://combined",
        [&r, &g, &b]
            .iter()
            .map(|p| MemoryDirectory::tiled(8, 8, 4, 4, p.as_slice()).unwrap())
            .collect(),
    );

    let mut from_files = MemoryContainer::new("mem://files");
    let mut from_directories = MemoryContainer::new("mem://directories");
    let report = merge_gray_planes_to_rgb(&mut red, &mut green, &mut blue, &mut from_files)
        .await
        .unwrap();
    assert_eq!(report.units, 4);
    merge_gray_to_rgb(&mut combined, &mut from_directories)
        .await
        .unwrap();

    for (x, y) in [(0, 0), (4, 0), (0, 4), (4, 4)] {
        assert_eq!(
            from_files.tile_bytes(0, x, y),
            from_directories.tile_bytes(0, x, y),
            "tile ({}, {})",
            x,
            y
        );
    }
}

#[tokio::test]
async fn test_mismatched_plane_sizes_are_rejected() {
    let [r, g, _] = rgb_planes(8, 8);
    let small = rgb_planes(4, 4);
    let mut red = single_plane("mem://red", 8, 8, &r);
    let mut green = single_plane("mem://green", 8, 8, &g);
    let mut blue = single_plane("mem://blue", 4, 4, &small[2]);
    let mut sink = MemoryContainer::new("mem://rgb");

    let err = merge_gray_planes_to_rgb(&mut red, &mut green, &mut blue, &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedLayout { .. }));
    assert!(err.to_string().contains("mem://blue"), "{}", err);
    assert_eq!(sink.directory_count(), 0);
}
