//! End-to-end tests for the quantile tile filter.

use wsi_tilefx::transform::{compress, QuantileThresholds};
use wsi_tilefx::{EngineError, MemoryContainer, TileCoord, TileSource};

use super::test_utils::{
    open_tiff, reopen, three_channel_scenario, tiff_sink, to_tiff_bytes, zero_tile_scenario,
    ZERO_TILES,
};

const TILE_ORIGINS: [(u32, u32); 4] = [(0, 0), (2, 0), (0, 2), (2, 2)];

// =============================================================================
// Scenario
// =============================================================================

#[tokio::test]
async fn test_three_channel_drop_rates() {
    let mut source = three_channel_scenario();
    let mut sink = MemoryContainer::new("mem://filtered");

    let report = compress(&mut source, &mut sink, QuantileThresholds::default())
        .await
        .unwrap();

    let rates: Vec<(usize, usize)> = report
        .directories
        .iter()
        .map(|d| (d.tiles, d.dropped))
        .collect();
    assert_eq!(rates, vec![(4, 0), (4, 4), (4, 3)]);
    assert_eq!(report.directories[1].drop_rate, 1.0);
    assert_eq!(report.directories[2].drop_rate, 0.75);
    assert_eq!(report.tiles, 12);
    assert_eq!(report.dropped, 7);
}

#[tokio::test]
async fn test_dropped_tiles_are_zero_and_kept_tiles_identical() {
    let mut source = three_channel_scenario();
    let mut sink = MemoryContainer::new("mem://filtered");
    compress(&mut source, &mut sink, QuantileThresholds::default())
        .await
        .unwrap();

    assert_eq!(sink.directory_count(), 3);
    for directory in 0..3 {
        for (x, y) in TILE_ORIGINS {
            let out = sink.tile_bytes(directory, x, y).unwrap();
            let input = source.tile_bytes(directory, x, y).unwrap();
            assert_eq!(out.len(), 8);
            let kept = directory == 0 || (directory == 2 && (x, y) == (0, 0));
            if kept {
                assert_eq!(out, input, "directory {} tile ({}, {})", directory, x, y);
            } else {
                assert!(out.iter().all(|&b| b == 0), "directory {} tile ({}, {})", directory, x, y);
            }
        }
    }
}

#[tokio::test]
async fn test_compress_through_tiff_files() {
    let mut memory = three_channel_scenario();
    let bytes = to_tiff_bytes(&mut memory, false).await;
    let mut source = open_tiff(bytes, "mem://scenario.tif").await;
    let mut sink = tiff_sink(false).await;

    let report = compress(&mut source, &mut sink, QuantileThresholds::default())
        .await
        .unwrap();
    assert_eq!(report.dropped, 7);

    let mut output = reopen(sink).await;
    assert_eq!(output.directory_count(), 3);

    output.select_directory(2).unwrap();
    let kept = output.read_tile(0, 0).await.unwrap();
    assert_eq!(kept.as_ref(), memory.tile_bytes(2, 0, 0).unwrap().as_ref());
    let dropped = output.read_tile(2, 2).await.unwrap();
    assert!(dropped.iter().all(|&b| b == 0));

    // Geometry survives the filter
    let layout = *output.layout().unwrap();
    assert_eq!(layout.image.bits_per_sample, 16);
    assert_eq!(layout.tile_byte_size(), Some(8));
}

#[tokio::test]
async fn test_one_zero_tile_per_channel() {
    let mut source = zero_tile_scenario();
    let mut sink = MemoryContainer::new("mem://filtered");

    let report = compress(&mut source, &mut sink, QuantileThresholds::default())
        .await
        .unwrap();
    for directory in &report.directories {
        assert_eq!((directory.tiles, directory.dropped), (4, 1));
        assert_eq!(directory.drop_rate, 0.25);
    }
    assert_eq!((report.tiles, report.dropped), (12, 3));
    assert_eq!(report.drop_rate, 0.25);

    for (directory, &zero) in ZERO_TILES.iter().enumerate() {
        for (x, y) in TILE_ORIGINS {
            let out = sink.tile_bytes(directory, x, y).unwrap();
            if (x, y) == zero {
                assert!(out.iter().all(|&b| b == 0), "directory {} tile ({}, {})", directory, x, y);
            } else {
                assert_eq!(out, source.tile_bytes(directory, x, y).unwrap());
            }
        }
    }
}

#[tokio::test]
async fn test_one_zero_tile_per_channel_through_tiff_files() {
    let mut memory = zero_tile_scenario();
    let bytes = to_tiff_bytes(&mut memory, false).await;
    let mut source = open_tiff(bytes, "mem://zero-tiles.tif").await;
    let mut sink = tiff_sink(false).await;

    let report = compress(&mut source, &mut sink, QuantileThresholds::default())
        .await
        .unwrap();
    assert_eq!((report.tiles, report.dropped), (12, 3));

    let mut output = reopen(sink).await;
    assert_eq!(output.directory_count(), 3);
    for (directory, &zero) in ZERO_TILES.iter().enumerate() {
        output.select_directory(directory).unwrap();
        for (x, y) in TILE_ORIGINS {
            let tile = output.read_tile(x, y).await.unwrap();
            if (x, y) == zero {
                assert!(tile.iter().all(|&b| b == 0), "directory {} tile ({}, {})", directory, x, y);
            } else {
                let expected = memory.tile_bytes(directory, x, y).unwrap();
                assert_eq!(tile.as_ref(), expected.as_ref());
                assert!(tile.chunks(2).all(|s| u16::from_le_bytes([s[0], s[1]]) == 30000));
            }
        }
    }
}

// =============================================================================
// Thresholds and failures
// =============================================================================

#[tokio::test]
async fn test_lower_thresholds_keep_more() {
    let mut source = three_channel_scenario();
    let mut sink = MemoryContainer::new("mem://filtered");
    let thresholds = QuantileThresholds { mean: 10, spread: 100 };

    let report = compress(&mut source, &mut sink, thresholds).await.unwrap();
    // Channel 1 now meets the mean exactly, channel 2's flat tiles have mean 20
    assert_eq!(report.dropped, 0);
}

#[tokio::test]
async fn test_read_failure_reports_directory_and_tile() {
    let mut source = three_channel_scenario();
    source.fail_tile_read(1, TileCoord::new(0, 2));
    let mut sink = MemoryContainer::new("mem://filtered");

    let err = compress(&mut source, &mut sink, QuantileThresholds::default())
        .await
        .unwrap_err();
    let message = err.to_string();
    match err {
        EngineError::TileIo {
            directory, coord, ..
        } => {
            assert_eq!(directory, 1);
            assert_eq!(coord, TileCoord::new(0, 2));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(message.contains("(0, 2)"), "{}", message);
    assert!(message.contains("directory 1"), "{}", message);

    // Directory 0 was completed before the failure
    assert_eq!(sink.directory_count(), 1);
}
