//! End-to-end tests for palette colorization.

use wsi_tilefx::container::{MemoryContainer, MemoryDirectory};
use wsi_tilefx::format::tiff::{Photometric, TiffTag};
use wsi_tilefx::palette::Palette;
use wsi_tilefx::tile::ReadUnit;
use wsi_tilefx::transform::colorize;
use wsi_tilefx::{EngineError, TileSource};

use super::test_utils::{open_tiff, raster, read_raster, reopen, tiff_sink, to_tiff_bytes};

const PALETTE: &str = "\
# name    lower  upper  color
nuclei    0      1000   0 0 255
membrane  0      1000   #FF0000
marker    500    600    0, 255, 0
";

/// Three 16-bit channels on a 6x5 image with 4x4 tiles (ragged edges).
fn channels() -> MemoryContainer {
    let nuclei = raster(6, 5, |x, _| (x * 200) as u16);
    let membrane = raster(6, 5, |_, y| (y * 250) as u16);
    let marker = raster(6, 5, |x, y| if (x + y) % 2 == 0 { 600u16 } else { 0 });
    MemoryContainer::with_directories(
        "mem://channels",
        vec![
            MemoryDirectory::tiled(6, 5, 4, 4, &nuclei).unwrap(),
            MemoryDirectory::tiled(6, 5, 4, 4, &membrane).unwrap(),
            MemoryDirectory::tiled(6, 5, 4, 4, &marker).unwrap(),
        ],
    )
}

fn expected_pixel(x: u32, y: u32, selection: &[usize]) -> [u8; 3] {
    let palette = Palette::parse(PALETTE).unwrap();
    let values = [
        (x * 200) as u64,
        (y * 250) as u64,
        if (x + y) % 2 == 0 { 600 } else { 0 },
    ];
    let picked: Vec<u64> = selection.iter().map(|&c| values[c]).collect();
    let descriptors = palette.select(selection).unwrap();
    let rgb = wsi_tilefx::transform::combine_channels(&picked, &descriptors).unwrap();
    [rgb.red, rgb.green, rgb.blue]
}

// =============================================================================
// Compositing
// =============================================================================

#[tokio::test]
async fn test_colorize_through_tiff_files() {
    let palette = Palette::parse(PALETTE).unwrap();
    let bytes = to_tiff_bytes(&mut channels(), false).await;
    let mut source = open_tiff(bytes, "mem://channels.tif").await;
    let mut sink = tiff_sink(false).await;

    let report = colorize(&mut source, &mut sink, &palette, &[2, 0])
        .await
        .unwrap();
    assert_eq!(report.unit, Some(ReadUnit::Tile));
    assert_eq!(report.units, 4);
    assert_eq!(report.channels, vec!["marker", "nuclei"]);

    let mut output = reopen(sink).await;
    assert_eq!(output.directory_count(), 1);
    output.select_directory(0).unwrap();

    let layout = *output.layout().unwrap();
    assert_eq!((layout.image.width, layout.image.height), (6, 5));
    assert_eq!(layout.image.samples_per_pixel, 3);
    assert_eq!(layout.image.bits_per_sample, 8);
    assert_eq!(
        output.tags().unwrap().u16(TiffTag::PhotometricInterpretation),
        Some(Photometric::Rgb as u16)
    );

    let image = read_raster(&mut output).await;
    for y in 0..5u32 {
        for x in 0..6u32 {
            let at = ((y * 6 + x) * 3) as usize;
            assert_eq!(
                &image[at..at + 3],
                &expected_pixel(x, y, &[2, 0]),
                "pixel ({}, {})",
                x,
                y
            );
        }
    }
}

#[tokio::test]
async fn test_full_white_when_channels_saturate() {
    let palette = Palette::parse("a 0 10 255 255 255\nb 0 10 255 255 255\n").unwrap();
    let bright = raster(4, 4, |_, _| 4000u16);
    let mut source = MemoryContainer::with_directories(
        "mem://bright",
        vec![
            MemoryDirectory::tiled(4, 4, 4, 4, &bright).unwrap(),
            MemoryDirectory::tiled(4, 4, 4, 4, &bright).unwrap(),
        ],
    );
    let mut sink = MemoryContainer::new("mem://rgb");

    colorize(&mut source, &mut sink, &palette, &[0, 1]).await.unwrap();
    let tile = sink.tile_bytes(0, 0, 0).unwrap();
    assert!(tile.iter().all(|&b| b == 255));
}

#[tokio::test]
async fn test_stripped_input_matches_tiled_input() {
    let palette = Palette::parse(PALETTE).unwrap();
    let nuclei = raster(6, 5, |x, _| (x * 200) as u16);
    let membrane = raster(6, 5, |_, y| (y * 250) as u16);

    let mut tiled = MemoryContainer::with_directories(
        "mem://tiled",
        vec![
            MemoryDirectory::tiled(6, 5, 4, 4, &nuclei).unwrap(),
            MemoryDirectory::tiled(6, 5, 4, 4, &membrane).unwrap(),
        ],
    );
    let mut stripped = MemoryContainer::with_directories(
        "mem://stripped",
        vec![
            MemoryDirectory::stripped(6, 5, &nuclei).unwrap(),
            MemoryDirectory::stripped(6, 5, &membrane).unwrap(),
        ],
    );

    let mut tiled_out = MemoryContainer::new("mem://a");
    let mut stripped_out = MemoryContainer::new("mem://b");
    colorize(&mut tiled, &mut tiled_out, &palette, &[0, 1])
        .await
        .unwrap();
    let report = colorize(&mut stripped, &mut stripped_out, &palette, &[0, 1])
        .await
        .unwrap();
    assert_eq!(report.unit, Some(ReadUnit::Row));
    assert_eq!(report.units, 5);

    tiled_out.select_directory(0).unwrap();
    stripped_out.select_directory(0).unwrap();
    assert_eq!(
        read_raster(&mut tiled_out).await,
        read_raster(&mut stripped_out).await
    );
}

// =============================================================================
// Selection errors
// =============================================================================

#[tokio::test]
async fn test_selection_checked_before_output_is_touched() {
    let palette = Palette::parse(PALETTE).unwrap();
    let mut source = channels();
    let mut sink = MemoryContainer::new("mem://rgb");

    assert!(matches!(
        colorize(&mut source, &mut sink, &palette, &[0, 3]).await,
        Err(EngineError::PaletteIndexOutOfRange {
            channel: 3,
            palette_len: 3
        })
    ));

    let short = Palette::parse("only 0 1 1 1 1\nsecond 0 1 1 1 1\n").unwrap();
    let mut two_channels = MemoryContainer::with_directories(
        "mem://two",
        vec![MemoryDirectory::tiled(4, 4, 4, 4, &[0u8; 16]).unwrap()],
    );
    assert!(matches!(
        colorize(&mut two_channels, &mut sink, &short, &[1]).await,
        Err(EngineError::ChannelOutOfRange {
            channel: 1,
            available: 1
        })
    ));

    assert_eq!(sink.directory_count(), 0);
}

#[tokio::test]
async fn test_empty_selection_writes_nothing() {
    let palette = Palette::parse(PALETTE).unwrap();
    let mut source = channels();
    let mut sink = MemoryContainer::new("mem://rgb");

    let report = colorize(&mut source, &mut sink, &palette, &[]).await.unwrap();
    assert_eq!(report.unit, None);
    assert_eq!(sink.directory_count(), 0);
}
