//! # wsi-tilefx
//!
//! Tile-streaming transforms for multi-directory tiled TIFF images, where
//! each directory holds one acquisition channel.
//!
//! For every tile position the engine reads the matching tile from one or
//! more channel directories, computes an output tile and writes it straight
//! to the output image. Whole images are never loaded: memory stays bounded
//! by the number of participating channels times the tile size.
//!
//! ## Transforms
//!
//! - **Quantile filter** ([`transform::compress`]): replaces dark, flat tiles
//!   with zeros and mirrors everything else
//! - **Colorize** ([`transform::colorize`]): windows selected channels through
//!   a [`Palette`] and blends them into one RGB directory
//! - **Merge** ([`transform::merge_gray_to_rgb`]): interleaves three 8-bit
//!   grayscale planes into RGB
//!
//! ## Architecture
//!
//! - [`io`] - byte-range readers over local files and memory
//! - [`mod@format`] - TIFF/BigTIFF parsing, tag vocabulary and writing
//! - [`container`] - the [`TileSource`] / [`TileSink`] traits and their TIFF
//!   and in-memory implementations
//! - [`tile`] - tile grids, sample decoding and aligned channel reads
//! - [`transform`] - the three transforms
//! - [`palette`] - channel descriptors
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_tilefx::{compress, QuantileThresholds, TiffReader, TiffSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut source = TiffReader::open_path("channels.tif").await?;
//!     let mut sink = TiffSink::create("filtered.tif", false).await?;
//!
//!     let report = compress(&mut source, &mut sink, QuantileThresholds::default()).await?;
//!     sink.finish().await?;
//!
//!     println!("dropped {:.1}% of tiles", report.drop_rate * 100.0);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod format;
pub mod inspect;
pub mod io;
pub mod palette;
pub mod tile;
pub mod transform;

// Re-export commonly used types
pub use config::{
    Cli, ColorizeConfig, Command, CommonArgs, CompressConfig, InspectConfig, MergeConfig,
    MergeInput, OutputFormat,
};
pub use container::{
    copy_tags, DirectoryLayout, MemoryContainer, MemoryDirectory, SharedSource, TagCopyRule,
    TiffReader, TiffSink, TileSink, TileSource, DIRECTORY_TAGS,
};
pub use error::{ContainerError, EngineError, IoError, PaletteError, TiffError};
pub use format::tiff::{TagSet, TagValue, TiffTag};
pub use inspect::{summarize, DirectorySummary, ImageSummary};
pub use io::{BytesReader, LocalFileReader, RangeReader};
pub use palette::{ChannelDescriptor, Palette, Rgb};
pub use tile::{ChannelReader, Sample, TileCoord, TileGrid};
pub use transform::{
    colorize, compress, merge_gray_planes_to_rgb, merge_gray_to_rgb, ColorizeReport,
    CompressReport, MergeReport, QuantileThresholds,
};
