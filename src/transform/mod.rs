//! Tile-streaming transforms.
//!
//! Each transform walks a tile grid (or the rows of a stripped image),
//! pulls the same unit from every participating directory, computes one
//! output unit and writes it before moving on. Only one unit per channel is
//! ever held in memory.
//!
//! ```text
//!  source dir 0 ─┐
//!  source dir 1 ─┼─► ChannelReader ─► transform ─► write_tile ─► sink
//!  source dir n ─┘      (per tile)      (pure)
//! ```
//!
//! - [`quantile`]: drop low-information tiles, mirror everything else
//! - [`colorize`]: window each channel and blend into an RGB composite
//! - [`merge`]: interleave three grayscale planes into RGB

pub mod colorize;
pub mod merge;
pub mod quantile;

pub use colorize::{affine_window, colorize, combine_channels, ColorizeReport};
pub use merge::{interleave_rgb, merge_gray_planes_to_rgb, merge_gray_to_rgb, MergeReport};
pub use quantile::{
    compress, CompressReport, DirectoryReport, QuantileThresholds, TileDecision, TileStatistics,
    DIFF_THRESHOLD, MEAN_THRESHOLD,
};

use crate::container::{
    copy_tags, stage_tags, DirectoryLayout, ImageGeometry, TileSink, TileSource, DESCRIPTIVE_TAGS,
};
use crate::error::EngineError;
use crate::format::tiff::{Photometric, PlanarConfiguration, TagValue, TiffTag};

/// Pixel format a transform accepts for one input directory.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChannelRequirements {
    pub bits: &'static [u16],
    pub min_is_black: bool,
}

impl ChannelRequirements {
    /// Select `directory` and check it holds a single-sample channel in one
    /// of the accepted bit depths.
    pub fn check<S: TileSource + ?Sized>(
        &self,
        source: &mut S,
        directory: usize,
    ) -> Result<DirectoryLayout, EngineError> {
        let available = source.directory_count();
        if directory >= available {
            return Err(EngineError::ChannelOutOfRange {
                channel: directory,
                available,
            });
        }
        source.select_directory(directory)?;
        let layout = *source.layout()?;
        let unsupported = |reason: String| EngineError::UnsupportedLayout { directory, reason };

        if layout.image.samples_per_pixel != 1 {
            return Err(unsupported(format!(
                "expected 1 sample per pixel, found {}",
                layout.image.samples_per_pixel
            )));
        }
        if layout.image.planar != PlanarConfiguration::Contiguous {
            return Err(unsupported(
                "expected contiguous planar configuration".to_string(),
            ));
        }
        if !self.bits.contains(&layout.image.bits_per_sample) {
            return Err(unsupported(format!(
                "{} bits per sample not supported, expected one of {:?}",
                layout.image.bits_per_sample, self.bits
            )));
        }
        if self.min_is_black {
            let photometric = source
                .tag(TiffTag::PhotometricInterpretation)
                .and_then(TagValue::first_u64)
                .and_then(|v| u16::try_from(v).ok())
                .and_then(Photometric::from_u16);
            if photometric != Some(Photometric::MinIsBlack) {
                return Err(unsupported(format!(
                    "expected min-is-black photometric interpretation, found {:?}",
                    photometric
                )));
            }
        }
        Ok(layout)
    }
}

/// 8-bit RGB layout with the tiling (or row strips) of `input`.
pub(crate) fn rgb_layout(input: &DirectoryLayout) -> DirectoryLayout {
    DirectoryLayout {
        image: ImageGeometry {
            bits_per_sample: 8,
            samples_per_pixel: 3,
            planar: PlanarConfiguration::Contiguous,
            ..input.image
        },
        tile: input.tile,
        rows_per_strip: if input.is_tiled() {
            input.rows_per_strip
        } else {
            1
        },
    }
}

/// Stage an RGB output directory on `sink`.
///
/// Descriptive tags come from the source's current directory.
pub(crate) fn stage_rgb_directory<S, K>(
    source: &S,
    sink: &mut K,
    input: &DirectoryLayout,
) -> Result<DirectoryLayout, EngineError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
{
    copy_tags(source, sink, DESCRIPTIVE_TAGS)?;
    let layout = rgb_layout(input);
    stage_tags(sink, &layout.to_tags())?;
    sink.set_tag(
        TiffTag::PhotometricInterpretation,
        TagValue::Short(vec![Photometric::Rgb as u16]),
    )?;
    sink.set_tag(TiffTag::Compression, TagValue::Short(vec![1]))?;
    sink.set_tag(TiffTag::SampleFormat, TagValue::Short(vec![1; 3]))?;
    Ok(layout)
}
