//! Declarative tag duplication between directories.
//!
//! Output directories inherit tags from an input directory through a table
//! of [`TagCopyRule`]s consumed by [`copy_tags`]. A missing required tag is
//! worth a warning; a missing optional tag is expected and stays silent.

use serde::Serialize;
use tracing::warn;

use crate::error::ContainerError;
use crate::format::tiff::TiffTag;

use super::{TileSink, TileSource};

/// One row of a copy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagCopyRule {
    pub tag: TiffTag,
    pub required: bool,
}

const fn required(tag: TiffTag) -> TagCopyRule {
    TagCopyRule { tag, required: true }
}

const fn optional(tag: TiffTag) -> TagCopyRule {
    TagCopyRule {
        tag,
        required: false,
    }
}

/// Tags a mirrored directory takes from its input: pixel format, geometry
/// and the descriptive metadata.
pub const DIRECTORY_TAGS: &[TagCopyRule] = &[
    required(TiffTag::ImageWidth),
    required(TiffTag::ImageLength),
    required(TiffTag::SampleFormat),
    required(TiffTag::PhotometricInterpretation),
    required(TiffTag::PlanarConfiguration),
    required(TiffTag::SamplesPerPixel),
    required(TiffTag::BitsPerSample),
    required(TiffTag::SubfileType),
    required(TiffTag::Compression),
    required(TiffTag::TileWidth),
    required(TiffTag::TileLength),
    optional(TiffTag::OSubfileType),
    optional(TiffTag::Threshholding),
    optional(TiffTag::ImageDescription),
    optional(TiffTag::FillOrder),
    optional(TiffTag::CellWidth),
    optional(TiffTag::CellLength),
    optional(TiffTag::Make),
    optional(TiffTag::Model),
    optional(TiffTag::MinSampleValue),
    optional(TiffTag::MaxSampleValue),
    optional(TiffTag::GrayResponseUnit),
    optional(TiffTag::Software),
    optional(TiffTag::DateTime),
    optional(TiffTag::Artist),
    optional(TiffTag::HostComputer),
    optional(TiffTag::Copyright),
    optional(TiffTag::Orientation),
    optional(TiffTag::PageNumber),
    optional(TiffTag::XResolution),
    optional(TiffTag::YResolution),
    optional(TiffTag::ResolutionUnit),
    optional(TiffTag::DocumentName),
    optional(TiffTag::PageName),
];

/// Descriptive tags only, for outputs whose pixel format differs from the
/// input (RGB composites).
pub const DESCRIPTIVE_TAGS: &[TagCopyRule] = &[
    optional(TiffTag::SubfileType),
    optional(TiffTag::ImageDescription),
    optional(TiffTag::Make),
    optional(TiffTag::Model),
    optional(TiffTag::Software),
    optional(TiffTag::DateTime),
    optional(TiffTag::Artist),
    optional(TiffTag::HostComputer),
    optional(TiffTag::Copyright),
    optional(TiffTag::Orientation),
    optional(TiffTag::XResolution),
    optional(TiffTag::YResolution),
    optional(TiffTag::ResolutionUnit),
    optional(TiffTag::DocumentName),
    optional(TiffTag::PageName),
];

/// What a copy did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagCopyReport {
    pub copied: Vec<&'static str>,
    pub missing_required: Vec<&'static str>,
}

/// Copy every tag in `table` present on the source's current directory
/// onto the sink's current directory.
pub fn copy_tags<S, K>(
    source: &S,
    sink: &mut K,
    table: &[TagCopyRule],
) -> Result<TagCopyReport, ContainerError>
where
    S: TileSource + ?Sized,
    K: TileSink + ?Sized,
{
    let tags = source.tags()?;
    let mut report = TagCopyReport::default();

    for rule in table {
        match tags.get(rule.tag) {
            Some(value) => {
                sink.set_tag(rule.tag, value.clone())?;
                report.copied.push(rule.tag.name());
            }
            None if rule.required => {
                warn!(
                    tag = rule.tag.name(),
                    directory = source.current_directory(),
                    source = source.identifier(),
                    "Required tag missing, not copied"
                );
                report.missing_required.push(rule.tag.name());
            }
            None => {}
        }
    }

    Ok(report)
}
