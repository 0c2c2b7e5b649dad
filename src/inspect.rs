//! Per-directory summaries of an image.

use std::fmt;

use serde::Serialize;

use crate::container::{DirectoryLayout, TileSource};
use crate::error::ContainerError;
use crate::format::tiff::{Compression, Photometric, TiffTag};

/// Summary of one directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectorySummary {
    pub index: usize,
    pub layout: DirectoryLayout,
    pub compression: Option<String>,
    pub photometric: Option<String>,
    /// Tiles for tiled directories, rows otherwise
    pub chunks: usize,
    pub tag_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Summary of a whole image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSummary {
    pub identifier: String,
    pub directories: Vec<DirectorySummary>,
}

/// Walk every directory of `source` and summarize it.
///
/// Leaves the cursor on the last directory.
pub fn summarize<S: TileSource + ?Sized>(source: &mut S) -> Result<ImageSummary, ContainerError> {
    let mut directories = Vec::with_capacity(source.directory_count());
    for index in 0..source.directory_count() {
        source.select_directory(index)?;
        let tags = source.tags()?;
        let layout = *source.layout()?;

        let compression = tags.u16(TiffTag::Compression).map(|v| {
            Compression::from_u16(v)
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| format!("unknown ({})", v))
        });
        let photometric = tags.u16(TiffTag::PhotometricInterpretation).map(|v| {
            Photometric::from_u16(v)
                .map(|p| format!("{:?}", p))
                .unwrap_or_else(|| format!("unknown ({})", v))
        });
        let chunks = if layout.is_tiled() {
            layout.tile_count()
        } else {
            layout.image.height as usize
        };

        directories.push(DirectorySummary {
            index,
            layout,
            compression,
            photometric,
            chunks,
            tag_count: tags.len(),
            description: tags.ascii(TiffTag::ImageDescription).map(str::to_string),
        });
    }

    Ok(ImageSummary {
        identifier: source.identifier().to_string(),
        directories,
    })
}

impl fmt::Display for ImageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} directories", self.identifier, self.directories.len())?;
        for d in &self.directories {
            let image = &d.layout.image;
            write!(
                f,
                "  [{}] {}x{} {}-bit x{}",
                d.index, image.width, image.height, image.bits_per_sample, image.samples_per_pixel
            )?;
            match d.layout.tile {
                Some(tile) => write!(
                    f,
                    ", tiles {}x{} ({} tiles)",
                    tile.tile_width, tile.tile_height, d.chunks
                )?,
                None => write!(f, ", strips of {} rows", d.layout.rows_per_strip)?,
            }
            if let Some(ref photometric) = d.photometric {
                write!(f, ", {}", photometric)?;
            }
            if let Some(ref compression) = d.compression {
                write!(f, ", compression {}", compression)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
