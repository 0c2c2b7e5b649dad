//! Channel palettes for colorization.
//!
//! A palette file lists one channel per line, in directory order:
//!
//! ```text
//! # name   lower  upper  color
//! DAPI     500    8000   0 0 255
//! CD8,     300,   4000,  #00FF00
//! ```
//!
//! Fields are separated by commas and/or whitespace. The color is either
//! three decimal weights or a `#RRGGBB` hex triple; each weight is 0-255.
//! Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use serde::Serialize;

use crate::error::{EngineError, IoError, PaletteError};

/// Per-channel RGB weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    fn from_hex(token: &str) -> Option<Self> {
        let hex = token.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Display window and color of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDescriptor {
    pub name: String,
    /// Values at or below map to 0
    pub lower: u32,
    /// Values at or above map to 255
    pub upper: u32,
    pub color: Rgb,
}

impl ChannelDescriptor {
    pub fn new(name: impl Into<String>, lower: u32, upper: u32, color: Rgb) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
            color,
        }
    }
}

/// Ordered channel descriptors; position `i` describes directory `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Palette {
    channels: Vec<ChannelDescriptor>,
}

impl Palette {
    pub fn new(channels: Vec<ChannelDescriptor>) -> Self {
        Self { channels }
    }

    /// Read and parse a palette file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PaletteError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(path.display().to_string()),
            _ => IoError::File(format!("{}: {}", path.display(), e)),
        })?;
        Self::parse(&text)
    }

    /// Parse palette text.
    pub fn parse(text: &str) -> Result<Self, PaletteError> {
        let mut channels = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            channels.push(parse_line(trimmed, index + 1)?);
        }
        Ok(Self { channels })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChannelDescriptor> {
        self.channels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.channels.iter()
    }

    /// Descriptors for `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Vec<ChannelDescriptor>, EngineError> {
        indices
            .iter()
            .map(|&channel| {
                self.channels
                    .get(channel)
                    .cloned()
                    .ok_or(EngineError::PaletteIndexOutOfRange {
                        channel,
                        palette_len: self.channels.len(),
                    })
            })
            .collect()
    }
}

fn parse_line(line: &str, line_number: usize) -> Result<ChannelDescriptor, PaletteError> {
    let err = |message: String| PaletteError::Parse {
        line: line_number,
        message,
    };
    let fields: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    let (name, lower, upper, color) = match fields.as_slice() {
        [name, lower, upper, hex] => {
            let color = Rgb::from_hex(hex)
                .ok_or_else(|| err(format!("invalid color '{}', expected #RRGGBB", hex)))?;
            (name, lower, upper, color)
        }
        [name, lower, upper, r, g, b] => {
            let weight = |label: &str, token: &str| {
                token
                    .parse::<u8>()
                    .map_err(|_| err(format!("invalid {} weight '{}', expected 0-255", label, token)))
            };
            let color = Rgb::new(weight("red", r)?, weight("green", g)?, weight("blue", b)?);
            (name, lower, upper, color)
        }
        _ => {
            return Err(err(format!(
                "expected 'name lower upper r g b' or 'name lower upper #RRGGBB', got {} fields",
                fields.len()
            )))
        }
    };

    let bound = |label: &str, token: &str| {
        token
            .parse::<u32>()
            .map_err(|_| err(format!("invalid {} bound '{}'", label, token)))
    };

    Ok(ChannelDescriptor {
        name: name.to_string(),
        lower: bound("lower", lower)?,
        upper: bound("upper", upper)?,
        color,
    })
}
