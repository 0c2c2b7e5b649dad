//! Tile traversal and per-tile channel I/O.
//!
//! This layer sits between the containers and the transforms:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               Transforms                │
//! └────────────────────┬────────────────────┘
//!                      │ typed sample buffers
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │  TileGrid        ChannelReader          │
//! │  (coordinates)   (aligned reads/writes) │
//! └────────────────────┬────────────────────┘
//!                      │ little-endian bytes
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │         TileSource / TileSink           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileGrid`]: row-major tile origins with ceiling-division counts
//! - [`ChannelReader`]: validates a set of directories once, then reads the
//!   same tile or row from each
//! - [`Sample`]: `u8` / `u16` decoding into reusable buffers

mod channel_io;
mod grid;
mod sample;

pub use channel_io::{write_row, write_tile, ChannelReader, ReadUnit};
pub use grid::{TileCoord, TileGrid, TileIter};
pub use sample::{decode_samples, encode_samples, swap_sample_bytes, Sample};
