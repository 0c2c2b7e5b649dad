use thiserror::Error;

use crate::tile::TileCoord;

/// I/O errors that can occur when reading raw bytes from a source
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from the local filesystem
    #[error("File error: {0}")]
    File(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Object not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(err.to_string()),
            _ => IoError::File(err.to_string()),
        }
    }
}

/// Malformed or unsupported TIFF structure, on read or write
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("Not a TIFF file: byte order mark 0x{0:04X} is neither II nor MM")]
    InvalidMagic(u16),

    #[error("Unknown TIFF version {0} (42 is classic TIFF, 43 is BigTIFF)")]
    InvalidVersion(u16),

    #[error("BigTIFF offsets must be 8 bytes wide, header says {0}")]
    InvalidBigTiffOffsetSize(u16),

    #[error("Truncated file: {required} bytes needed, {actual} available")]
    FileTooSmall { required: u64, actual: u64 },

    /// IFD offset outside the file
    #[error("IFD offset {0} is outside the file")]
    InvalidIfdOffset(u64),

    #[error("Required tag {0} is missing")]
    MissingTag(&'static str),

    /// Tag present with the wrong type or count
    #[error("Tag {tag} is invalid: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    #[error("Compression {0} is not supported, only uncompressed directories are")]
    UnsupportedCompression(String),

    #[error("Field type {0} is not supported")]
    UnknownFieldType(u16),

    /// Classic TIFF offsets are 32 bits
    #[error("Offset {0} does not fit in classic TIFF; write BigTIFF instead")]
    OffsetOverflow(u64),
}

/// Errors raised by tile containers (open, select, tag and tile operations)
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// Underlying byte I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF structure could not be parsed or written
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Directory index is past the end of the image
    #[error("Directory {index} out of range: image has {count} directories")]
    DirectoryOutOfRange { index: usize, count: usize },

    /// Tag needed to compute the layout is absent
    #[error("Missing tag: {0}")]
    MissingTag(&'static str),

    /// Tile origin is not on the tile grid or outside the image
    #[error("Tile ({x}, {y}) is not a valid tile origin")]
    TileOutOfRange { x: u32, y: u32 },

    /// Row index is past the image height
    #[error("Row {row} out of range: image height is {height}")]
    RowOutOfRange { row: u32, height: u32 },

    /// Operation does not match the directory organization
    #[error("Layout mismatch: {0}")]
    Layout(String),

    /// Fewer bytes were available than the tile or row needs
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Buffer handed to a write does not match the expected size
    #[error("Short write: expected {expected} bytes, got {actual}")]
    ShortWrite { expected: usize, actual: usize },

    /// Failure injected or reported by the backing store
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// The sink has already been finished
    #[error("Container is closed")]
    Closed,
}

/// Errors raised while parsing a palette file
#[derive(Debug, Clone, Error)]
pub enum PaletteError {
    /// The palette file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// A line does not have the expected fields
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Errors that abort a transform run
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Container failure outside of tile traversal (directory select, tags)
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Selected channel does not exist in the image
    #[error("Channel {channel} is out of range: image has {available} directories")]
    ChannelOutOfRange { channel: usize, available: usize },

    /// Selected channel has no palette entry
    #[error("Channel {channel} is out of range: palette has {palette_len} entries")]
    PaletteIndexOutOfRange { channel: usize, palette_len: usize },

    /// Image does not have the directory count the operation needs
    #[error("Expected {expected} directories, image has {actual}")]
    DirectoryCount { expected: usize, actual: usize },

    /// Directory layout is not one the operation accepts
    #[error("Directory {directory}: {reason}")]
    UnsupportedLayout { directory: usize, reason: String },

    /// Geometry with zero-sized dimensions
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Caller passed inconsistent arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Tile read or write failed
    #[error("Tile I/O failed at {coord} in directory {directory}: {source}")]
    TileIo {
        directory: usize,
        coord: TileCoord,
        source: ContainerError,
    },

    /// Scanline read or write failed
    #[error("Scanline I/O failed at row {row} in directory {directory}: {source}")]
    ScanlineIo {
        directory: usize,
        row: u32,
        source: ContainerError,
    },

    /// Channel buffers consumed together differ in size
    #[error("Buffer size mismatch in directory {directory}: expected {expected} bytes, got {actual}")]
    TileSizeMismatch {
        directory: usize,
        expected: usize,
        actual: usize,
    },

    /// Tile or row has no samples
    #[error("Directory {directory} has an empty tile")]
    EmptyTile { directory: usize },
}
