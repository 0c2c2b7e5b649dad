//! Sample types and byte conversion.
//!
//! Containers hand out pixel data as little-endian bytes. Transforms work on
//! typed sample buffers, decoded with [`decode_samples`] into caller-owned
//! vectors that are reused from tile to tile.

/// An unsigned integer sample type.
pub trait Sample: Copy + Default + Ord + Into<u64> + Send + Sync + 'static {
    /// Bytes per sample.
    const BYTES: usize;

    /// Bits per sample as written to the BitsPerSample tag.
    const BITS: u16 = (Self::BYTES * 8) as u16;

    /// Decode one sample from exactly `BYTES` little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Encode into exactly `BYTES` bytes.
    fn write_le(self, out: &mut [u8]);
}

impl Sample for u8 {
    const BYTES: usize = 1;

    #[inline]
    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl Sample for u16 {
    const BYTES: usize = 2;

    #[inline]
    fn from_le_slice(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
}

/// Replace the contents of `out` with the samples in `bytes`.
///
/// A trailing partial sample is ignored.
pub fn decode_samples<T: Sample>(bytes: &[u8], out: &mut Vec<T>) {
    out.clear();
    out.extend(bytes.chunks_exact(T::BYTES).map(T::from_le_slice));
}

/// Replace the contents of `out` with the encoding of `samples`.
pub fn encode_samples<T: Sample>(samples: &[T], out: &mut Vec<u8>) {
    out.clear();
    out.resize(samples.len() * T::BYTES, 0);
    for (sample, chunk) in samples.iter().zip(out.chunks_exact_mut(T::BYTES)) {
        sample.write_le(chunk);
    }
}

/// Reverse the byte order of each multi-byte sample in place.
///
/// Used to turn big-endian file data into the little-endian form the rest
/// of the crate expects. Sub-byte and 8-bit samples are left untouched.
pub fn swap_sample_bytes(bytes: &mut [u8], bits_per_sample: u16) {
    let width = match bits_per_sample {
        16 => 2,
        32 => 4,
        64 => 8,
        _ => return,
    };
    for chunk in bytes.chunks_exact_mut(width) {
        chunk.reverse();
    }
}
