//! LZ77 page compression.
//!
//! The DWG format uses two LZ77 variants:
//! - **AC18** (R2004, R2010, R2013, R2018): opcode stream terminated by 0x11
//! - **AC21** (R2007): nibble opcodes with inline literal counts
//!
//! Both compressors share [`MatchFinder`], an owned hash table built per
//! call, so independent pages can be compressed on separate threads.

pub mod lz77_ac18;
pub mod lz77_ac21;

pub use lz77_ac18::{Lz77Ac18Compressor, Lz77Ac18Decompressor};
pub use lz77_ac21::{Lz77Ac21Compressor, Lz77Ac21Decompressor};

use crate::error::{DwgError, Result};
use crate::io::dwg::version_codec::PageCodec;

/// Trait for compressing data.
pub trait Compressor: Send + Sync {
    /// Compress `total_size` bytes of `source` starting at `offset`.
    fn compress(&self, source: &[u8], offset: usize, total_size: usize) -> Result<Vec<u8>>;
}

/// Trait for decompressing data.
pub trait Decompressor: Send + Sync {
    /// Decompress `source`, which must expand to exactly `decompressed_size`
    /// bytes.
    fn decompress(&self, source: &[u8], decompressed_size: usize) -> Result<Vec<u8>>;
}

pub fn compressor_for(codec: PageCodec) -> Box<dyn Compressor> {
    match codec {
        PageCodec::Ac18 => Box::new(Lz77Ac18Compressor),
        PageCodec::Ac21 => Box::new(Lz77Ac21Compressor),
    }
}

pub fn decompressor_for(codec: PageCodec) -> Box<dyn Decompressor> {
    match codec {
        PageCodec::Ac18 => Box::new(Lz77Ac18Decompressor),
        PageCodec::Ac21 => Box::new(Lz77Ac21Decompressor),
    }
}

/// Slice `total_size` bytes at `offset`, failing instead of panicking.
pub(crate) fn source_window(source: &[u8], offset: usize, total_size: usize) -> Result<&[u8]> {
    offset
        .checked_add(total_size)
        .and_then(|end| source.get(offset..end))
        .ok_or_else(|| {
            DwgError::Compression(format!(
                "window {}+{} exceeds a {} byte source",
                offset,
                total_size,
                source.len()
            ))
        })
}

/// Largest back-reference distance either compressor emits.
pub const MAX_MATCH_DISTANCE: usize = 0xBFFF;

const TABLE_SIZE: usize = 0x8000;
const EMPTY: usize = usize::MAX;

/// A back-reference candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub distance: usize,
    pub length: usize,
}

/// Last-seen positions of 4-byte windows, hashed into 15 bits.
pub struct MatchFinder {
    table: Vec<usize>,
    max_distance: usize,
    max_length: usize,
}

impl MatchFinder {
    pub fn new(max_distance: usize, max_length: usize) -> Self {
        Self {
            table: vec![EMPTY; TABLE_SIZE],
            max_distance,
            max_length,
        }
    }

    fn hash(window: &[u8]) -> usize {
        let v = ((window[3] as u32) << 6) ^ window[2] as u32;
        let v = (v << 5) ^ window[1] as u32;
        let v = (v << 5) ^ window[0] as u32;
        ((v + (v >> 5)) & 0x7FFF) as usize
    }

    /// Record `pos` without looking for a match.
    pub fn insert(&mut self, data: &[u8], pos: usize) {
        if let Some(window) = data.get(pos..pos + 4) {
            self.table[Self::hash(window)] = pos;
        }
    }

    /// Longest match of at least 3 bytes for the window at `pos` against
    /// its last occurrence, then record `pos`.
    ///
    /// Matches may overlap `pos`; the decoders copy byte by byte.
    pub fn find(&mut self, data: &[u8], pos: usize) -> Option<Match> {
        let window = data.get(pos..pos + 4)?;
        let slot = Self::hash(window);
        let candidate = self.table[slot];
        self.table[slot] = pos;

        if candidate == EMPTY || candidate >= pos || pos - candidate > self.max_distance {
            return None;
        }
        let limit = (data.len() - pos).min(self.max_length);
        let length = data[candidate..]
            .iter()
            .zip(&data[pos..pos + limit])
            .take_while(|(a, b)| a == b)
            .count();
        (length >= 3).then_some(Match {
            distance: pos - candidate,
            length,
        })
    }
}

/// Copy `length` bytes from `distance` back in `out`, one byte at a time so
/// a run can feed itself.
pub(crate) fn copy_back(out: &mut Vec<u8>, distance: usize, length: usize) -> Result<()> {
    if distance == 0 || distance > out.len() {
        return Err(DwgError::Decompression(format!(
            "back-reference {} bytes behind a {} byte output",
            distance,
            out.len()
        )));
    }
    let start = out.len() - distance;
    out.reserve(length);
    for i in 0..length {
        let byte = out[start + i];
        out.push(byte);
    }
    Ok(())
}
