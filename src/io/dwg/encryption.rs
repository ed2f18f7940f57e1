//! Header masking for the paged container.
//!
//! Two XOR schemes protect the paged layout:
//!
//! 1. Data page headers are XORed word by word with
//!    `0x4164536B ^ stream_position`, the position being where the header
//!    starts in the file.
//! 2. The file header block at 0x80 is XORed with [`MAGIC_SEQUENCE`].
//!
//! Both are involutions: applying a mask twice restores the input.

use byteorder::{ByteOrder, LittleEndian};

use super::checksum::MAGIC_SEQUENCE;
use super::constants::paged;
use crate::error::{DwgError, Result};

/// Width of the start-offset field of a data page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetWidth {
    /// R2004 (28-byte header)
    Narrow,
    /// R2010 and later (32-byte header)
    Wide,
}

impl OffsetWidth {
    pub fn header_size(self) -> usize {
        match self {
            OffsetWidth::Narrow => 28,
            OffsetWidth::Wide => paged::DATA_PAGE_HEADER_SIZE,
        }
    }
}

/// XOR a page header in place with the position-derived key.
///
/// The key repeats every 4 bytes; a trailing partial word is masked with
/// the matching key prefix.
pub fn mask_page_header(header: &mut [u8], stream_position: u64) {
    let key = (paged::PAGE_HEADER_MASK ^ stream_position as u32).to_le_bytes();
    for (i, byte) in header.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

/// XOR `data` with the magic sequence, cycling every 256 bytes.
pub fn mask_with_magic(data: &mut [u8]) {
    for (byte, m) in data.iter_mut().zip(MAGIC_SEQUENCE.iter().cycle()) {
        *byte ^= m;
    }
}

/// Decoded fields of a data page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPageHeader {
    pub page_type: u32,
    pub decompressed_size: u32,
    pub compressed_size: u32,
    /// Bytes the page occupies in the file, header and padding included.
    pub page_size: u32,
    /// Offset of the page's content in the decompressed section.
    pub start_offset: u64,
    /// CRC-32 of the stored body.
    pub checksum: u32,
    pub reserved: u32,
}

impl DataPageHeader {
    pub fn new(
        decompressed_size: u32,
        compressed_size: u32,
        page_size: u32,
        start_offset: u64,
        checksum: u32,
    ) -> Self {
        Self {
            page_type: paged::PAGE_TYPE_DATA,
            decompressed_size,
            compressed_size,
            page_size,
            start_offset,
            checksum,
            reserved: 0,
        }
    }

    /// Serialize and mask for a header starting at `stream_position`.
    pub fn encode(&self, width: OffsetWidth, stream_position: u64) -> Result<Vec<u8>> {
        let mut out = vec![0u8; width.header_size()];
        LittleEndian::write_u32(&mut out[0..4], self.page_type);
        LittleEndian::write_u32(&mut out[4..8], self.decompressed_size);
        LittleEndian::write_u32(&mut out[8..12], self.compressed_size);
        LittleEndian::write_u32(&mut out[12..16], self.page_size);
        let tail = match width {
            OffsetWidth::Narrow => {
                let offset = u32::try_from(self.start_offset).map_err(|_| {
                    DwgError::InvalidFormat(format!(
                        "page offset {:#X} does not fit a 4-byte header field",
                        self.start_offset
                    ))
                })?;
                LittleEndian::write_u32(&mut out[16..20], offset);
                20
            }
            OffsetWidth::Wide => {
                LittleEndian::write_u64(&mut out[16..24], self.start_offset);
                24
            }
        };
        LittleEndian::write_u32(&mut out[tail..tail + 4], self.checksum);
        LittleEndian::write_u32(&mut out[tail + 4..tail + 8], self.reserved);
        mask_page_header(&mut out, stream_position);
        Ok(out)
    }

    /// Unmask and parse a header read at `stream_position`.
    pub fn decode(raw: &[u8], width: OffsetWidth, stream_position: u64) -> Result<Self> {
        let size = width.header_size();
        if raw.len() < size {
            return Err(DwgError::EndOfStream {
                offset_bits: (stream_position + raw.len() as u64) * 8,
            });
        }
        let mut buf = raw[..size].to_vec();
        mask_page_header(&mut buf, stream_position);

        let page_type = LittleEndian::read_u32(&buf[0..4]);
        if page_type != paged::PAGE_TYPE_DATA {
            return Err(DwgError::InvalidFormat(format!(
                "data page at {:#X} has type {:#010X}",
                stream_position, page_type
            )));
        }
        let (start_offset, tail) = match width {
            OffsetWidth::Narrow => (LittleEndian::read_u32(&buf[16..20]) as u64, 20),
            OffsetWidth::Wide => (LittleEndian::read_u64(&buf[16..24]), 24),
        };
        Ok(Self {
            page_type,
            decompressed_size: LittleEndian::read_u32(&buf[4..8]),
            compressed_size: LittleEndian::read_u32(&buf[8..12]),
            page_size: LittleEndian::read_u32(&buf[12..16]),
            start_offset,
            checksum: LittleEndian::read_u32(&buf[tail..tail + 4]),
            reserved: LittleEndian::read_u32(&buf[tail + 4..tail + 8]),
        })
    }
}
