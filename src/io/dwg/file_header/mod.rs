//! File header structures of both container layouts.
//!
//! - **Flat** (R13-R2000): a 0x61-byte header holding the locator table,
//!   followed by the sections.
//! - **Paged** (R2004, R2010+): a 0x100-byte header region whose block at
//!   0x80 is masked with the magic sequence, followed by compressed pages,
//!   the section map and the page map.

mod local_section_map;
mod section_descriptor;
mod section_locator;

pub use local_section_map::{non_zero_pages, DwgLocalSectionMap};
pub use section_descriptor::{decode_section_map, encode_section_map, DwgSectionDescriptor};
pub use section_locator::{DwgSectionLocatorRecord, LOCATOR_RECORD_SIZE};

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use encoding_rs::Encoding;
use indexmap::IndexMap;

use super::checksum;
use super::code_page::{self, encoding_from_code_page};
use super::configuration::DwgReaderConfiguration;
use super::constants::{paged, sentinels, CRC16_SEED};
use super::crc;
use super::encryption::mask_with_magic;
use crate::error::{DwgError, Result, SentinelKind};
use crate::notification::NotificationCollection;
use crate::types::DwgVersion;

const FILE_HEADER: &str = "file header";

/// A container's named sections, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct DwgFile {
    pub version: DwgVersion,
    pub maintenance_version: u8,
    pub code_page: u16,
    pub sections: IndexMap<String, Vec<u8>>,
}

impl DwgFile {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            version,
            maintenance_version: version.maintenance_version(),
            code_page: code_page::ANSI_1252,
            sections: IndexMap::new(),
        }
    }

    pub fn with_section(mut self, name: &str, data: Vec<u8>) -> Self {
        self.sections.insert(name.to_string(), data);
        self
    }

    pub fn section(&self, name: &str) -> Option<&[u8]> {
        self.sections.get(name).map(Vec::as_slice)
    }

    /// Encoding of single-byte text in the sections, from the header code page.
    pub fn encoding(&self) -> &'static Encoding {
        encoding_from_code_page(self.code_page)
    }
}

// ---------------------------------------------------------------------------
// Flat header
// ---------------------------------------------------------------------------

/// Size of the flat file header, end sentinel included.
pub const FLAT_HEADER_SIZE: usize = 0x61;
/// The CRC sits just before the 16-byte end sentinel.
const FLAT_CRC_OFFSET: usize = FLAT_HEADER_SIZE - 18;
/// Records that fit between the fixed fields and the CRC.
pub const MAX_LOCATOR_RECORDS: usize = (FLAT_CRC_OFFSET - 0x19) / LOCATOR_RECORD_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatFileHeader {
    pub version: DwgVersion,
    pub maintenance_version: u8,
    /// File offset of the preview, 0 when absent.
    pub preview_seeker: u32,
    pub code_page: u16,
    pub records: Vec<DwgSectionLocatorRecord>,
}

impl FlatFileHeader {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.records.len() > MAX_LOCATOR_RECORDS {
            return Err(DwgError::InvalidFormat(format!(
                "{} locator records, at most {} fit",
                self.records.len(),
                MAX_LOCATOR_RECORDS
            )));
        }
        let mut out = Vec::with_capacity(FLAT_HEADER_SIZE);
        out.write_all(&self.version.magic())?;
        out.write_all(&[0; 5])?;
        out.write_u8(self.maintenance_version)?;
        out.write_u8(1)?;
        out.write_u32::<LittleEndian>(self.preview_seeker)?;
        out.write_u8(0x1B)?;
        out.write_u8(0x19)?;
        out.write_u16::<LittleEndian>(self.code_page)?;
        out.write_u32::<LittleEndian>(self.records.len() as u32)?;
        for record in &self.records {
            record.write_to(&mut out)?;
        }
        out.resize(FLAT_CRC_OFFSET, 0);
        let crc = crc::crc8(CRC16_SEED, &out);
        out.write_u16::<LittleEndian>(crc)?;
        out.write_all(&sentinels::FILE_HEADER_END_AC15)?;
        Ok(out)
    }

    /// Parse the header at the start of `data`. A bad CRC or end sentinel
    /// is handled per the reader's strictness.
    pub fn decode(
        data: &[u8],
        config: &DwgReaderConfiguration,
        notifications: &mut NotificationCollection,
    ) -> Result<Self> {
        let version = DwgVersion::from_magic(data)?;
        if data.len() < FLAT_HEADER_SIZE {
            return Err(DwgError::EndOfStream {
                offset_bits: data.len() as u64 * 8,
            });
        }
        let header = &data[..FLAT_HEADER_SIZE];
        let mut cursor = Cursor::new(header);
        cursor.set_position(0x0B);
        let read = |cursor: &mut Cursor<&[u8]>| -> std::io::Result<(u8, u32, u16, u32)> {
            let maintenance = cursor.read_u8()?;
            let _one = cursor.read_u8()?;
            let preview = cursor.read_u32::<LittleEndian>()?;
            cursor.set_position(0x13);
            let code_page = cursor.read_u16::<LittleEndian>()?;
            let count = cursor.read_u32::<LittleEndian>()?;
            Ok((maintenance, preview, code_page, count))
        };
        let (maintenance_version, preview_seeker, code_page, count) =
            read(&mut cursor).map_err(|e| DwgError::from_read(e, cursor.position()))?;

        if count as usize > MAX_LOCATOR_RECORDS {
            return Err(DwgError::InvalidFormat(format!(
                "file header declares {} locator records",
                count
            )));
        }
        let records = (0..count)
            .map(|_| DwgSectionLocatorRecord::read_from(&mut cursor))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| DwgError::from_read(e, FLAT_CRC_OFFSET as u64))?;

        let stored = u16::from_le_bytes([header[FLAT_CRC_OFFSET], header[FLAT_CRC_OFFSET + 1]]);
        let actual = crc::crc8(CRC16_SEED, &header[..FLAT_CRC_OFFSET]);
        if stored != actual {
            let error = DwgError::ChecksumMismatch {
                section: FILE_HEADER.to_string(),
                expected: stored as u32,
                actual: actual as u32,
            };
            config.recover(error, FILE_HEADER, FLAT_CRC_OFFSET as u64, notifications)?;
        }
        if header[FLAT_CRC_OFFSET + 2..] != sentinels::FILE_HEADER_END_AC15 {
            let error = DwgError::SentinelMismatch {
                section: FILE_HEADER.to_string(),
                kind: SentinelKind::End,
            };
            config.recover(error, FILE_HEADER, FLAT_CRC_OFFSET as u64 + 2, notifications)?;
        }

        Ok(Self {
            version,
            maintenance_version,
            preview_seeker,
            code_page,
            records,
        })
    }
}

// ---------------------------------------------------------------------------
// Paged header
// ---------------------------------------------------------------------------

/// Fields of the masked block at 0x80.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagedFileHeader {
    pub last_page_id: u32,
    pub last_section_address: u64,
    pub second_header_address: u64,
    pub gap_amount: u32,
    pub section_amount: u32,
    pub page_map_id: u32,
    /// Absolute file position of the page map page.
    pub page_map_address: u64,
    pub section_map_id: u32,
    pub section_array_page_size: u32,
    pub gap_array_size: u32,
}

impl PagedFileHeader {
    /// Serialize, stamp the CRC-32 and mask with the magic sequence.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let page_map_offset = self
            .page_map_address
            .checked_sub(paged::DATA_START)
            .ok_or_else(|| {
                DwgError::InvalidFormat(format!(
                    "page map at {:#X} precedes the data pages",
                    self.page_map_address
                ))
            })?;

        let mut out = Vec::with_capacity(paged::ENCRYPTED_HEADER_SIZE);
        out.write_all(paged::FILE_ID)?;
        for value in [0u32, 0x6C, 0x04, 0, 0, 0, 1, self.last_page_id] {
            out.write_u32::<LittleEndian>(value)?;
        }
        out.write_u64::<LittleEndian>(self.last_section_address)?;
        out.write_u64::<LittleEndian>(self.second_header_address)?;
        out.write_u32::<LittleEndian>(self.gap_amount)?;
        out.write_u32::<LittleEndian>(self.section_amount)?;
        for value in [0x20u32, 0x80, 0x40, self.page_map_id] {
            out.write_u32::<LittleEndian>(value)?;
        }
        out.write_u64::<LittleEndian>(page_map_offset)?;
        out.write_u32::<LittleEndian>(self.section_map_id)?;
        out.write_u32::<LittleEndian>(self.section_array_page_size)?;
        out.write_u32::<LittleEndian>(self.gap_array_size)?;

        let crc = crc::crc32(0, &[out.as_slice(), &[0; 4]].concat());
        out.write_u32::<LittleEndian>(crc)?;
        mask_with_magic(&mut out);
        Ok(out)
    }

    /// Unmask and parse the block, checking the file id and CRC-32.
    pub fn decode(
        raw: &[u8],
        config: &DwgReaderConfiguration,
        notifications: &mut NotificationCollection,
    ) -> Result<Self> {
        if raw.len() < paged::ENCRYPTED_HEADER_SIZE {
            return Err(DwgError::EndOfStream {
                offset_bits: (0x80 + raw.len() as u64) * 8,
            });
        }
        let mut block = raw[..paged::ENCRYPTED_HEADER_SIZE].to_vec();
        mask_with_magic(&mut block);

        if &block[..12] != paged::FILE_ID {
            return Err(DwgError::InvalidFormat(
                "paged file header does not carry the file id".into(),
            ));
        }
        let crc_at = paged::ENCRYPTED_HEADER_SIZE - 4;
        let stored = u32::from_le_bytes([block[crc_at], block[crc_at + 1], block[crc_at + 2], block[crc_at + 3]]);
        block[crc_at..].fill(0);
        let actual = crc::crc32(0, &block);
        if stored != actual {
            let error = DwgError::ChecksumMismatch {
                section: FILE_HEADER.to_string(),
                expected: stored,
                actual,
            };
            config.recover(error, FILE_HEADER, 0x80 + crc_at as u64, notifications)?;
        }

        let mut cursor = Cursor::new(&block[..]);
        let read = |c: &mut Cursor<&[u8]>| -> std::io::Result<Self> {
            c.set_position(0x28);
            let last_page_id = c.read_u32::<LittleEndian>()?;
            let last_section_address = c.read_u64::<LittleEndian>()?;
            let second_header_address = c.read_u64::<LittleEndian>()?;
            let gap_amount = c.read_u32::<LittleEndian>()?;
            let section_amount = c.read_u32::<LittleEndian>()?;
            c.set_position(0x50);
            let page_map_id = c.read_u32::<LittleEndian>()?;
            let page_map_offset = c.read_u64::<LittleEndian>()?;
            Ok(Self {
                last_page_id,
                last_section_address,
                second_header_address,
                gap_amount,
                section_amount,
                page_map_id,
                page_map_address: page_map_offset.saturating_add(paged::DATA_START),
                section_map_id: c.read_u32::<LittleEndian>()?,
                section_array_page_size: c.read_u32::<LittleEndian>()?,
                gap_array_size: c.read_u32::<LittleEndian>()?,
            })
        };
        read(&mut cursor).map_err(|e| DwgError::from_read(e, 0x80 + cursor.position()))
    }
}

/// Write the 0x80-byte preamble of a paged file. `preview_address` points
/// past the header of the first preview page, 0 without a preview.
pub fn encode_paged_preamble(
    version: DwgVersion,
    maintenance_version: u8,
    code_page: u16,
    preview_address: u32,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(0x80);
    out.write_all(&version.magic())?;
    out.write_all(&[0; 5])?;
    out.write_u8(maintenance_version)?;
    out.write_u8(3)?;
    out.write_u32::<LittleEndian>(preview_address)?;
    out.write_u8(0x21)?;
    out.write_u8(maintenance_version)?;
    out.write_u16::<LittleEndian>(code_page)?;
    out.resize(0x28, 0);
    out.write_u32::<LittleEndian>(0x80)?;
    out.resize(0x80, 0);
    Ok(out)
}

/// Maintenance byte and code page of any container.
pub fn read_preamble(data: &[u8]) -> Result<(DwgVersion, u8, u16)> {
    let version = DwgVersion::from_magic(data)?;
    if data.len() < 0x15 {
        return Err(DwgError::EndOfStream {
            offset_bits: data.len() as u64 * 8,
        });
    }
    Ok((version, data[0x0B], u16::from_le_bytes([data[0x13], data[0x14]])))
}

// ---------------------------------------------------------------------------
// System pages and the page map
// ---------------------------------------------------------------------------

/// Header of a section map or page map page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemPageHeader {
    pub page_type: u32,
    pub decompressed_size: u32,
    pub compressed_size: u32,
    pub compression_type: u32,
    pub checksum: u32,
}

impl SystemPageHeader {
    /// Header for `body` (already compressed), with the checksum chained
    /// from the zeroed header over the body.
    pub fn for_body(page_type: u32, decompressed_size: u32, compression_type: u32, body: &[u8]) -> Self {
        let mut header = Self {
            page_type,
            decompressed_size,
            compressed_size: body.len() as u32,
            compression_type,
            checksum: 0,
        };
        header.checksum = header.compute_checksum(body);
        header
    }

    pub fn compute_checksum(&self, body: &[u8]) -> u32 {
        let zeroed = Self { checksum: 0, ..*self };
        checksum::adler32(checksum::adler32(0, &zeroed.to_bytes()), body)
    }

    pub fn to_bytes(&self) -> [u8; paged::SYSTEM_PAGE_HEADER_SIZE] {
        let mut out = [0u8; paged::SYSTEM_PAGE_HEADER_SIZE];
        for (i, value) in [
            self.page_type,
            self.decompressed_size,
            self.compressed_size,
            self.compression_type,
            self.checksum,
        ]
        .into_iter()
        .enumerate()
        {
            out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(raw: &[u8], position: u64) -> Result<Self> {
        if raw.len() < paged::SYSTEM_PAGE_HEADER_SIZE {
            return Err(DwgError::EndOfStream {
                offset_bits: (position + raw.len() as u64) * 8,
            });
        }
        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        Ok(Self {
            page_type: word(0),
            decompressed_size: word(4),
            compressed_size: word(8),
            compression_type: word(12),
            checksum: word(16),
        })
    }
}

/// One page map entry: page number and the bytes the page occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMapEntry {
    pub number: u32,
    pub size: u32,
}

pub fn encode_page_map(entries: &[PageMapEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(entries.len() * 8);
    for entry in entries {
        out.write_u32::<LittleEndian>(entry.number)?;
        out.write_u32::<LittleEndian>(entry.size)?;
    }
    Ok(out)
}

/// Resolve every page to its file position; pages follow each other from
/// 0x100 in map order.
pub fn decode_page_map(data: &[u8]) -> Result<IndexMap<u32, (u64, u32)>> {
    if data.len() % 8 != 0 {
        return Err(DwgError::InvalidFormat(format!(
            "page map of {} bytes is not a whole number of entries",
            data.len()
        )));
    }
    let mut pages = IndexMap::new();
    let mut address = paged::DATA_START;
    for entry in data.chunks_exact(8) {
        let number = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
        let size = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]);
        pages.insert(number, (address, size));
        address += size as u64;
    }
    Ok(pages)
}
