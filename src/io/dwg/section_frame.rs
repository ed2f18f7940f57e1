//! Sentinel and checksum framing shared by section readers and writers.
//!
//! ```text
//! | start sentinel | RL size | [RL high size] | payload | checksum | end sentinel | [8 x 0] |
//! ```
//!
//! The checksum covers the size field(s) and the payload.

use super::constants::{section_names, sentinels};
use super::crc;
use crate::error::{DwgError, Result};

/// Checksum stored after a framed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionChecksum {
    /// 16-bit CRC seeded with 0xC0C1, stored LE.
    Crc16,
    /// CRC-32 seeded with 0, stored LE.
    Crc32,
}

impl SectionChecksum {
    pub fn size(self) -> usize {
        match self {
            SectionChecksum::Crc16 => 2,
            SectionChecksum::Crc32 => 4,
        }
    }

    pub fn compute(self, data: &[u8]) -> u32 {
        match self {
            SectionChecksum::Crc16 => crc::crc8(super::constants::CRC16_SEED, data) as u32,
            SectionChecksum::Crc32 => crc::crc32(0, data),
        }
    }
}

/// How one kind of section is framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFrame {
    pub name: String,
    pub start: [u8; 16],
    pub end: [u8; 16],
    pub checksum: SectionChecksum,
    /// Followed by 8 zero bytes in paged files.
    pub trailer: bool,
}

impl SectionFrame {
    /// A stand-alone frame with a 16-bit CRC and no trailer.
    pub fn new(name: impl Into<String>, start: [u8; 16], end: [u8; 16]) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            checksum: SectionChecksum::Crc16,
            trailer: false,
        }
    }

    /// Frame of a named section with published sentinels.
    pub fn for_section(name: &str) -> Result<Self> {
        match name {
            section_names::HEADER => Ok(Self::header()),
            section_names::CLASSES => Ok(Self::classes()),
            section_names::PREVIEW => Ok(Self::preview()),
            _ => Err(DwgError::InvalidFormat(format!(
                "section {} has no published sentinels",
                name
            ))),
        }
    }

    pub fn header() -> Self {
        Self::known(section_names::HEADER, &sentinels::HEADER_START, &sentinels::HEADER_END, true)
    }

    pub fn classes() -> Self {
        Self::known(section_names::CLASSES, &sentinels::CLASSES_START, &sentinels::CLASSES_END, true)
    }

    pub fn preview() -> Self {
        Self::known(section_names::PREVIEW, &sentinels::PREVIEW_START, &sentinels::PREVIEW_END, false)
    }

    fn known(name: &str, start: &[u8; 16], end: &[u8; 16], trailer: bool) -> Self {
        let mut frame = Self::new(name, *start, *end);
        frame.trailer = trailer;
        frame
    }

    pub fn with_checksum(mut self, checksum: SectionChecksum) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_trailer(mut self, trailer: bool) -> Self {
        self.trailer = trailer;
        self
    }
}
