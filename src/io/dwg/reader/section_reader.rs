//! Reads framed sections and checks their integrity.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{DwgError, Result, SectionContext, SentinelKind};
use crate::io::dwg::configuration::DwgReaderConfiguration;
use crate::io::dwg::section_frame::{SectionChecksum, SectionFrame};
use crate::io::dwg::version_codec::VersionCodec;
use crate::notification::NotificationCollection;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedSection {
    pub payload: Vec<u8>,
    /// Bytes the frame occupied, trailer included.
    pub consumed: usize,
}

pub struct DwgSectionReader<'a> {
    codec: VersionCodec,
    config: &'a DwgReaderConfiguration,
}

impl<'a> DwgSectionReader<'a> {
    pub fn new(codec: VersionCodec, config: &'a DwgReaderConfiguration) -> Self {
        Self { codec, config }
    }

    /// Unwrap the frame at the start of `data`.
    ///
    /// A wrong start sentinel always fails. Checksum and end sentinel
    /// mismatches go through the configured strictness.
    pub fn read(
        &self,
        frame: &SectionFrame,
        data: &[u8],
        notifications: &mut NotificationCollection,
    ) -> Result<FramedSection> {
        let mut cursor = Cursor::new(data);
        self.read_frame(frame, &mut cursor, notifications)
            .in_section(&frame.name, cursor.position())
    }

    fn read_frame(
        &self,
        frame: &SectionFrame,
        cursor: &mut Cursor<&[u8]>,
        notifications: &mut NotificationCollection,
    ) -> Result<FramedSection> {
        let data = *cursor.get_ref();

        let mut sentinel = [0u8; 16];
        read_exact(cursor, &mut sentinel)?;
        if sentinel != frame.start {
            return Err(DwgError::SentinelMismatch {
                section: frame.name.clone(),
                kind: SentinelKind::Start,
            });
        }

        let size_position = cursor.position();
        let mut size = read_u32(cursor)? as u64;
        if self.codec.section_high_size() {
            size |= (read_u32(cursor)? as u64) << 32;
        }

        let payload_start = cursor.position();
        let available = data.len() as u64 - payload_start;
        if size > available {
            return Err(DwgError::InvalidFormat(format!(
                "declared size {} exceeds the {} bytes left",
                size, available
            )));
        }
        let payload_end = payload_start + size;
        let payload = data[payload_start as usize..payload_end as usize].to_vec();
        cursor.set_position(payload_end);

        let stored = match frame.checksum {
            SectionChecksum::Crc16 => cursor
                .read_u16::<LittleEndian>()
                .map_err(|e| DwgError::from_read(e, payload_end))? as u32,
            SectionChecksum::Crc32 => read_u32(cursor)?,
        };
        let actual = frame
            .checksum
            .compute(&data[size_position as usize..payload_end as usize]);
        if stored != actual {
            let error = DwgError::ChecksumMismatch {
                section: frame.name.clone(),
                expected: stored,
                actual,
            };
            self.config
                .recover(error, &frame.name, payload_end, notifications)?;
        }

        let end_position = cursor.position();
        read_exact(cursor, &mut sentinel)?;
        if sentinel != frame.end {
            let error = DwgError::SentinelMismatch {
                section: frame.name.clone(),
                kind: SentinelKind::End,
            };
            self.config
                .recover(error, &frame.name, end_position, notifications)?;
        }

        let mut consumed = cursor.position() as usize;
        if frame.trailer && self.codec.section_trailer {
            consumed = (consumed + 8).min(data.len());
        }

        tracing::debug!(section = %frame.name, size, "read framed section");
        Ok(FramedSection { payload, consumed })
    }
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<()> {
    let position = cursor.position();
    cursor
        .read_exact(buf)
        .map_err(|e| DwgError::from_read(e, position))
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    let position = cursor.position();
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| DwgError::from_read(e, position))
}
