//! Writes framed sections: sentinels, byte size, checksum.

use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{DwgError, Result};
use crate::io::dwg::section_frame::{SectionChecksum, SectionFrame};
use crate::io::dwg::version_codec::VersionCodec;

pub struct DwgSectionWriter {
    codec: VersionCodec,
}

impl DwgSectionWriter {
    pub fn new(codec: VersionCodec) -> Self {
        Self { codec }
    }

    /// Frame `payload`.
    ///
    /// The size is reserved, the payload written, and the true length
    /// patched in before the checksum is taken.
    pub fn write(&self, frame: &SectionFrame, payload: &[u8]) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::with_capacity(payload.len() + 48));
        out.write_all(&frame.start)?;

        let size_position = out.position();
        out.write_u32::<LittleEndian>(0)?;
        if self.codec.section_high_size() {
            out.write_u32::<LittleEndian>(0)?;
        }
        let payload_start = out.position();
        out.write_all(payload)?;
        let payload_end = out.position();

        let size = payload_end - payload_start;
        let (low, high) = self.size_words(&frame.name, size)?;
        out.seek(SeekFrom::Start(size_position))?;
        out.write_u32::<LittleEndian>(low)?;
        if let Some(high) = high {
            out.write_u32::<LittleEndian>(high)?;
        }
        out.seek(SeekFrom::Start(payload_end))?;

        let checksum = frame
            .checksum
            .compute(&out.get_ref()[size_position as usize..payload_end as usize]);
        match frame.checksum {
            SectionChecksum::Crc16 => out.write_u16::<LittleEndian>(checksum as u16)?,
            SectionChecksum::Crc32 => out.write_u32::<LittleEndian>(checksum)?,
        }

        out.write_all(&frame.end)?;
        if frame.trailer && self.codec.section_trailer {
            out.write_all(&[0u8; 8])?;
        }

        tracing::debug!(section = %frame.name, size, checksum, "framed section");
        Ok(out.into_inner())
    }

    /// Low RL of a payload size, and the high RL when the revision stores one.
    fn size_words(&self, name: &str, size: u64) -> Result<(u32, Option<u32>)> {
        if self.codec.section_high_size() {
            return Ok((size as u32, Some((size >> 32) as u32)));
        }
        let low = u32::try_from(size).map_err(|_| {
            DwgError::InvalidFormat(format!(
                "section {} payload of {} bytes does not fit an RL",
                name, size
            ))
        })?;
        Ok((low, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dwg::crc::crc8;
    use crate::types::DwgVersion;

    #[test]
    fn test_layout_r2000() {
        let writer = DwgSectionWriter::new(VersionCodec::for_version(DwgVersion::AC1015));
        let frame = SectionFrame::classes();
        let out = writer.write(&frame, &[0xAA, 0xBB, 0xCC]).unwrap();

        assert_eq!(out.len(), 16 + 4 + 3 + 2 + 16);
        assert_eq!(&out[..16], &frame.start);
        assert_eq!(&out[16..20], &3u32.to_le_bytes());
        assert_eq!(&out[20..23], &[0xAA, 0xBB, 0xCC]);
        let crc = crc8(0xC0C1, &out[16..23]);
        assert_eq!(crc, 0x49A0);
        assert_eq!(&out[23..25], &crc.to_le_bytes());
        assert_eq!(&out[25..], &frame.end);
    }

    #[test]
    fn test_high_word_and_trailer() {
        let codec = VersionCodec::with_maintenance(DwgVersion::AC1024, 6);
        let out = DwgSectionWriter::new(codec)
            .write(&SectionFrame::header(), &[1, 2])
            .unwrap();
        assert_eq!(out.len(), 16 + 8 + 2 + 2 + 16 + 8);
        assert_eq!(&out[20..24], &[0, 0, 0, 0]);
        assert_eq!(&out[out.len() - 8..], &[0u8; 8]);
    }

    #[test]
    fn test_size_words_split_above_four_gib() {
        let size = 0x1_2345_6789u64;
        let high = DwgSectionWriter::new(VersionCodec::with_maintenance(DwgVersion::AC1024, 6));
        assert_eq!(high.size_words("AcDb:Header", size).unwrap(), (0x2345_6789, Some(1)));
        assert_eq!(high.size_words("AcDb:Header", 7).unwrap(), (7, Some(0)));

        let low = DwgSectionWriter::new(VersionCodec::for_version(DwgVersion::AC1018));
        assert_eq!(low.size_words("AcDb:Header", 7).unwrap(), (7, None));
        assert!(matches!(
            low.size_words("AcDb:Header", size),
            Err(DwgError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_standalone_frame_has_no_trailer() {
        let codec = VersionCodec::for_version(DwgVersion::AC1018);
        let frame = SectionFrame::new("Custom", [1; 16], [2; 16]).with_checksum(SectionChecksum::Crc32);
        let out = DwgSectionWriter::new(codec).write(&frame, &[9; 5]).unwrap();
        assert_eq!(out.len(), 16 + 4 + 5 + 4 + 16);
    }
}
