//! `AcDb:Handles` reader.
//!
//! The section is a series of chunks, each holding delta-encoded
//! handle/offset pairs; a chunk whose size field reads 2 ends the map.

use indexmap::IndexMap;

use super::bit_reader::DwgBitReader;
use super::stream_reader::DwgStreamReader;
use crate::error::{DwgError, Result, SectionContext};
use crate::io::dwg::configuration::DwgReaderConfiguration;
use crate::io::dwg::constants::{section_names, CRC16_SEED, HANDLE_MAP_MAX_CHUNK};
use crate::io::dwg::crc;
use crate::io::dwg::version_codec::VersionCodec;
use crate::notification::{NotificationCollection, NotificationType};

pub struct DwgHandleReader<'a> {
    codec: VersionCodec,
    config: &'a DwgReaderConfiguration,
}

impl<'a> DwgHandleReader<'a> {
    pub fn new(codec: VersionCodec, config: &'a DwgReaderConfiguration) -> Self {
        Self { codec, config }
    }

    /// Read the handle → offset map in file order.
    pub fn read(
        &self,
        data: &[u8],
        notifications: &mut NotificationCollection,
    ) -> Result<IndexMap<u64, u64>> {
        let mut reader = DwgBitReader::new(data.to_vec(), self.codec);
        self.read_chunks(data, &mut reader, notifications)
            .in_section(section_names::HANDLES, reader.position())
    }

    fn read_chunks(
        &self,
        data: &[u8],
        reader: &mut DwgBitReader,
        notifications: &mut NotificationCollection,
    ) -> Result<IndexMap<u64, u64>> {
        let mut map = IndexMap::new();

        loop {
            let chunk_start = reader.position() as usize;
            let size = u16::from_be_bytes([reader.read_byte()?, reader.read_byte()?]) as usize;
            if size == 2 {
                break;
            }
            if size < 2 {
                return Err(DwgError::InvalidFormat(format!(
                    "handle map chunk of size {}",
                    size
                )));
            }

            if size > HANDLE_MAP_MAX_CHUNK {
                let error = DwgError::InvalidFormat(format!(
                    "handle map chunk of size {}, at most {} allowed",
                    size, HANDLE_MAP_MAX_CHUNK
                ));
                self.config
                    .recover(error, section_names::HANDLES, chunk_start as u64, notifications)?;
            }
            let data_end = chunk_start + size.min(HANDLE_MAP_MAX_CHUNK);
            let mut last_handle = 0u64;
            let mut last_offset = 0i64;

            while (reader.position() as usize) < data_end {
                let handle_delta = reader.read_modular_char()?;
                let offset_delta = reader.read_signed_modular_char()?;
                last_handle = last_handle.checked_add(handle_delta).ok_or_else(|| {
                    DwgError::InvalidFormat("handle map delta overflows".into())
                })?;
                last_offset = last_offset.checked_add(offset_delta).ok_or_else(|| {
                    DwgError::InvalidFormat("handle map offset overflows".into())
                })?;

                if handle_delta == 0 {
                    notifications.notify_at(
                        NotificationType::Warning,
                        section_names::HANDLES,
                        reader.position(),
                        format!("zero handle delta after {:#X} skipped", last_handle),
                    );
                    continue;
                }
                let offset = u64::try_from(last_offset).map_err(|_| {
                    DwgError::InvalidFormat(format!(
                        "handle {:#X} maps to negative offset {}",
                        last_handle, last_offset
                    ))
                })?;
                map.insert(last_handle, offset);
            }

            let crc_position = reader.position();
            let stored = u16::from_be_bytes([reader.read_byte()?, reader.read_byte()?]);
            let covered = data.get(chunk_start..crc_position as usize).ok_or_else(|| {
                DwgError::InvalidFormat("handle map chunk overruns the section".into())
            })?;
            let actual = crc::crc8(CRC16_SEED, covered);
            if stored != actual {
                let error = DwgError::ChecksumMismatch {
                    section: section_names::HANDLES.to_string(),
                    expected: stored as u32,
                    actual: actual as u32,
                };
                self.config
                    .recover(error, section_names::HANDLES, crc_position, notifications)?;
            }
            tracing::trace!(chunk_start, size, entries = map.len(), "handle map chunk");
        }

        tracing::debug!(entries = map.len(), "read handle map");
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::io::dwg::writer::DwgHandleWriter;
    use crate::types::DwgVersion;

    fn codec() -> VersionCodec {
        VersionCodec::for_version(DwgVersion::AC1015)
    }

    fn read(data: &[u8], config: &DwgReaderConfiguration) -> Result<(IndexMap<u64, u64>, NotificationCollection)> {
        let mut notes = NotificationCollection::new();
        let map = DwgHandleReader::new(codec(), config).read(data, &mut notes)?;
        Ok((map, notes))
    }

    #[test]
    fn test_empty_section() {
        let (map, _) = read(&[0x00, 0x02], &DwgReaderConfiguration::default()).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_roundtrip_across_chunks() {
        let source: BTreeMap<u64, u64> = (0..2500u64)
            .map(|i| (i * 3 + 1, 0x400 + (i * 7919) % 100_000))
            .collect();
        let data = DwgHandleWriter::new(codec()).write(&source).unwrap();
        let (map, notes) = read(&data, &DwgReaderConfiguration::default()).unwrap();
        assert!(notes.is_empty());
        assert_eq!(map.len(), source.len());
        for ((h1, o1), (h2, o2)) in source.iter().zip(map.iter()) {
            assert_eq!((h1, o1), (h2, o2));
        }
    }

    #[test]
    fn test_zero_delta_skipped() {
        // size 6: (0x05, +0x10), (0x00, +0x01), then terminator
        let mut chunk = vec![0x00, 0x06, 0x05, 0x10, 0x00, 0x01];
        let crc = crc::crc8(CRC16_SEED, &chunk);
        chunk.extend_from_slice(&crc.to_be_bytes());
        chunk.extend_from_slice(&[0x00, 0x02]);

        let (map, notes) = read(&chunk, &DwgReaderConfiguration::default()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&5), Some(&0x10));
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_bad_chunk_crc() {
        let source = BTreeMap::from([(1u64, 10u64), (2, 20)]);
        let mut data = DwgHandleWriter::new(codec()).write(&source).unwrap();
        data[6] ^= 0xFF;

        let err = read(&data, &DwgReaderConfiguration::default()).unwrap_err();
        assert!(matches!(err.kind(), DwgError::ChecksumMismatch { .. }));

        let (map, notes) = read(&data, &DwgReaderConfiguration::lenient()).unwrap();
        assert_eq!(map.len(), 2);
        assert!(notes.has_type(NotificationType::Warning));
    }

    #[test]
    fn test_oversized_chunk() {
        // Declared size 0x0900 exceeds the chunk limit; 2032 bytes of zero
        // deltas follow, then the CRC over the clamped chunk
        let mut data = vec![0x09, 0x00, 0x05, 0x10];
        data.resize(HANDLE_MAP_MAX_CHUNK, 0);
        let crc = crc::crc8(CRC16_SEED, &data);
        data.extend_from_slice(&crc.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x02]);

        let err = read(&data, &DwgReaderConfiguration::default()).unwrap_err();
        assert!(matches!(err.kind(), DwgError::InvalidFormat(_)));

        let (map, notes) = read(&data, &DwgReaderConfiguration::lenient()).unwrap();
        assert_eq!(map.get(&5), Some(&0x10));
        assert!(notes.has_type(NotificationType::Warning));
    }

    #[test]
    fn test_truncated_map() {
        let source = BTreeMap::from([(1u64, 10u64)]);
        let data = DwgHandleWriter::new(codec()).write(&source).unwrap();
        let err = read(&data[..4], &DwgReaderConfiguration::default()).unwrap_err();
        assert!(matches!(err.kind(), DwgError::EndOfStream { .. }));
    }
}
