//! Object record reader.
//!
//! Records are visited through the handle map. Each one is located by its
//! byte offset in the object data, checked against its CRC and decoded
//! with the schema registered for its type code. Types without a schema
//! are skipped over their declared size unless the configuration asks for
//! a hard failure.

use indexmap::IndexMap;

use super::bit_reader::DwgBitReader;
use super::merged_reader::DwgMergedReader;
use super::stream_reader::DwgStreamReader;
use crate::error::{DwgError, Result, SectionContext};
use crate::io::dwg::configuration::DwgReaderConfiguration;
use crate::io::dwg::constants::{section_names, CRC16_SEED};
use crate::io::dwg::crc;
use crate::io::dwg::version_codec::VersionCodec;
use crate::notification::{NotificationCollection, NotificationType};
use crate::objects::{FieldKind, FieldValue, ObjectRegistry, RecordValue, DEFAULT_REGISTRY};

/// Prefix of a record: sizes and the byte range of its body.
#[derive(Debug, Clone, Copy)]
struct RecordFrame {
    body_start: usize,
    size: usize,
    handle_start: Option<u64>,
}

pub struct ObjectRecordReader<'a> {
    codec: VersionCodec,
    config: &'a DwgReaderConfiguration,
    registry: &'a ObjectRegistry,
    encoding: &'static encoding_rs::Encoding,
}

impl<'a> ObjectRecordReader<'a> {
    pub fn new(codec: VersionCodec, config: &'a DwgReaderConfiguration) -> Self {
        Self::with_registry(codec, config, &DEFAULT_REGISTRY)
    }

    pub fn with_registry(
        codec: VersionCodec,
        config: &'a DwgReaderConfiguration,
        registry: &'a ObjectRegistry,
    ) -> Self {
        Self {
            codec,
            config,
            registry,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static encoding_rs::Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Decode every record named by `handle_map`, in map order.
    ///
    /// Skipped records leave a notification and no value.
    pub fn read_all(
        &self,
        data: &[u8],
        handle_map: &IndexMap<u64, u64>,
        notifications: &mut NotificationCollection,
    ) -> Result<Vec<RecordValue>> {
        let mut reader = DwgBitReader::new(data.to_vec(), self.codec);
        let mut records = Vec::with_capacity(handle_map.len());
        for (&handle, &offset) in handle_map {
            if let Some(record) = self
                .read_record(&mut reader, handle, offset, notifications)
                .in_section(section_names::ACDB_OBJECTS, offset)?
            {
                records.push(record);
            }
        }
        tracing::debug!(
            decoded = records.len(),
            listed = handle_map.len(),
            "read object records"
        );
        Ok(records)
    }

    /// Decode the record at `offset`, expected to carry `handle`.
    pub fn read_record(
        &self,
        reader: &mut DwgBitReader,
        handle: u64,
        offset: u64,
        notifications: &mut NotificationCollection,
    ) -> Result<Option<RecordValue>> {
        let frame = self.read_frame(reader, offset)?;
        self.check_crc(reader, offset, &frame, notifications)?;

        let body = reader.get_ref()[frame.body_start..frame.body_start + frame.size].to_vec();
        let type_code = DwgBitReader::new(body.clone(), self.codec).read_object_type()?;

        let Some(schema) = self.registry.get(type_code) else {
            if !self.config.skip_unknown_records {
                return Err(DwgError::UnimplementedRecordType { type_code });
            }
            notifications.notify_at(
                NotificationType::NotImplemented,
                section_names::ACDB_OBJECTS,
                offset,
                format!("record type {:#X} of handle {:#X} skipped", type_code, handle),
            );
            return Ok(None);
        };

        let handle_start = match frame.handle_start {
            Some(start) => start,
            None => {
                let mut peek = DwgBitReader::new(body.clone(), self.codec);
                peek.read_object_type()?;
                peek.read_raw_ulong()? as u64
            }
        };

        let mut body_reader =
            DwgMergedReader::with_encoding(body, self.codec, handle_start, self.encoding)?;
        body_reader.read_object_type()?;
        if frame.handle_start.is_none() {
            body_reader.read_raw_ulong()?;
        }
        let own_handle = body_reader.read_handle_reference_on_main()?;
        if own_handle != handle {
            let error = DwgError::InvalidFormat(format!(
                "record at {:#X} carries handle {:#X}, the map says {:#X}",
                offset, own_handle, handle
            ));
            self.config
                .recover(error, section_names::ACDB_OBJECTS, offset, notifications)?;
        }

        let fields = schema
            .fields
            .iter()
            .map(|spec| read_field(&mut body_reader, spec.kind, own_handle))
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(handle = own_handle, record = %schema.name, offset, "read object record");
        Ok(Some(RecordValue::new(type_code, own_handle, fields)))
    }

    fn read_frame(&self, reader: &mut DwgBitReader, offset: u64) -> Result<RecordFrame> {
        if offset >= reader.stream_length() {
            return Err(DwgError::InvalidFormat(format!(
                "record offset {:#X} is past the {} byte object data",
                offset,
                reader.stream_length()
            )));
        }
        reader.set_position(offset);
        let size = reader.read_modular_short()?;
        let handle_bits = if self.codec.handle_stream_size {
            Some(reader.read_modular_char()?)
        } else {
            None
        };
        let body_start = reader.position();

        // Body and CRC must both fit
        if body_start.saturating_add(size).saturating_add(2) > reader.stream_length() {
            return Err(DwgError::InvalidFormat(format!(
                "record of {} bytes at {:#X} overruns the object data",
                size, offset
            )));
        }
        let handle_start = match handle_bits {
            Some(bits) => Some((size * 8).checked_sub(bits).ok_or_else(|| {
                DwgError::InvalidFormat(format!(
                    "handle stream of {} bits exceeds a {} byte record",
                    bits, size
                ))
            })?),
            None => None,
        };
        Ok(RecordFrame {
            body_start: body_start as usize,
            size: size as usize,
            handle_start,
        })
    }

    fn check_crc(
        &self,
        reader: &DwgBitReader,
        offset: u64,
        frame: &RecordFrame,
        notifications: &mut NotificationCollection,
    ) -> Result<()> {
        let crc_at = frame.body_start + frame.size;
        let data = reader.get_ref();
        let stored = u16::from_le_bytes([data[crc_at], data[crc_at + 1]]);
        let actual = crc::crc8(CRC16_SEED, &data[offset as usize..crc_at]);
        if stored != actual {
            let error = DwgError::ChecksumMismatch {
                section: section_names::ACDB_OBJECTS.to_string(),
                expected: stored as u32,
                actual: actual as u32,
            };
            self.config
                .recover(error, section_names::ACDB_OBJECTS, crc_at as u64, notifications)?;
        }
        Ok(())
    }
}

fn read_field(reader: &mut DwgMergedReader, kind: FieldKind, own_handle: u64) -> Result<FieldValue> {
    Ok(match kind {
        FieldKind::Bit => FieldValue::Bit(reader.read_bit()?),
        FieldKind::BitShort => FieldValue::BitShort(reader.read_bit_short()?),
        FieldKind::BitLong => FieldValue::BitLong(reader.read_bit_long()?),
        FieldKind::BitLongLong => FieldValue::BitLongLong(reader.read_bit_long_long()?),
        FieldKind::BitDouble => FieldValue::BitDouble(reader.read_bit_double()?),
        FieldKind::RawDouble => FieldValue::RawDouble(reader.read_raw_double()?),
        FieldKind::Point2 => FieldValue::Point2(reader.read_2raw_double()?),
        FieldKind::Point3 => FieldValue::Point3(reader.read_3bit_double()?),
        FieldKind::Text => FieldValue::Text(reader.read_variable_text()?),
        FieldKind::Extrusion => FieldValue::Extrusion(reader.read_bit_extrusion()?),
        FieldKind::Thickness => FieldValue::Thickness(reader.read_bit_thickness()?),
        FieldKind::Handle(_) => FieldValue::Handle(reader.read_handle_reference(own_handle)?),
        FieldKind::RawChar => FieldValue::RawChar(reader.read_byte()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dwg::writer::ObjectRecordWriter;
    use crate::objects::{type_codes, RecordSchema};
    use crate::types::{DwgVersion, Vector2, Vector3};

    fn samples() -> Vec<RecordValue> {
        let mut text = DEFAULT_REGISTRY.get(type_codes::TEXT).unwrap().instantiate(0x41);
        text.fields[2] = FieldValue::Point2(Vector2::new(1.5, -2.0));
        text.fields[5] = FieldValue::BitDouble(2.5);
        text.fields[6] = FieldValue::Text("Grüße".into());
        text.fields[8] = FieldValue::Handle(0x10);
        text.fields[9] = FieldValue::Handle(0x11);

        let mut layer = DEFAULT_REGISTRY.get(type_codes::LAYER).unwrap().instantiate(0x0F);
        layer.fields[0] = FieldValue::Text("Walls".into());
        layer.fields[3] = FieldValue::BitShort(7);
        layer.fields[4] = FieldValue::Handle(0x02);
        layer.fields[5] = FieldValue::Handle(0x16);

        let circle = RecordValue::new(
            type_codes::CIRCLE,
            0x1_0000,
            vec![
                FieldValue::Point3(Vector3::new(3.0, 4.0, 0.0)),
                FieldValue::BitDouble(1.0),
                FieldValue::Thickness(0.25),
                FieldValue::Extrusion(Vector3::new(0.0, 1.0, 0.0)),
                FieldValue::Handle(0x0F),
            ],
        );
        vec![text, layer, circle]
    }

    fn write_all(codec: VersionCodec, records: &[RecordValue]) -> (Vec<u8>, IndexMap<u64, u64>) {
        let mut writer = ObjectRecordWriter::new(codec);
        for record in records {
            writer.write(record).unwrap();
        }
        let map = writer.records().iter().map(|r| (r.handle, r.offset)).collect();
        (writer.into_parts().0, map)
    }

    #[test]
    fn test_roundtrip_every_revision() {
        let config = DwgReaderConfiguration::default();
        for version in DwgVersion::ALL {
            let codec = VersionCodec::for_version(version);
            let (data, map) = write_all(codec, &samples());
            let mut notes = NotificationCollection::new();
            let back = ObjectRecordReader::new(codec, &config)
                .read_all(&data, &map, &mut notes)
                .unwrap();
            assert_eq!(back, samples(), "{}", version);
            assert!(notes.is_empty());
        }
    }

    #[test]
    fn test_unknown_record_skipped() {
        let mut registry = ObjectRegistry::with_defaults();
        registry.register(RecordSchema::new(600, "CUSTOM").field("value", FieldKind::BitLong));
        let codec = VersionCodec::for_version(DwgVersion::AC1024);

        let mut writer = ObjectRecordWriter::with_registry(codec, &registry);
        writer.write(&RecordValue::new(600, 0x20, vec![FieldValue::BitLong(99)])).unwrap();
        writer.write(&samples()[1]).unwrap();
        let map: IndexMap<u64, u64> = writer.records().iter().map(|r| (r.handle, r.offset)).collect();
        let data = writer.into_parts().0;

        let config = DwgReaderConfiguration::default();
        let mut notes = NotificationCollection::new();
        let back = ObjectRecordReader::new(codec, &config)
            .read_all(&data, &map, &mut notes)
            .unwrap();
        assert_eq!(back, vec![samples()[1].clone()]);
        assert!(notes.has_type(NotificationType::NotImplemented));

        let strict = DwgReaderConfiguration::default().with_skip_unknown_records(false);
        let err = ObjectRecordReader::new(codec, &strict)
            .read_all(&data, &map, &mut NotificationCollection::new())
            .unwrap_err();
        assert!(matches!(err.kind(), DwgError::UnimplementedRecordType { type_code: 600 }));
    }

    #[test]
    fn test_corrupt_crc() {
        let codec = VersionCodec::for_version(DwgVersion::AC1015);
        let (mut data, map) = write_all(codec, &samples()[..1]);
        let last = data.len() - 1;
        data[last] ^= 0x55;

        let err = ObjectRecordReader::new(codec, &DwgReaderConfiguration::default())
            .read_all(&data, &map, &mut NotificationCollection::new())
            .unwrap_err();
        assert!(matches!(err.kind(), DwgError::ChecksumMismatch { .. }));

        let lenient = DwgReaderConfiguration::lenient();
        let mut notes = NotificationCollection::new();
        let back = ObjectRecordReader::new(codec, &lenient)
            .read_all(&data, &map, &mut notes)
            .unwrap();
        assert_eq!(back.len(), 1);
        assert!(notes.has_type(NotificationType::Warning));
    }

    #[test]
    fn test_offset_out_of_range() {
        let codec = VersionCodec::for_version(DwgVersion::AC1018);
        let (data, _) = write_all(codec, &samples());
        let map = IndexMap::from([(0x41u64, data.len() as u64 + 10)]);
        let err = ObjectRecordReader::new(codec, &DwgReaderConfiguration::default())
            .read_all(&data, &map, &mut NotificationCollection::new())
            .unwrap_err();
        assert!(matches!(err.kind(), DwgError::InvalidFormat(_)));
    }
}
