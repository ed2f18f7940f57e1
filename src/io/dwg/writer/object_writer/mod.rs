//! Object record writer.
//!
//! Each record is serialized into a contiguous object-data buffer as
//!
//! ```text
//! | MS size | MC handle bits (R2010+) | body | CRC-16 |
//! ```
//!
//! where the body starts with the object type, the RL main size in bits
//! (before R2010) and the record's own handle. The (handle → offset) pairs
//! collected here feed the handle map writer.

use std::collections::BTreeMap;

use encoding_rs::Encoding;

use super::bit_writer::DwgBitWriter;
use super::merged_writer::DwgMergedWriter;
use super::stream_writer::DwgStreamWriter;
use crate::error::{DwgError, Result};
use crate::io::dwg::constants::CRC16_SEED;
use crate::io::dwg::crc;
use crate::io::dwg::reference_type::DwgReferenceType;
use crate::io::dwg::version_codec::VersionCodec;
use crate::objects::{FieldKind, FieldValue, ObjectRegistry, RecordValue, DEFAULT_REGISTRY};

/// Where a written record landed in the object data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRecord {
    pub handle: u64,
    /// Byte offset of the MS size in the object data.
    pub offset: u64,
    /// Body size in bytes, as declared by the MS.
    pub size: u64,
    pub handle_stream_bits: u64,
}

pub struct ObjectRecordWriter<'a> {
    codec: VersionCodec,
    registry: &'a ObjectRegistry,
    encoding: &'static Encoding,
    data: Vec<u8>,
    records: Vec<ObjectRecord>,
}

impl ObjectRecordWriter<'static> {
    /// Writer over the built-in record schemas.
    pub fn new(codec: VersionCodec) -> Self {
        Self::with_registry(codec, &DEFAULT_REGISTRY)
    }
}

impl<'a> ObjectRecordWriter<'a> {
    pub fn with_registry(codec: VersionCodec, registry: &'a ObjectRegistry) -> Self {
        Self {
            codec,
            registry,
            encoding: encoding_rs::WINDOWS_1252,
            data: Vec::with_capacity(64 * 1024),
            records: Vec::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Append one record and return where it was placed.
    pub fn write(&mut self, record: &RecordValue) -> Result<ObjectRecord> {
        let schema = self
            .registry
            .get(record.type_code)
            .ok_or(DwgError::UnimplementedRecordType {
                type_code: record.type_code,
            })?;
        if schema.fields.len() != record.fields.len() {
            return Err(DwgError::InvalidFormat(format!(
                "{} record {:#X} has {} fields, schema declares {}",
                schema.name,
                record.handle,
                record.fields.len(),
                schema.fields.len()
            )));
        }

        let mut writer = DwgMergedWriter::with_encoding(self.codec, self.encoding);
        writer.write_object_type(record.type_code)?;
        if !self.codec.handle_stream_size {
            writer.save_position_for_size()?;
        }
        writer.write_handle_reference_on_main(record.handle)?;

        for (spec, value) in schema.fields.iter().zip(&record.fields) {
            if !value.matches(spec.kind) {
                return Err(DwgError::InvalidFormat(format!(
                    "{}.{} expects {:?}, got {:?}",
                    schema.name, spec.name, spec.kind, value
                )));
            }
            write_field(&mut writer, spec.kind, value, record.handle)?;
        }

        let streams = writer.finish()?;
        let placed = ObjectRecord {
            handle: record.handle,
            offset: self.data.len() as u64,
            size: streams.data.len() as u64,
            handle_stream_bits: streams.handle_stream_bits(),
        };

        let mut prefix = DwgBitWriter::new(self.codec);
        prefix.write_modular_short(placed.size)?;
        if self.codec.handle_stream_size {
            prefix.write_modular_char(placed.handle_stream_bits)?;
        }

        let start = self.data.len();
        self.data.extend_from_slice(prefix.data());
        self.data.extend_from_slice(&streams.data);
        let crc = crc::crc8(CRC16_SEED, &self.data[start..]);
        self.data.extend_from_slice(&crc.to_le_bytes());

        tracing::trace!(
            handle = record.handle,
            type_code = record.type_code,
            offset = placed.offset,
            size = placed.size,
            "wrote object record"
        );
        self.records.push(placed);
        Ok(placed)
    }

    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    /// Handle → offset pairs for the handle map.
    pub fn handle_map(&self) -> BTreeMap<u64, u64> {
        self.records.iter().map(|r| (r.handle, r.offset)).collect()
    }

    /// The object data and the records placed in it.
    pub fn into_parts(self) -> (Vec<u8>, Vec<ObjectRecord>) {
        tracing::debug!(records = self.records.len(), bytes = self.data.len(), "object data complete");
        (self.data, self.records)
    }
}

fn write_field(
    writer: &mut DwgMergedWriter,
    kind: FieldKind,
    value: &FieldValue,
    own_handle: u64,
) -> Result<()> {
    match (kind, value) {
        (_, FieldValue::Bit(v)) => writer.write_bit(*v),
        (_, FieldValue::BitShort(v)) => writer.write_bit_short(*v),
        (_, FieldValue::BitLong(v)) => writer.write_bit_long(*v),
        (_, FieldValue::BitLongLong(v)) => writer.write_bit_long_long(*v),
        (_, FieldValue::BitDouble(v)) => writer.write_bit_double(*v),
        (_, FieldValue::RawDouble(v)) => writer.write_raw_double(*v),
        (_, FieldValue::Point2(v)) => writer.write_2raw_double(*v),
        (_, FieldValue::Point3(v)) => writer.write_3bit_double(*v),
        (_, FieldValue::Text(v)) => writer.write_variable_text(v),
        (_, FieldValue::Extrusion(v)) => writer.write_bit_extrusion(*v),
        (_, FieldValue::Thickness(v)) => writer.write_bit_thickness(*v),
        (_, FieldValue::RawChar(v)) => writer.write_byte(*v),
        (FieldKind::Handle(reference_type), FieldValue::Handle(h)) => match reference_type {
            DwgReferenceType::SoftPointer | DwgReferenceType::HardPointer => {
                writer.write_handle_reference_relative(*h, own_handle)
            }
            _ => writer.write_handle_reference(reference_type, *h),
        },
        (_, FieldValue::Handle(h)) => writer.write_handle_reference(DwgReferenceType::SoftPointer, *h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{type_codes, RecordSchema};
    use crate::types::{DwgVersion, Vector3};

    fn line(handle: u64) -> RecordValue {
        RecordValue::new(
            type_codes::LINE,
            handle,
            vec![
                FieldValue::Point3(Vector3::new(0.0, 0.0, 0.0)),
                FieldValue::Point3(Vector3::new(10.0, 5.0, 0.0)),
                FieldValue::Thickness(0.0),
                FieldValue::Extrusion(Vector3::UNIT_Z),
                FieldValue::Handle(0x10),
            ],
        )
    }

    #[test]
    fn test_records_are_crc_terminated() {
        for version in DwgVersion::ALL {
            let mut writer = ObjectRecordWriter::new(VersionCodec::for_version(version));
            let first = writer.write(&line(0x30)).unwrap();
            let second = writer.write(&line(0x31)).unwrap();
            let (data, records) = writer.into_parts();

            assert_eq!(first.offset, 0);
            assert_eq!(records.len(), 2);
            let end = second.offset as usize;
            let crc = crc::crc8(CRC16_SEED, &data[..end - 2]);
            assert_eq!(&data[end - 2..end], &crc.to_le_bytes(), "{}", version);
        }
    }

    #[test]
    fn test_handle_map_sorted_by_handle() {
        let mut writer = ObjectRecordWriter::new(VersionCodec::for_version(DwgVersion::AC1018));
        writer.write(&line(0x50)).unwrap();
        writer.write(&line(0x20)).unwrap();
        let map = writer.handle_map();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![0x20, 0x50]);
        assert_eq!(map[&0x50], 0);
    }

    #[test]
    fn test_rejects_unknown_type_and_mismatched_values() {
        let mut writer = ObjectRecordWriter::new(VersionCodec::for_version(DwgVersion::AC1015));
        let unknown = RecordValue::new(0x14, 1, vec![]);
        assert!(matches!(
            writer.write(&unknown),
            Err(DwgError::UnimplementedRecordType { type_code: 0x14 })
        ));

        let mut bad = line(2);
        bad.fields[2] = FieldValue::BitDouble(1.0);
        assert!(matches!(writer.write(&bad), Err(DwgError::InvalidFormat(_))));

        let mut short = line(3);
        short.fields.pop();
        assert!(matches!(writer.write(&short), Err(DwgError::InvalidFormat(_))));
        assert!(writer.records().is_empty());
    }

    #[test]
    fn test_custom_registry() {
        let mut registry = ObjectRegistry::new();
        registry.register(RecordSchema::new(500, "MARKER").field("on", FieldKind::Bit));
        let mut writer =
            ObjectRecordWriter::with_registry(VersionCodec::for_version(DwgVersion::AC1032), &registry);
        let placed = writer
            .write(&RecordValue::new(500, 7, vec![FieldValue::Bit(true)]))
            .unwrap();
        assert!(placed.size > 0);
    }
}
