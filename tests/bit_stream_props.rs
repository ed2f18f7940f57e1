//! Property tests for the bit cursors: every primitive written by
//! `DwgBitWriter` reads back unchanged through `DwgBitReader`, whatever
//! the preceding bit alignment.

mod common;

use acad_dwg_core::io::dwg::reader::{DwgBitReader, DwgStreamReader};
use acad_dwg_core::io::dwg::writer::{DwgBitWriter, DwgStreamWriter};
use acad_dwg_core::io::dwg::DwgReferenceType;
use acad_dwg_core::types::{DwgVersion, Vector3};
use proptest::prelude::*;

/// Writer shifted by `skew` bits so values land at arbitrary alignments.
fn skewed_writer(version: DwgVersion, skew: u8) -> DwgBitWriter {
    let mut writer = DwgBitWriter::new(common::codec(version));
    for i in 0..skew {
        writer.write_bit(i % 2 == 0).unwrap();
    }
    writer
}

fn reader_past_skew(writer: DwgBitWriter, version: DwgVersion, skew: u8) -> DwgBitReader {
    let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(version));
    for i in 0..skew {
        assert_eq!(reader.read_bit().unwrap(), i % 2 == 0);
    }
    reader
}

fn any_version() -> impl Strategy<Value = DwgVersion> {
    prop::sample::select(DwgVersion::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_arbitrary_bits_roundtrip(bits in prop::collection::vec(any::<bool>(), 1..10000)) {
        let mut writer = DwgBitWriter::new(common::codec(DwgVersion::AC1015));
        for &bit in &bits {
            writer.write_bit(bit).unwrap();
        }
        prop_assert_eq!(writer.position_in_bits(), bits.len() as u64);
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(DwgVersion::AC1015));
        for &bit in &bits {
            prop_assert_eq!(reader.read_bit().unwrap(), bit);
        }
    }

    #[test]
    fn prop_bit_short_roundtrip(values in prop::collection::vec(any::<i16>(), 1..32), skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1015, skew);
        for &v in &values {
            writer.write_bit_short(v).unwrap();
        }
        let mut reader = reader_past_skew(writer, DwgVersion::AC1015, skew);
        for &v in &values {
            prop_assert_eq!(reader.read_bit_short().unwrap(), v);
        }
    }

    #[test]
    fn prop_bit_long_roundtrip(values in prop::collection::vec(any::<i32>(), 1..32), skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1018, skew);
        for &v in &values {
            writer.write_bit_long(v).unwrap();
        }
        let mut reader = reader_past_skew(writer, DwgVersion::AC1018, skew);
        for &v in &values {
            prop_assert_eq!(reader.read_bit_long().unwrap(), v);
        }
    }

    #[test]
    fn prop_bit_long_long_roundtrip(value in 0i64..(1i64 << 56), skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1024, skew);
        writer.write_bit_long_long(value).unwrap();
        let mut reader = reader_past_skew(writer, DwgVersion::AC1024, skew);
        prop_assert_eq!(reader.read_bit_long_long().unwrap(), value);
    }

    #[test]
    fn prop_bit_double_roundtrip(value in prop::num::f64::NORMAL, skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1015, skew);
        writer.write_bit_double(value).unwrap();
        let mut reader = reader_past_skew(writer, DwgVersion::AC1015, skew);
        prop_assert_eq!(reader.read_bit_double().unwrap(), value);
    }

    #[test]
    fn prop_modular_char_roundtrip(value in 0u64..(1u64 << 62), skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1015, skew);
        writer.write_modular_char(value).unwrap();
        let mut reader = reader_past_skew(writer, DwgVersion::AC1015, skew);
        prop_assert_eq!(reader.read_modular_char().unwrap(), value);
    }

    #[test]
    fn prop_signed_modular_char_roundtrip(value in -(1i64 << 55)..(1i64 << 55), skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1015, skew);
        writer.write_signed_modular_char(value).unwrap();
        let mut reader = reader_past_skew(writer, DwgVersion::AC1015, skew);
        prop_assert_eq!(reader.read_signed_modular_char().unwrap(), value);
    }

    #[test]
    fn prop_modular_short_roundtrip(value in 0u64..(1u64 << 60)) {
        let mut writer = DwgBitWriter::new(common::codec(DwgVersion::AC1015));
        writer.write_modular_short(value).unwrap();
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(DwgVersion::AC1015));
        prop_assert_eq!(reader.read_modular_short().unwrap(), value);
    }

    #[test]
    fn prop_absolute_handle_roundtrip(handle in any::<u64>(), skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1018, skew);
        writer.write_handle_reference(DwgReferenceType::HardPointer, handle).unwrap();
        let mut reader = reader_past_skew(writer, DwgVersion::AC1018, skew);
        prop_assert_eq!(reader.read_handle_reference(0x4A).unwrap(), handle);
    }

    #[test]
    fn prop_relative_handle_roundtrip(handle in 0u64..(1u64 << 48), reference in 0u64..(1u64 << 48)) {
        let mut writer = DwgBitWriter::new(common::codec(DwgVersion::AC1015));
        writer.write_handle_reference_relative(handle, reference).unwrap();
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(DwgVersion::AC1015));
        prop_assert_eq!(reader.read_handle_reference(reference).unwrap(), handle);
    }

    #[test]
    fn prop_code_page_text_roundtrip(value in "[ -~]{0,200}", skew in 0u8..8) {
        let mut writer = skewed_writer(DwgVersion::AC1015, skew);
        writer.write_variable_text(&value).unwrap();
        let mut reader = reader_past_skew(writer, DwgVersion::AC1015, skew);
        prop_assert_eq!(reader.read_variable_text().unwrap(), value);
    }

    #[test]
    fn prop_utf16_text_roundtrip(value in "[^\\x00]{0,100}") {
        let mut writer = DwgBitWriter::new(common::codec(DwgVersion::AC1021));
        writer.write_variable_text(&value).unwrap();
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(DwgVersion::AC1021));
        prop_assert_eq!(reader.read_variable_text().unwrap(), value);
    }

    #[test]
    fn prop_object_type_roundtrip(version in any_version(), value in any::<u16>()) {
        let mut writer = DwgBitWriter::new(common::codec(version));
        writer.write_object_type(value).unwrap();
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(version));
        prop_assert_eq!(reader.read_object_type().unwrap(), value);
    }

    #[test]
    fn prop_extrusion_and_thickness_roundtrip(
        version in any_version(),
        x in -1.0f64..1.0,
        y in -1.0f64..1.0,
        thickness in -1000.0f64..1000.0,
    ) {
        let normal = Vector3::new(x, y, 0.5);
        let mut writer = DwgBitWriter::new(common::codec(version));
        writer.write_bit_extrusion(normal).unwrap();
        writer.write_bit_thickness(thickness).unwrap();
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(version));
        prop_assert_eq!(reader.read_bit_extrusion().unwrap(), normal);
        prop_assert_eq!(reader.read_bit_thickness().unwrap(), thickness);
    }
}

#[test]
fn test_default_extrusion_is_compact_from_r2000() {
    let mut old = DwgBitWriter::new(common::codec(DwgVersion::AC1014));
    old.write_bit_extrusion(Vector3::UNIT_Z).unwrap();
    let mut new = DwgBitWriter::new(common::codec(DwgVersion::AC1015));
    new.write_bit_extrusion(Vector3::UNIT_Z).unwrap();
    assert!(new.position_in_bits() < old.position_in_bits());
    assert_eq!(new.position_in_bits(), 1);
}

#[test]
fn test_reading_past_end_reports_offset() {
    let mut reader = DwgBitReader::new(vec![0xFF], common::codec(DwgVersion::AC1015));
    reader.read_byte().unwrap();
    let err = reader.read_bit().unwrap_err();
    assert!(matches!(
        err,
        acad_dwg_core::DwgError::EndOfStream { offset_bits: 8 }
    ));
}

#[test]
fn test_leading_byte_order_marks_are_text() {
    // In Windows-1252 these are the UTF-16LE and UTF-8 BOM byte sequences
    for value in ["ÿþab", "ï»¿xy"] {
        let mut writer = DwgBitWriter::new(common::codec(DwgVersion::AC1015));
        writer.write_variable_text(value).unwrap();
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(DwgVersion::AC1015));
        assert_eq!(reader.read_variable_text().unwrap(), value);
    }

    for value in ["\u{feff}", "\u{feff}tail"] {
        let mut writer = DwgBitWriter::new(common::codec(DwgVersion::AC1021));
        writer.write_variable_text(value).unwrap();
        let mut reader = DwgBitReader::new(writer.into_inner(), common::codec(DwgVersion::AC1021));
        assert_eq!(reader.read_variable_text().unwrap(), value);
    }
}
