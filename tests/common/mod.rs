//! Shared test utilities for acad-dwg-core integration tests.
//!
//! Consolidates the helpers every test crate needs (version lists, sample
//! records and classes, a drawing assembled from real section writers,
//! container roundtrips) into a single module imported via `mod common;`.

#![allow(dead_code)]

use acad_dwg_core::classes::{DxfClass, DxfClassCollection, ENTITY_CLASS_ID};
use acad_dwg_core::io::dwg::constants::section_names;
use acad_dwg_core::io::dwg::reader::DwgFileReader;
use acad_dwg_core::io::dwg::writer::{DwgClassesWriter, DwgFileWriter, DwgHandleWriter, ObjectRecordWriter};
use acad_dwg_core::io::dwg::{DwgFile, DwgReaderConfiguration, VersionCodec};
use acad_dwg_core::notification::NotificationCollection;
use acad_dwg_core::objects::{type_codes, FieldValue, RecordValue};
use acad_dwg_core::types::{DwgVersion, Vector2, Vector3};
use indexmap::IndexMap;

// ===========================================================================
// Versions
// ===========================================================================

/// Revisions whose container this crate writes and reads.
pub const CONTAINER_VERSIONS: [DwgVersion; 7] = [
    DwgVersion::AC1012,
    DwgVersion::AC1014,
    DwgVersion::AC1015,
    DwgVersion::AC1018,
    DwgVersion::AC1024,
    DwgVersion::AC1027,
    DwgVersion::AC1032,
];

pub fn codec(version: DwgVersion) -> VersionCodec {
    VersionCodec::for_version(version)
}

// ===========================================================================
// Sample content
// ===========================================================================

pub fn sample_classes() -> DxfClassCollection {
    let mut classes = DxfClassCollection::new();
    classes.add_or_update(DxfClass::new(500, "ACDBDICTIONARYWDFLT", "AcDbDictionaryWithDefault"));
    let mut entity = DxfClass::new(501, "WIPEOUT", "AcDbWipeout");
    entity.item_class_id = ENTITY_CLASS_ID;
    entity.application_name = "WipeOut|AutoCAD Express Tool|expresstools@autodesk.com".to_string();
    classes.add_or_update(entity);
    classes
}

pub fn layer(handle: u64, name: &str, owner: u64) -> RecordValue {
    RecordValue::new(
        type_codes::LAYER,
        handle,
        vec![
            FieldValue::Text(name.to_string()),
            FieldValue::Bit(false),
            FieldValue::BitShort(0),
            FieldValue::BitShort(7),
            FieldValue::Handle(owner),
            FieldValue::Handle(0x16),
        ],
    )
}

pub fn line(handle: u64, layer: u64, start: Vector3, end: Vector3) -> RecordValue {
    RecordValue::new(
        type_codes::LINE,
        handle,
        vec![
            FieldValue::Point3(start),
            FieldValue::Point3(end),
            FieldValue::Thickness(0.0),
            FieldValue::Extrusion(Vector3::UNIT_Z),
            FieldValue::Handle(layer),
        ],
    )
}

pub fn circle(handle: u64, layer: u64, center: Vector3, radius: f64) -> RecordValue {
    RecordValue::new(
        type_codes::CIRCLE,
        handle,
        vec![
            FieldValue::Point3(center),
            FieldValue::BitDouble(radius),
            FieldValue::Thickness(1.5),
            FieldValue::Extrusion(Vector3::new(0.0, 1.0, 0.0)),
            FieldValue::Handle(layer),
        ],
    )
}

pub fn text(handle: u64, layer: u64, value: &str) -> RecordValue {
    RecordValue::new(
        type_codes::TEXT,
        handle,
        vec![
            FieldValue::RawChar(0),
            FieldValue::RawDouble(0.0),
            FieldValue::Point2(Vector2::new(10.0, 20.0)),
            FieldValue::Extrusion(Vector3::UNIT_Z),
            FieldValue::Thickness(0.0),
            FieldValue::BitDouble(2.5),
            FieldValue::Text(value.to_string()),
            FieldValue::BitShort(0),
            FieldValue::Handle(layer),
            FieldValue::Handle(0x11),
        ],
    )
}

/// A small drawing: two layers, geometry on both and a text.
pub fn sample_records() -> Vec<RecordValue> {
    vec![
        layer(0x10, "0", 0x02),
        layer(0x20, "Walls", 0x02),
        line(0x21, 0x10, Vector3::new(0.0, 0.0, 0.0), Vector3::new(100.0, 50.0, 0.0)),
        circle(0x22, 0x20, Vector3::new(5.0, 5.0, 0.0), 2.25),
        text(0x30, 0x20, "Ground floor"),
        line(0x1234, 0x20, Vector3::new(-1.0, 2.0, 3.0), Vector3::new(4.0, -5.0, 6.0)),
    ]
}

// ===========================================================================
// Drawing assembly
// ===========================================================================

/// Encode classes, object records and the handle map with the section
/// writers and collect them under their section names.
pub fn build_sections(version: DwgVersion, records: &[RecordValue]) -> IndexMap<String, Vec<u8>> {
    let codec = codec(version);
    let mut objects = ObjectRecordWriter::new(codec);
    for record in records {
        objects.write(record).unwrap();
    }
    let handle_map = objects.handle_map();
    let (object_data, _) = objects.into_parts();

    let mut sections = IndexMap::new();
    sections.insert(section_names::HEADER.to_string(), vec![0x11; 32]);
    sections.insert(
        section_names::CLASSES.to_string(),
        DwgClassesWriter::new(codec).write(&sample_classes()).unwrap(),
    );
    sections.insert(section_names::ACDB_OBJECTS.to_string(), object_data);
    sections.insert(
        section_names::HANDLES.to_string(),
        DwgHandleWriter::new(codec).write(&handle_map).unwrap(),
    );
    sections
}

pub fn write_container(version: DwgVersion, sections: &IndexMap<String, Vec<u8>>) -> Vec<u8> {
    DwgFileWriter::new(version).write(sections).unwrap()
}

pub fn read_container(bytes: &[u8], config: DwgReaderConfiguration) -> (DwgFile, NotificationCollection) {
    let mut notes = NotificationCollection::new();
    let file = DwgFileReader::from_bytes(bytes)
        .with_config(config)
        .read(&mut notes)
        .unwrap();
    (file, notes)
}
