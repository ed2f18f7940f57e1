//! Generic object records.
//!
//! A record is decoded against a [`RecordSchema`]: the ordered list of
//! field kinds that follow the common record prefix (object type, size,
//! own handle). Values come back as a flat [`RecordValue`].

mod registry;

pub use registry::{type_codes, ObjectRegistry, DEFAULT_REGISTRY};

use crate::io::dwg::reference_type::DwgReferenceType;
use crate::types::{Vector2, Vector3};

/// Wire form of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bit,
    BitShort,
    BitLong,
    BitLongLong,
    BitDouble,
    RawDouble,
    /// 2RD
    Point2,
    /// 3BD
    Point3,
    /// TV, routed to the text stream from R2007
    Text,
    Extrusion,
    Thickness,
    /// Reference on the handle stream
    Handle(DwgReferenceType),
    RawChar,
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bit(bool),
    BitShort(i16),
    BitLong(i32),
    BitLongLong(i64),
    BitDouble(f64),
    RawDouble(f64),
    Point2(Vector2),
    Point3(Vector3),
    Text(String),
    Extrusion(Vector3),
    Thickness(f64),
    Handle(u64),
    RawChar(u8),
}

impl FieldValue {
    /// Whether this value can be stored in a field of `kind`.
    pub fn matches(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Bit(_), FieldKind::Bit)
                | (FieldValue::BitShort(_), FieldKind::BitShort)
                | (FieldValue::BitLong(_), FieldKind::BitLong)
                | (FieldValue::BitLongLong(_), FieldKind::BitLongLong)
                | (FieldValue::BitDouble(_), FieldKind::BitDouble)
                | (FieldValue::RawDouble(_), FieldKind::RawDouble)
                | (FieldValue::Point2(_), FieldKind::Point2)
                | (FieldValue::Point3(_), FieldKind::Point3)
                | (FieldValue::Text(_), FieldKind::Text)
                | (FieldValue::Extrusion(_), FieldKind::Extrusion)
                | (FieldValue::Thickness(_), FieldKind::Thickness)
                | (FieldValue::Handle(_), FieldKind::Handle(_))
                | (FieldValue::RawChar(_), FieldKind::RawChar)
        )
    }

    /// Default value for a field of `kind`.
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Bit => FieldValue::Bit(false),
            FieldKind::BitShort => FieldValue::BitShort(0),
            FieldKind::BitLong => FieldValue::BitLong(0),
            FieldKind::BitLongLong => FieldValue::BitLongLong(0),
            FieldKind::BitDouble => FieldValue::BitDouble(0.0),
            FieldKind::RawDouble => FieldValue::RawDouble(0.0),
            FieldKind::Point2 => FieldValue::Point2(Vector2::ZERO),
            FieldKind::Point3 => FieldValue::Point3(Vector3::ZERO),
            FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Extrusion => FieldValue::Extrusion(Vector3::UNIT_Z),
            FieldKind::Thickness => FieldValue::Thickness(0.0),
            FieldKind::Handle(_) => FieldValue::Handle(0),
            FieldKind::RawChar => FieldValue::RawChar(0),
        }
    }
}

/// Named field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Layout of the type-specific part of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub type_code: u16,
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(type_code: u16, name: impl Into<String>) -> Self {
        Self {
            type_code,
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field; builder style.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec::new(name, kind));
        self
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// A record of this type with every field at its default.
    pub fn instantiate(&self, handle: u64) -> RecordValue {
        RecordValue {
            type_code: self.type_code,
            handle,
            fields: self
                .fields
                .iter()
                .map(|f| FieldValue::default_for(f.kind))
                .collect(),
        }
    }
}

/// A decoded record: type, own handle and field values in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub type_code: u16,
    pub handle: u64,
    pub fields: Vec<FieldValue>,
}

impl RecordValue {
    pub fn new(type_code: u16, handle: u64, fields: Vec<FieldValue>) -> Self {
        Self {
            type_code,
            handle,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instantiate_matches_schema() {
        let schema = RecordSchema::new(0x13, "LINE")
            .field("start", FieldKind::Point3)
            .field("layer", FieldKind::Handle(DwgReferenceType::HardPointer));
        let record = schema.instantiate(0x2A);
        assert_eq!(record.handle, 0x2A);
        for (value, spec) in record.fields.iter().zip(&schema.fields) {
            assert!(value.matches(spec.kind));
        }
        assert_eq!(schema.index_of("layer"), Some(1));
    }

    #[test]
    fn test_handle_matches_any_reference_type() {
        let value = FieldValue::Handle(5);
        assert!(value.matches(FieldKind::Handle(DwgReferenceType::SoftOwnership)));
        assert!(value.matches(FieldKind::Handle(DwgReferenceType::HardPointer)));
        assert!(!value.matches(FieldKind::BitLong));
        assert!(!FieldValue::Thickness(1.0).matches(FieldKind::BitDouble));
    }
}
