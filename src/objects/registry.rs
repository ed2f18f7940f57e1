use ahash::AHashMap;
use once_cell::sync::Lazy;

use super::{FieldKind, RecordSchema};
use crate::io::dwg::reference_type::DwgReferenceType;

/// Fixed object type codes with a built-in schema.
pub mod type_codes {
    pub const TEXT: u16 = 0x01;
    pub const ARC: u16 = 0x11;
    pub const CIRCLE: u16 = 0x12;
    pub const LINE: u16 = 0x13;
    pub const POINT: u16 = 0x1B;
    pub const DICTIONARY: u16 = 0x2A;
    pub const LAYER: u16 = 0x33;
}

/// Schemas keyed by object type code.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    schemas: AHashMap<u16, RecordSchema>,
}

/// Registry of the common fixed-type records, built on first use.
pub static DEFAULT_REGISTRY: Lazy<ObjectRegistry> = Lazy::new(ObjectRegistry::with_defaults);

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in schemas, ready to be extended.
    pub fn with_defaults() -> Self {
        use DwgReferenceType::{HardOwnership, HardPointer, SoftPointer};
        use FieldKind::*;

        let mut registry = Self::new();
        registry.register(
            RecordSchema::new(type_codes::LINE, "LINE")
                .field("start", Point3)
                .field("end", Point3)
                .field("thickness", Thickness)
                .field("extrusion", Extrusion)
                .field("layer", Handle(HardPointer)),
        );
        registry.register(
            RecordSchema::new(type_codes::CIRCLE, "CIRCLE")
                .field("center", Point3)
                .field("radius", BitDouble)
                .field("thickness", Thickness)
                .field("extrusion", Extrusion)
                .field("layer", Handle(HardPointer)),
        );
        registry.register(
            RecordSchema::new(type_codes::ARC, "ARC")
                .field("center", Point3)
                .field("radius", BitDouble)
                .field("thickness", Thickness)
                .field("extrusion", Extrusion)
                .field("start_angle", BitDouble)
                .field("end_angle", BitDouble)
                .field("layer", Handle(HardPointer)),
        );
        registry.register(
            RecordSchema::new(type_codes::POINT, "POINT")
                .field("location", Point3)
                .field("thickness", Thickness)
                .field("extrusion", Extrusion)
                .field("x_axis_angle", BitDouble)
                .field("layer", Handle(HardPointer)),
        );
        registry.register(
            RecordSchema::new(type_codes::TEXT, "TEXT")
                .field("data_flags", RawChar)
                .field("elevation", RawDouble)
                .field("insertion", Point2)
                .field("extrusion", Extrusion)
                .field("thickness", Thickness)
                .field("height", BitDouble)
                .field("value", Text)
                .field("generation", BitShort)
                .field("layer", Handle(HardPointer))
                .field("style", Handle(HardPointer)),
        );
        registry.register(
            RecordSchema::new(type_codes::LAYER, "LAYER")
                .field("name", Text)
                .field("xref_dependent", Bit)
                .field("flags", BitShort)
                .field("color", BitShort)
                .field("owner", Handle(SoftPointer))
                .field("linetype", Handle(HardPointer)),
        );
        registry.register(
            RecordSchema::new(type_codes::DICTIONARY, "DICTIONARY")
                .field("entry_count", BitLong)
                .field("cloning", BitShort)
                .field("hard_owner", RawChar)
                .field("owner", Handle(SoftPointer))
                .field("first_entry", Handle(HardOwnership)),
        );
        registry
    }

    /// Add or replace the schema for its type code.
    pub fn register(&mut self, schema: RecordSchema) -> Option<RecordSchema> {
        self.schemas.insert(schema.type_code, schema)
    }

    pub fn get(&self, type_code: u16) -> Option<&RecordSchema> {
        self.schemas.get(&type_code)
    }

    pub fn by_name(&self, name: &str) -> Option<&RecordSchema> {
        self.schemas.values().find(|s| s.name == name)
    }

    pub fn contains(&self, type_code: u16) -> bool {
        self.schemas.contains_key(&type_code)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
