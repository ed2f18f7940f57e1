//! Class table entries: the DXF names of custom record types.

use bitflags::bitflags;
use indexmap::IndexMap;

bitflags! {
    /// Operations a proxy of the class allows when the defining
    /// application is absent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProxyFlags: u16 {
        const ERASE_ALLOWED = 0x1;
        const TRANSFORM_ALLOWED = 0x2;
        const COLOR_CHANGE_ALLOWED = 0x4;
        const LAYER_CHANGE_ALLOWED = 0x8;
        const LINETYPE_CHANGE_ALLOWED = 0x10;
        const LINETYPE_SCALE_CHANGE_ALLOWED = 0x20;
        const VISIBILITY_CHANGE_ALLOWED = 0x40;
        const CLONING_ALLOWED = 0x80;
        const LINEWEIGHT_CHANGE_ALLOWED = 0x100;
        const PLOT_STYLE_NAME_CHANGE_ALLOWED = 0x200;
        const ALL_OPERATIONS_EXCEPT_CLONING = 0x37F;
        const ALL_OPERATIONS = 0x3FF;
        const DISABLES_PROXY_WARNING_DIALOG = 0x400;
        const R13_FORMAT_PROXY = 0x8000;
    }
}

/// Item class id of classes whose instances are entities.
pub const ENTITY_CLASS_ID: i16 = 0x1F2;
/// Item class id of classes whose instances are non-graphical objects.
pub const OBJECT_CLASS_ID: i16 = 0x1F3;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DxfClass {
    /// Type code of records of this class (500 and up).
    pub class_number: i16,
    pub proxy_flags: ProxyFlags,
    pub application_name: String,
    pub cpp_class_name: String,
    pub dxf_name: String,
    pub was_zombie: bool,
    pub item_class_id: i16,
    // R2004+
    pub instance_count: i32,
    pub dwg_version: i32,
    pub maintenance_version: i32,
}

impl DxfClass {
    pub fn new(class_number: i16, dxf_name: impl Into<String>, cpp_class_name: impl Into<String>) -> Self {
        Self {
            class_number,
            dxf_name: dxf_name.into(),
            cpp_class_name: cpp_class_name.into(),
            application_name: "ObjectDBX Classes".to_string(),
            item_class_id: OBJECT_CLASS_ID,
            ..Self::default()
        }
    }

    pub fn is_an_entity(&self) -> bool {
        self.item_class_id == ENTITY_CLASS_ID
    }
}

/// Classes keyed by DXF name, in table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfClassCollection {
    classes: IndexMap<String, DxfClass>,
}

impl DxfClassCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a class, replacing any entry with the same DXF name in place.
    pub fn add_or_update(&mut self, class: DxfClass) {
        self.classes.insert(class.dxf_name.clone(), class);
    }

    pub fn get(&self, dxf_name: &str) -> Option<&DxfClass> {
        self.classes.get(dxf_name)
    }

    pub fn by_number(&self, class_number: i16) -> Option<&DxfClass> {
        self.classes.values().find(|c| c.class_number == class_number)
    }

    pub fn max_class_number(&self) -> i16 {
        self.classes.values().map(|c| c.class_number).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DxfClass> {
        self.classes.values()
    }
}

impl FromIterator<DxfClass> for DxfClassCollection {
    fn from_iter<I: IntoIterator<Item = DxfClass>>(iter: I) -> Self {
        let mut collection = Self::new();
        for class in iter {
            collection.add_or_update(class);
        }
        collection
    }
}
