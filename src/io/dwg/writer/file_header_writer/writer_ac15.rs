//! Flat container writer for R13-R2000.
//!
//! ```text
//! FILE HEADER        (0x61 bytes)
//! AcDb:Header        (record 0)
//! AcDb:Classes       (record 1)
//! AcDb:ObjFreeSpace  (record 3)
//! AcDb:Template      (record 4)
//! AcDb:AuxHeader     (record 5)
//! AcDb:AcDbObjects   (no record)
//! AcDb:Handles       (record 2)
//! AcDb:Preview       (no record, located by the header's preview seeker)
//! ```

use indexmap::IndexMap;

use crate::error::{DwgError, Result};
use crate::io::dwg::constants::section_names;
use crate::io::dwg::file_header::{DwgSectionLocatorRecord, FlatFileHeader, FLAT_HEADER_SIZE};
use crate::types::DwgVersion;

use super::DwgFileHeaderWriter;

/// File order of the sections a flat container can hold.
pub const FLAT_SECTION_ORDER: [&str; 8] = [
    section_names::HEADER,
    section_names::CLASSES,
    section_names::OBJ_FREE_SPACE,
    section_names::TEMPLATE,
    section_names::AUX_HEADER,
    section_names::ACDB_OBJECTS,
    section_names::HANDLES,
    section_names::PREVIEW,
];

pub struct DwgFileHeaderWriterAC15 {
    version: DwgVersion,
    maintenance_version: u8,
    code_page: u16,
    sections: IndexMap<String, Vec<u8>>,
}

impl DwgFileHeaderWriterAC15 {
    pub fn new(version: DwgVersion, maintenance_version: u8, code_page: u16) -> Self {
        Self {
            version,
            maintenance_version,
            code_page,
            sections: IndexMap::new(),
        }
    }
}

fn seeker(position: usize, name: &str) -> Result<u32> {
    u32::try_from(position).map_err(|_| {
        DwgError::InvalidFormat(format!("{} at {:#X} is beyond a 4-byte seeker", name, position))
    })
}

impl DwgFileHeaderWriter for DwgFileHeaderWriterAC15 {
    fn add_section(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        if !FLAT_SECTION_ORDER.contains(&name) {
            return Err(DwgError::InvalidFormat(format!(
                "section {} has no place in the flat layout",
                name
            )));
        }
        if self.sections.insert(name.to_string(), data).is_some() {
            return Err(DwgError::InvalidFormat(format!("section {} added twice", name)));
        }
        Ok(())
    }

    fn write_file(&mut self) -> Result<Vec<u8>> {
        let mut position = FLAT_HEADER_SIZE;
        let mut records = Vec::new();
        let mut preview_seeker = 0;

        for name in FLAT_SECTION_ORDER {
            let Some(data) = self.sections.get(name) else {
                continue;
            };
            let start = seeker(position, name)?;
            if let Some(number) = section_names::flat_locator_index(name) {
                records.push(DwgSectionLocatorRecord::new(number, start, seeker(data.len(), name)?));
            }
            if name == section_names::PREVIEW {
                preview_seeker = start;
            }
            position += data.len();
        }
        records.sort_by_key(|r| r.number);

        let header = FlatFileHeader {
            version: self.version,
            maintenance_version: self.maintenance_version,
            preview_seeker,
            code_page: self.code_page,
            records,
        };

        let mut output = header.encode()?;
        output.reserve(position - FLAT_HEADER_SIZE);
        for name in FLAT_SECTION_ORDER {
            if let Some(data) = self.sections.get(name) {
                tracing::debug!(section = name, seeker = output.len(), size = data.len(), "flat section");
                output.extend_from_slice(data);
            }
        }
        Ok(output)
    }
}
