//! Container writer: named section payloads in, file bytes out.
//!
//! # Usage
//! ```no_run
//! use acad_dwg_core::io::dwg::writer::DwgFileWriter;
//! use acad_dwg_core::types::DwgVersion;
//! use indexmap::IndexMap;
//!
//! let mut sections = IndexMap::new();
//! sections.insert("AcDb:Header".to_string(), vec![0u8; 64]);
//! let bytes = DwgFileWriter::new(DwgVersion::AC1018).write(&sections).unwrap();
//! std::fs::write("output.dwg", &bytes).unwrap();
//! ```

use std::io::Write;

use indexmap::IndexMap;

use crate::error::{DwgError, Result};
use crate::io::dwg::configuration::DwgWriterConfiguration;
use crate::io::dwg::file_header::DwgFile;
use crate::io::dwg::version_codec::{FileLayout, VersionCodec};
use crate::types::DwgVersion;

use super::file_header_writer::{DwgFileHeaderWriter, DwgFileHeaderWriterAC15, DwgFileHeaderWriterAC18};

pub struct DwgFileWriter {
    version: DwgVersion,
    config: DwgWriterConfiguration,
}

impl DwgFileWriter {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            version,
            config: DwgWriterConfiguration::default(),
        }
    }

    pub fn with_config(mut self, config: DwgWriterConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Lay out `sections` in the container of this writer's revision.
    pub fn write(&self, sections: &IndexMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        let maintenance = self
            .config
            .maintenance_version
            .unwrap_or_else(|| self.version.maintenance_version());
        let codec = VersionCodec::with_maintenance(self.version, maintenance);

        let mut file_writer = self.create_file_header_writer(&codec, maintenance)?;
        for (name, data) in sections {
            file_writer.add_section(name, data.clone())?;
        }
        let bytes = file_writer.write_file()?;
        tracing::debug!(version = %self.version, sections = sections.len(), size = bytes.len(), "file written");
        Ok(bytes)
    }

    /// Write `file` with its own revision, maintenance byte and code page.
    pub fn write_file(file: &DwgFile) -> Result<Vec<u8>> {
        let config = DwgWriterConfiguration::default()
            .with_maintenance_version(file.maintenance_version)
            .with_code_page(file.code_page);
        Self::new(file.version).with_config(config).write(&file.sections)
    }

    pub fn write_to<W: Write>(&self, sections: &IndexMap<String, Vec<u8>>, writer: &mut W) -> Result<()> {
        writer.write_all(&self.write(sections)?)?;
        Ok(())
    }

    fn create_file_header_writer(
        &self,
        codec: &VersionCodec,
        maintenance: u8,
    ) -> Result<Box<dyn DwgFileHeaderWriter>> {
        match codec.layout {
            FileLayout::Flat => Ok(Box::new(DwgFileHeaderWriterAC15::new(
                self.version,
                maintenance,
                self.config.code_page,
            ))),
            FileLayout::Paged(width) => Ok(Box::new(DwgFileHeaderWriterAC18::new(
                self.version,
                maintenance,
                self.config.code_page,
                width,
                self.config.compress,
            ))),
            FileLayout::ReedSolomon => Err(DwgError::NotImplemented(format!(
                "{} container (Reed-Solomon pages)",
                self.version
            ))),
        }
    }
}
