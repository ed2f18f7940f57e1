//! `AcDb:Classes` writer.

use encoding_rs::Encoding;

use super::merged_writer::DwgMergedWriter;
use super::section_writer::DwgSectionWriter;
use super::stream_writer::DwgStreamWriter;
use crate::classes::DxfClassCollection;
use crate::error::Result;
use crate::io::dwg::section_frame::SectionFrame;
use crate::io::dwg::version_codec::VersionCodec;

pub struct DwgClassesWriter {
    codec: VersionCodec,
    encoding: &'static Encoding,
}

impl DwgClassesWriter {
    pub fn new(codec: VersionCodec) -> Self {
        Self {
            codec,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Write the class table, framed with the Classes sentinels.
    pub fn write(&self, classes: &DxfClassCollection) -> Result<Vec<u8>> {
        let mut writer = DwgMergedWriter::with_encoding(self.codec, self.encoding);
        if self.codec.merged_text {
            // Bits up to the text flag, patched by finish()
            writer.save_position_for_size()?;
        }

        if self.codec.extended_classes {
            writer.write_bit_short(classes.max_class_number())?;
            writer.write_byte(0)?;
            writer.write_byte(0)?;
            writer.write_bit(true)?;
        }

        for class in classes.iter() {
            writer.write_bit_short(class.class_number)?;
            writer.write_bit_short(class.proxy_flags.bits() as i16)?;
            writer.write_variable_text(&class.application_name)?;
            writer.write_variable_text(&class.cpp_class_name)?;
            writer.write_variable_text(&class.dxf_name)?;
            writer.write_bit(class.was_zombie)?;
            writer.write_bit_short(class.item_class_id)?;

            if self.codec.extended_classes {
                writer.write_bit_long(class.instance_count)?;
                writer.write_bit_long(class.dwg_version)?;
                writer.write_bit_long(class.maintenance_version)?;
                writer.write_bit_long(0)?;
                writer.write_bit_long(0)?;
            }
        }

        let payload = writer.finish()?.data;
        tracing::debug!(classes = classes.len(), bytes = payload.len(), "wrote class table");
        DwgSectionWriter::new(self.codec).write(&SectionFrame::classes(), &payload)
    }
}
