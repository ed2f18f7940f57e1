//! `AcDb:Classes` reader.
//!
//! Entries are read until the main stream is exhausted. From R2007 the
//! payload opens with an RL holding the bit length up to the text flag,
//! and the strings live in the trailing text stream.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::Encoding;

use super::merged_reader::DwgMergedReader;
use super::section_reader::DwgSectionReader;
use super::stream_reader::DwgStreamReader;
use crate::classes::{DxfClass, DxfClassCollection, ProxyFlags};
use crate::error::{DwgError, Result, SectionContext};
use crate::io::dwg::configuration::DwgReaderConfiguration;
use crate::io::dwg::constants::section_names;
use crate::io::dwg::section_frame::SectionFrame;
use crate::io::dwg::version_codec::VersionCodec;
use crate::notification::NotificationCollection;

pub struct DwgClassesReader<'a> {
    codec: VersionCodec,
    config: &'a DwgReaderConfiguration,
    encoding: &'static Encoding,
}

impl<'a> DwgClassesReader<'a> {
    pub fn new(codec: VersionCodec, config: &'a DwgReaderConfiguration) -> Self {
        Self {
            codec,
            config,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    /// Code page encoding for pre-R2007 names, usually `DwgFile::encoding()`.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn read(
        &self,
        data: &[u8],
        notifications: &mut NotificationCollection,
    ) -> Result<DxfClassCollection> {
        let frame = SectionFrame::classes();
        let section = DwgSectionReader::new(self.codec, self.config).read(&frame, data, notifications)?;
        self.read_payload(section.payload)
            .in_section(section_names::CLASSES, frame.start.len() as u64)
    }

    fn read_payload(&self, payload: Vec<u8>) -> Result<DxfClassCollection> {
        let handle_start = if self.codec.merged_text {
            if payload.len() < 4 {
                return Err(DwgError::EndOfStream {
                    offset_bits: payload.len() as u64 * 8,
                });
            }
            LittleEndian::read_u32(&payload[..4]) as u64
        } else {
            payload.len() as u64 * 8
        };

        let mut reader = DwgMergedReader::with_encoding(payload, self.codec, handle_start, self.encoding)?;
        if self.codec.merged_text {
            reader.read_raw_ulong()?;
        }
        if self.codec.extended_classes {
            let _max_class_number = reader.read_bit_short()?;
            reader.read_byte()?;
            reader.read_byte()?;
            reader.read_bit()?;
        }

        let mut classes = DxfClassCollection::new();
        // Trailing pad bits never hold a whole entry
        while reader.position_in_bits() + 8 <= reader.main_end() {
            classes.add_or_update(self.read_class(&mut reader)?);
        }

        tracing::debug!(classes = classes.len(), "read class table");
        Ok(classes)
    }

    fn read_class(&self, reader: &mut DwgMergedReader) -> Result<DxfClass> {
        let mut class = DxfClass {
            class_number: reader.read_bit_short()?,
            proxy_flags: ProxyFlags::from_bits_retain(reader.read_bit_short()? as u16),
            application_name: reader.read_variable_text()?,
            cpp_class_name: reader.read_variable_text()?,
            dxf_name: reader.read_variable_text()?,
            was_zombie: reader.read_bit()?,
            item_class_id: reader.read_bit_short()?,
            ..DxfClass::default()
        };

        if self.codec.extended_classes {
            class.instance_count = reader.read_bit_long()?;
            class.dwg_version = reader.read_bit_long()?;
            class.maintenance_version = reader.read_bit_long()?;
            reader.read_bit_long()?;
            reader.read_bit_long()?;
        }
        Ok(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ENTITY_CLASS_ID;
    use crate::io::dwg::writer::DwgClassesWriter;
    use crate::types::DwgVersion;

    fn sample() -> DxfClassCollection {
        let mut wipeout = DxfClass::new(500, "WIPEOUT", "AcDbWipeout");
        wipeout.item_class_id = ENTITY_CLASS_ID;
        wipeout.proxy_flags = ProxyFlags::ALL_OPERATIONS | ProxyFlags::R13_FORMAT_PROXY;
        wipeout.application_name = "WipeOut|AutoCAD Express Tool|expresstools@autodesk.com".into();
        wipeout.instance_count = 3;

        let mut layout = DxfClass::new(501, "LAYOUT", "AcDbLayout");
        layout.proxy_flags = ProxyFlags::empty();
        layout.was_zombie = true;

        let mut named = DxfClass::new(502, "ACDBDICTIONARYWDFLT", "AcDbDictionaryWithDefault");
        named.application_name = "ÄÖÜ".into();
        named.maintenance_version = 42;
        named.dwg_version = 0x1F;

        [wipeout, layout, named].into_iter().collect()
    }

    #[test]
    fn test_roundtrip_each_revision() {
        let config = DwgReaderConfiguration::default();
        for version in DwgVersion::ALL {
            let codec = VersionCodec::for_version(version);
            let data = DwgClassesWriter::new(codec).write(&sample()).unwrap();
            let mut notes = NotificationCollection::new();
            let back = DwgClassesReader::new(codec, &config).read(&data, &mut notes).unwrap();

            let expected = sample();
            assert_eq!(back.len(), expected.len(), "{}", version);
            for (a, b) in back.iter().zip(expected.iter()) {
                assert_eq!(a.class_number, b.class_number);
                assert_eq!(a.proxy_flags, b.proxy_flags);
                assert_eq!(a.application_name, b.application_name);
                assert_eq!(a.cpp_class_name, b.cpp_class_name);
                assert_eq!(a.dxf_name, b.dxf_name);
                assert_eq!(a.was_zombie, b.was_zombie);
                assert_eq!(a.item_class_id, b.item_class_id);
                if codec.extended_classes {
                    assert_eq!(a, b);
                }
            }
            assert!(notes.is_empty());
        }
    }

    #[test]
    fn test_lenient_tolerates_end_but_not_start_sentinel() {
        let codec = VersionCodec::for_version(DwgVersion::AC1018);
        let config = DwgReaderConfiguration::lenient();
        let data = DwgClassesWriter::new(codec).write(&sample()).unwrap();

        let mut bad_end = data.clone();
        // Last end sentinel byte, ahead of the 8-byte trailer
        let last = bad_end.len() - 9;
        bad_end[last] ^= 0xFF;
        let mut notes = NotificationCollection::new();
        let back = DwgClassesReader::new(codec, &config).read(&bad_end, &mut notes).unwrap();
        assert_eq!(back.len(), 3);
        assert!(notes.has_type(crate::notification::NotificationType::Warning));

        let mut bad_start = data;
        bad_start[3] ^= 0xFF;
        let err = DwgClassesReader::new(codec, &config)
            .read(&bad_start, &mut NotificationCollection::new())
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            DwgError::SentinelMismatch {
                kind: crate::error::SentinelKind::Start,
                ..
            }
        ));
    }

    #[test]
    fn test_names_use_the_given_code_page() {
        let codec = VersionCodec::for_version(DwgVersion::AC1015);
        let config = DwgReaderConfiguration::default();
        let classes: DxfClassCollection = [DxfClass::new(500, "СЛОЙ", "AcDbLayerExt")].into_iter().collect();
        let cyrillic = encoding_rs::WINDOWS_1251;
        let data = DwgClassesWriter::new(codec).with_encoding(cyrillic).write(&classes).unwrap();

        let back = DwgClassesReader::new(codec, &config)
            .with_encoding(cyrillic)
            .read(&data, &mut NotificationCollection::new())
            .unwrap();
        assert!(back.get("СЛОЙ").is_some());
    }

    #[test]
    fn test_empty_table() {
        let config = DwgReaderConfiguration::default();
        for version in [DwgVersion::AC1015, DwgVersion::AC1018, DwgVersion::AC1021] {
            let codec = VersionCodec::for_version(version);
            let data = DwgClassesWriter::new(codec).write(&DxfClassCollection::new()).unwrap();
            let back = DwgClassesReader::new(codec, &config)
                .read(&data, &mut NotificationCollection::new())
                .unwrap();
            assert!(back.is_empty());
        }
    }
}
