//! Reader over the sub-streams of one object record.
//!
//! A record body holds up to three logical streams in one byte range:
//! - **Main data**: numbers, flags, points
//! - **Text data** (R2007+): every TV, stored just before the handles
//! - **Handle data**: every handle reference except the object's own
//!
//! [`DwgMergedReader`] keeps one cursor per stream and routes each read to
//! the right one, so callers decode fields in declaration order without
//! caring where the bits live.

use encoding_rs::Encoding;

use super::bit_reader::DwgBitReader;
use super::stream_reader::DwgStreamReader;
use crate::error::{DwgError, Result};
use crate::io::dwg::reference_type::HandleCode;
use crate::io::dwg::version_codec::VersionCodec;

pub struct DwgMergedReader {
    main: DwgBitReader,
    /// `None` before R2007, where text is inline in main.
    text: Option<DwgBitReader>,
    handles: DwgBitReader,
    handle_start: u64,
    main_end: u64,
}

impl DwgMergedReader {
    /// Split `data` at `handle_start` (in bits from the start of `data`).
    ///
    /// For revisions with a merged text stream the text start is located
    /// from the flag bit at `handle_start - 1`.
    pub fn new(data: Vec<u8>, codec: VersionCodec, handle_start: u64) -> Result<Self> {
        Self::with_encoding(data, codec, handle_start, encoding_rs::WINDOWS_1252)
    }

    pub fn with_encoding(
        data: Vec<u8>,
        codec: VersionCodec,
        handle_start: u64,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let main = DwgBitReader::new(data, codec).with_encoding(encoding);
        if handle_start > main.stream_length() * 8 {
            return Err(DwgError::InvalidFormat(format!(
                "handle stream at bit {} starts past the {} byte record",
                handle_start,
                main.stream_length()
            )));
        }

        let mut handles = main.clone();
        handles.set_position_in_bits(handle_start)?;

        let (text, main_end) = if codec.merged_text {
            let flag_position = handle_start.checked_sub(1).ok_or_else(|| {
                DwgError::InvalidFormat("record has no room for the text flag".into())
            })?;
            let mut text = main.clone();
            let start = text.set_position_by_flag(flag_position)?;
            tracing::trace!(handle_start, text_start = ?start, "located text stream");
            (Some(text), start.unwrap_or(flag_position))
        } else {
            (None, handle_start)
        };

        Ok(Self {
            main,
            text,
            handles,
            handle_start,
            main_end,
        })
    }

    pub fn main(&mut self) -> &mut DwgBitReader {
        &mut self.main
    }

    pub fn text(&mut self) -> Option<&mut DwgBitReader> {
        self.text.as_mut()
    }

    pub fn handles(&mut self) -> &mut DwgBitReader {
        &mut self.handles
    }

    pub fn handle_start(&self) -> u64 {
        self.handle_start
    }

    /// First bit after the main stream: the text start, the text flag or
    /// the handle start, whichever follows main in this record.
    pub fn main_end(&self) -> u64 {
        self.main_end
    }
}

impl DwgStreamReader for DwgMergedReader {
    fn codec(&self) -> &VersionCodec {
        self.main.codec()
    }

    fn encoding(&self) -> &'static Encoding {
        self.main.encoding()
    }

    fn position_in_bits(&self) -> u64 {
        self.main.position_in_bits()
    }

    fn set_position_in_bits(&mut self, position: u64) -> Result<()> {
        self.main.set_position_in_bits(position)
    }

    fn read_bit(&mut self) -> Result<bool> {
        self.main.read_bit()
    }

    fn read_2bits(&mut self) -> Result<u8> {
        self.main.read_2bits()
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.main.read_byte()
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        self.main.read_bytes(length)
    }

    // ---------------------------------------------------------------
    // Handle references → handle stream
    // ---------------------------------------------------------------

    fn read_handle_reference_typed(&mut self, reference: u64) -> Result<(u64, HandleCode)> {
        self.handles.read_handle_reference_typed(reference)
    }

    fn read_handle_reference_on_main(&mut self) -> Result<u64> {
        self.main.read_handle_reference(0)
    }

    // ---------------------------------------------------------------
    // Text → text stream
    // ---------------------------------------------------------------

    fn read_variable_text(&mut self) -> Result<String> {
        match self.text.as_mut() {
            Some(text) => text.read_variable_text(),
            None => self.main.read_variable_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dwg::writer::{DwgMergedWriter, DwgStreamWriter};
    use crate::types::DwgVersion;

    fn codec(version: DwgVersion) -> VersionCodec {
        VersionCodec::for_version(version)
    }

    #[test]
    fn test_routes_fields_by_kind() {
        for version in [DwgVersion::AC1015, DwgVersion::AC1021] {
            let mut w = DwgMergedWriter::new(codec(version));
            w.save_position_for_size().unwrap();
            w.write_bit_short(42).unwrap();
            w.write_variable_text("Hello").unwrap();
            w.write_handle_reference_on_main(0x2F).unwrap();
            w.write_handle_reference_relative(0x31, 0x2F).unwrap();
            w.write_bit_double(2.5).unwrap();
            w.write_variable_text("World").unwrap();
            let out = w.finish().unwrap();

            let mut r = DwgMergedReader::new(out.data, codec(version), out.handle_start).unwrap();
            assert_eq!(r.read_raw_ulong().unwrap() as u64, out.handle_start);
            assert_eq!(r.read_bit_short().unwrap(), 42);
            assert_eq!(r.read_variable_text().unwrap(), "Hello");
            assert_eq!(r.read_handle_reference_on_main().unwrap(), 0x2F);
            assert_eq!(r.read_handle_reference(0x2F).unwrap(), 0x31);
            assert_eq!(r.read_bit_double().unwrap(), 2.5);
            assert_eq!(r.read_variable_text().unwrap(), "World");
        }
    }

    #[test]
    fn test_clear_flag_yields_empty_text() {
        let mut w = DwgMergedWriter::new(codec(DwgVersion::AC1021));
        w.write_bit_long(7).unwrap();
        w.write_handle_reference_relative(0x10, 0x0F).unwrap();
        let out = w.finish().unwrap();

        let mut r = DwgMergedReader::new(out.data, codec(DwgVersion::AC1021), out.handle_start)
            .unwrap();
        assert!(r.text().unwrap().is_empty());
        assert_eq!(r.main_end(), out.handle_start - 1);
        assert_eq!(r.read_bit_long().unwrap(), 7);
        assert_eq!(r.read_variable_text().unwrap(), "");
        assert_eq!(r.read_handle_reference(0x0F).unwrap(), 0x10);
    }

    #[test]
    fn test_large_text_stream_uses_two_size_words() {
        let long = "x".repeat(0x500);
        let mut w = DwgMergedWriter::new(codec(DwgVersion::AC1024));
        for _ in 0..3 {
            w.write_variable_text(&long).unwrap();
        }
        let out = w.finish().unwrap();
        // 3 * (BS tag + 16-bit count + 0x500 UTF-16 units) > 0x8000 bits
        let mut r = DwgMergedReader::new(out.data, codec(DwgVersion::AC1024), out.handle_start)
            .unwrap();
        for _ in 0..3 {
            assert_eq!(r.read_variable_text().unwrap(), long);
        }
    }

    #[test]
    fn test_handle_start_past_end_rejected() {
        assert!(DwgMergedReader::new(vec![0; 4], codec(DwgVersion::AC1015), 33).is_err());
        assert!(DwgMergedReader::new(vec![0; 4], codec(DwgVersion::AC1021), 0).is_err());
    }
}
