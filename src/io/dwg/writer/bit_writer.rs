//! Concrete bit writer over a growable buffer.

use encoding_rs::Encoding;

use super::stream_writer::DwgStreamWriter;
use crate::error::{DwgError, Result};
use crate::io::dwg::version_codec::VersionCodec;

/// Bit-addressable output buffer.
///
/// Writes overwrite exactly the bits they cover, so the cursor can be moved
/// back to patch a placeholder without disturbing neighbouring bits.
#[derive(Debug, Clone)]
pub struct DwgBitWriter {
    data: Vec<u8>,
    position: usize,
    bit_shift: u8,
    saved_position_in_bits: u64,
    encoding: &'static Encoding,
    codec: VersionCodec,
}

impl DwgBitWriter {
    pub fn new(codec: VersionCodec) -> Self {
        Self {
            data: Vec::new(),
            position: 0,
            bit_shift: 0,
            saved_position_in_bits: 0,
            encoding: encoding_rs::WINDOWS_1252,
            codec,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn bit_shift(&self) -> u8 {
        self.bit_shift
    }

    /// Position recorded by the last [`save_position_for_size`](Self::save_position_for_size).
    pub fn saved_position_in_bits(&self) -> u64 {
        self.saved_position_in_bits
    }

    /// Discard everything written so far.
    pub fn reset(&mut self) {
        self.data.clear();
        self.position = 0;
        self.bit_shift = 0;
        self.saved_position_in_bits = 0;
    }

    fn byte_at(&mut self, index: usize) -> &mut u8 {
        if index >= self.data.len() {
            self.data.resize(index + 1, 0);
        }
        &mut self.data[index]
    }

    pub fn set_position_in_bits(&mut self, position: u64) -> Result<()> {
        if position > self.data.len() as u64 * 8 {
            return Err(DwgError::InvalidFormat(format!(
                "bit position {} is past the {} bits written",
                position,
                self.data.len() * 8
            )));
        }
        self.position = (position >> 3) as usize;
        self.bit_shift = (position & 7) as u8;
        Ok(())
    }

    /// Reserve an RL at the current position for a size patched later.
    pub fn save_position_for_size(&mut self) -> Result<()> {
        self.saved_position_in_bits = self.position_in_bits();
        self.write_raw_long(0)
    }

    /// Overwrite the RL at `position` and return to where the cursor was.
    pub fn patch_raw_long(&mut self, position: u64, value: u32) -> Result<()> {
        let current = self.position_in_bits();
        self.set_position_in_bits(position)?;
        self.write_raw_ulong(value)?;
        self.set_position_in_bits(current)
    }

    /// Copy the first `bits` bits of `source`.
    pub fn write_bits_from(&mut self, source: &[u8], bits: u64) -> Result<()> {
        let whole = (bits / 8) as usize;
        let (head, tail) = source.split_at(whole.min(source.len()));
        if head.len() < whole {
            return Err(DwgError::EndOfStream {
                offset_bits: source.len() as u64 * 8,
            });
        }
        self.write_bytes(head)?;
        let rest = (bits % 8) as u8;
        if rest > 0 {
            let last = *tail.first().ok_or(DwgError::EndOfStream {
                offset_bits: source.len() as u64 * 8,
            })?;
            for i in 0..rest {
                self.write_bit(last & (0x80 >> i) != 0)?;
            }
        }
        Ok(())
    }

    /// Write a text sub-stream size backwards-readable from the flag bit
    /// that follows it.
    ///
    /// Sizes from 0x8000 take two words: the high part first, then the low
    /// 15 bits tagged with 0x8000.
    pub fn set_position_by_flag(&mut self, size: u64) -> Result<()> {
        if size >= 0x4000_0000 {
            return Err(DwgError::InvalidFormat(format!(
                "text stream of {} bits is too large",
                size
            )));
        }
        if size >= 0x8000 {
            self.write_raw_ushort((size >> 15) as u16)?;
            self.write_raw_ushort(((size & 0x7FFF) as u16) | 0x8000)
        } else {
            self.write_raw_ushort(size as u16)
        }
    }
}

impl DwgStreamWriter for DwgBitWriter {
    fn codec(&self) -> &VersionCodec {
        &self.codec
    }

    fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn position_in_bits(&self) -> u64 {
        self.position as u64 * 8 + self.bit_shift as u64
    }

    fn write_bit(&mut self, value: bool) -> Result<()> {
        let mask = 0x80u8 >> self.bit_shift;
        let byte = self.byte_at(self.position);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        self.bit_shift += 1;
        if self.bit_shift == 8 {
            self.bit_shift = 0;
            self.position += 1;
        }
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        let shift = self.bit_shift;
        if shift == 0 {
            *self.byte_at(self.position) = value;
        } else {
            let low_mask = 0xFFu8 >> shift;
            let first = self.byte_at(self.position);
            *first = (*first & !low_mask) | (value >> shift);
            let second = self.byte_at(self.position + 1);
            *second = (*second & low_mask) | (value << (8 - shift));
        }
        self.position += 1;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.bit_shift == 0 {
            let end = self.position + bytes.len();
            if end > self.data.len() {
                self.data.resize(end, 0);
            }
            self.data[self.position..end].copy_from_slice(bytes);
            self.position = end;
            return Ok(());
        }
        bytes.iter().try_for_each(|&b| self.write_byte(b))
    }

    fn write_spear_shift(&mut self) -> Result<()> {
        while self.bit_shift != 0 {
            self.write_bit(false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dwg::reader::{DwgBitReader, DwgStreamReader};
    use crate::types::{DwgVersion, Vector3};

    fn make_writer() -> DwgBitWriter {
        DwgBitWriter::new(VersionCodec::for_version(DwgVersion::AC1015))
    }

    fn reader_for(writer: &DwgBitWriter) -> DwgBitReader {
        DwgBitReader::new(writer.data().to_vec(), *writer.codec())
    }

    #[test]
    fn test_write_bits_msb_first() {
        let mut w = make_writer();
        for bit in [true, false, true, true] {
            w.write_bit(bit).unwrap();
        }
        assert_eq!(w.data(), &[0xB0]);
        assert_eq!(w.position_in_bits(), 4);
    }

    #[test]
    fn test_bit_short_scenario() {
        let mut w = make_writer();
        w.write_bit_short(0).unwrap();
        assert_eq!(w.position_in_bits(), 2);
        assert_eq!(w.data(), &[0x80]);

        let mut w = make_writer();
        w.write_bit_short(5).unwrap();
        // 01 00000101
        assert_eq!(w.position_in_bits(), 10);
        assert_eq!(w.data(), &[0x41, 0x40]);

        let mut w = make_writer();
        w.write_bit_short(256).unwrap();
        assert_eq!(w.position_in_bits(), 2);
        assert_eq!(w.data(), &[0xC0]);

        let mut w = make_writer();
        w.write_bit_short(1000).unwrap();
        w.write_spear_shift().unwrap();
        // 00 11101000 00000011
        assert_eq!(w.data(), &[0x3A, 0x00, 0xC0]);
    }

    #[test]
    fn test_bit_long_prefers_byte_form() {
        let mut w = make_writer();
        w.write_bit_long(200).unwrap();
        assert_eq!(w.position_in_bits(), 10);
        let mut w = make_writer();
        w.write_bit_long(-1).unwrap();
        assert_eq!(w.position_in_bits(), 34);
    }

    #[test]
    fn test_bit_double_negative_zero_keeps_sign() {
        let mut w = make_writer();
        w.write_bit_double(-0.0).unwrap();
        assert_eq!(w.position_in_bits(), 66);
        let value = reader_for(&w).read_bit_double().unwrap();
        assert!(value == 0.0 && value.is_sign_negative());
    }

    #[test]
    fn test_default_double_tags() {
        let def = 1.0f64;
        let mut w = make_writer();
        w.write_bit_double_with_default(def, def).unwrap();
        assert_eq!(w.position_in_bits(), 2);

        // Same high 4 bytes: 4-byte patch
        let near = f64::from_bits(def.to_bits() | 0x1234);
        let mut w = make_writer();
        w.write_bit_double_with_default(def, near).unwrap();
        assert_eq!(w.position_in_bits(), 2 + 32);
        assert_eq!(
            reader_for(&w).read_bit_double_with_default(def).unwrap().to_bits(),
            near.to_bits()
        );

        // Same high 2 bytes: 6-byte patch
        let mid = f64::from_bits(def.to_bits() | 0x0000_1200_0000_0034);
        let mut w = make_writer();
        w.write_bit_double_with_default(def, mid).unwrap();
        assert_eq!(w.position_in_bits(), 2 + 48);
        assert_eq!(
            reader_for(&w).read_bit_double_with_default(def).unwrap().to_bits(),
            mid.to_bits()
        );

        let mut w = make_writer();
        w.write_bit_double_with_default(def, -123.25).unwrap();
        assert_eq!(w.position_in_bits(), 2 + 64);
    }

    #[test]
    fn test_overwrite_preserves_neighbours() {
        let mut w = make_writer();
        w.write_bytes(&[0xFF, 0xFF, 0xFF]).unwrap();
        w.set_position_in_bits(4).unwrap();
        w.write_byte(0x00).unwrap();
        assert_eq!(w.data(), &[0xF0, 0x0F, 0xFF]);
        w.set_position_in_bits(23).unwrap();
        w.write_bit(false).unwrap();
        assert_eq!(w.data(), &[0xF0, 0x0F, 0xFE]);
        assert!(w.set_position_in_bits(25).is_err());
    }

    #[test]
    fn test_patch_raw_long_at_unaligned_position() {
        let mut w = make_writer();
        w.write_bit(true).unwrap();
        w.save_position_for_size().unwrap();
        w.write_bit(true).unwrap();
        let saved = w.saved_position_in_bits();
        assert_eq!(saved, 1);
        w.patch_raw_long(saved, 0xA1B2C3D4).unwrap();
        assert_eq!(w.position_in_bits(), 34);

        let mut r = reader_for(&w);
        assert!(r.read_bit().unwrap());
        assert_eq!(r.read_raw_ulong().unwrap(), 0xA1B2C3D4);
        assert!(r.read_bit().unwrap());
    }

    #[test]
    fn test_modular_roundtrip() {
        let mut w = make_writer();
        for v in [0u64, 1, 127, 128, 0x3FFF, 0x4000, u32::MAX as u64] {
            w.write_modular_char(v).unwrap();
        }
        for v in [0i64, 63, 64, -1, -64, -65, 1_000_000, -1_000_000] {
            w.write_signed_modular_char(v).unwrap();
        }
        for v in [0u64, 0x7FFF, 0x8000, 0x1234_5678] {
            w.write_modular_short(v).unwrap();
        }
        let mut r = reader_for(&w);
        for v in [0u64, 1, 127, 128, 0x3FFF, 0x4000, u32::MAX as u64] {
            assert_eq!(r.read_modular_char().unwrap(), v);
        }
        for v in [0i64, 63, 64, -1, -64, -65, 1_000_000, -1_000_000] {
            assert_eq!(r.read_signed_modular_char().unwrap(), v);
        }
        for v in [0u64, 0x7FFF, 0x8000, 0x1234_5678] {
            assert_eq!(r.read_modular_short().unwrap(), v);
        }
    }

    #[test]
    fn test_signed_modular_char_bytes() {
        let mut w = make_writer();
        w.write_signed_modular_char(-5).unwrap();
        assert_eq!(w.data(), &[0x45]);
    }

    #[test]
    fn test_object_type_tagged_forms() {
        let codec = VersionCodec::for_version(DwgVersion::AC1024);
        for (value, bits) in [(0x13u16, 10u64), (0x1F2, 10), (0x1234, 18)] {
            let mut w = DwgBitWriter::new(codec);
            w.write_object_type(value).unwrap();
            assert_eq!(w.position_in_bits(), bits);
            assert_eq!(reader_for(&w).read_object_type().unwrap(), value);
        }
    }

    #[test]
    fn test_extrusion_default_is_one_bit() {
        let mut w = make_writer();
        w.write_bit_extrusion(Vector3::UNIT_Z).unwrap();
        w.write_bit_thickness(0.0).unwrap();
        assert_eq!(w.position_in_bits(), 2);

        let mut w = DwgBitWriter::new(VersionCodec::for_version(DwgVersion::AC1014));
        w.write_bit_extrusion(Vector3::UNIT_Z).unwrap();
        assert_eq!(w.position_in_bits(), 6);
        assert_eq!(reader_for(&w).read_bit_extrusion().unwrap(), Vector3::UNIT_Z);
    }

    #[test]
    fn test_text_roundtrip_both_encodings() {
        for version in [DwgVersion::AC1015, DwgVersion::AC1021] {
            let mut w = DwgBitWriter::new(VersionCodec::for_version(version));
            w.write_bit(true).unwrap();
            w.write_variable_text("Layer 0").unwrap();
            w.write_variable_text("").unwrap();
            let mut r = reader_for(&w);
            r.read_bit().unwrap();
            assert_eq!(r.read_variable_text().unwrap(), "Layer 0");
            assert_eq!(r.read_variable_text().unwrap(), "");
        }
    }

    #[test]
    fn test_flag_size_words() {
        let mut w = make_writer();
        w.set_position_by_flag(0x10).unwrap();
        assert_eq!(w.data(), &[0x10, 0x00]);

        let mut w = make_writer();
        w.set_position_by_flag(0x8001).unwrap();
        assert_eq!(w.data(), &[0x01, 0x00, 0x01, 0x80]);
        assert!(make_writer().set_position_by_flag(0x4000_0000).is_err());
    }

    #[test]
    fn test_write_bits_from() {
        let mut w = make_writer();
        w.write_bit(false).unwrap();
        w.write_bits_from(&[0xFF, 0xE0], 11).unwrap();
        assert_eq!(w.position_in_bits(), 12);
        assert_eq!(w.data(), &[0x7F, 0xF0]);
        assert!(w.write_bits_from(&[0xFF], 9).is_err());
    }
}
