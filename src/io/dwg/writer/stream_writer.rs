//! Bit-level writing of DWG primitives.
//!
//! The write side of [`DwgStreamReader`](crate::io::dwg::reader::DwgStreamReader).
//! Every primitive is emitted bit-for-bit the way the reader expects it,
//! including the tag choice: the shortest form that represents the value
//! is always taken.

use crate::error::{DwgError, Result};
use crate::io::dwg::reference_type::{DwgReferenceType, HandleReference};
use crate::io::dwg::version_codec::{DefaultedValue, ObjectTypeEncoding, TextEncoding, VersionCodec};
use crate::types::{Vector2, Vector3};

use encoding_rs::Encoding;

pub trait DwgStreamWriter {
    fn codec(&self) -> &VersionCodec;

    fn encoding(&self) -> &'static Encoding;

    fn position_in_bits(&self) -> u64;

    fn write_bit(&mut self, value: bool) -> Result<()>;

    /// A byte starting at the current bit position.
    fn write_byte(&mut self, value: u8) -> Result<()>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        bytes.iter().try_for_each(|&b| self.write_byte(b))
    }

    /// Zero-fill to the next byte boundary.
    fn write_spear_shift(&mut self) -> Result<()>;

    fn write_2bits(&mut self, value: u8) -> Result<()> {
        self.write_bit(value & 0x02 != 0)?;
        self.write_bit(value & 0x01 != 0)
    }

    fn write_3bits(&mut self, value: u8) -> Result<()> {
        self.write_bit(value & 0x04 != 0)?;
        self.write_bit(value & 0x02 != 0)?;
        self.write_bit(value & 0x01 != 0)
    }

    fn write_raw_short(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_raw_ushort(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_raw_long(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_raw_ulong(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_raw_double(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_2raw_double(&mut self, value: Vector2) -> Result<()> {
        self.write_raw_double(value.x)?;
        self.write_raw_double(value.y)
    }

    fn write_3raw_double(&mut self, value: Vector3) -> Result<()> {
        self.write_raw_double(value.x)?;
        self.write_raw_double(value.y)?;
        self.write_raw_double(value.z)
    }

    fn write_bit_short(&mut self, value: i16) -> Result<()> {
        match value {
            0 => self.write_2bits(2),
            1..=255 => {
                self.write_2bits(1)?;
                self.write_byte(value as u8)
            }
            256 => self.write_2bits(3),
            _ => {
                self.write_2bits(0)?;
                self.write_raw_short(value)
            }
        }
    }

    fn write_bit_long(&mut self, value: i32) -> Result<()> {
        match value {
            0 => self.write_2bits(2),
            1..=255 => {
                self.write_2bits(1)?;
                self.write_byte(value as u8)
            }
            _ => {
                self.write_2bits(0)?;
                self.write_raw_long(value)
            }
        }
    }

    fn write_bit_long_long(&mut self, value: i64) -> Result<()> {
        let unsigned = value as u64;
        let size = crate::io::dwg::reference_type::byte_count(unsigned);
        if size > 7 {
            return Err(DwgError::InvalidFormat(format!(
                "BitLongLong {:#X} needs {} bytes, at most 7 fit the 3-bit count",
                unsigned, size
            )));
        }
        self.write_3bits(size)?;
        for i in 0..size {
            self.write_byte((unsigned >> (i as u32 * 8)) as u8)?;
        }
        Ok(())
    }

    fn write_bit_double(&mut self, value: f64) -> Result<()> {
        // Bit patterns, so -0.0 keeps its sign through the full form
        if value.to_bits() == 1.0f64.to_bits() {
            self.write_2bits(1)
        } else if value.to_bits() == 0.0f64.to_bits() {
            self.write_2bits(2)
        } else {
            self.write_2bits(0)?;
            self.write_raw_double(value)
        }
    }

    fn write_bit_double_with_default(&mut self, def: f64, value: f64) -> Result<()> {
        if def.to_bits() == value.to_bits() {
            return self.write_2bits(0);
        }

        let def_bytes = def.to_le_bytes();
        let value_bytes = value.to_le_bytes();
        let equal_high = def_bytes
            .iter()
            .rev()
            .zip(value_bytes.iter().rev())
            .take_while(|(d, v)| d == v)
            .count();

        if equal_high >= 4 {
            self.write_2bits(1)?;
            self.write_bytes(&value_bytes[0..4])
        } else if equal_high >= 2 {
            self.write_2bits(2)?;
            self.write_byte(value_bytes[4])?;
            self.write_byte(value_bytes[5])?;
            self.write_bytes(&value_bytes[0..4])
        } else {
            self.write_2bits(3)?;
            self.write_raw_double(value)
        }
    }

    fn write_2bit_double(&mut self, value: Vector2) -> Result<()> {
        self.write_bit_double(value.x)?;
        self.write_bit_double(value.y)
    }

    fn write_3bit_double(&mut self, value: Vector3) -> Result<()> {
        self.write_bit_double(value.x)?;
        self.write_bit_double(value.y)?;
        self.write_bit_double(value.z)
    }

    fn write_3bit_double_with_default(&mut self, def: Vector3, value: Vector3) -> Result<()> {
        self.write_bit_double_with_default(def.x, value.x)?;
        self.write_bit_double_with_default(def.y, value.y)?;
        self.write_bit_double_with_default(def.z, value.z)
    }

    fn write_modular_char(&mut self, value: u64) -> Result<()> {
        let mut rest = value;
        loop {
            let low = (rest & 0x7F) as u8;
            rest >>= 7;
            if rest == 0 {
                return self.write_byte(low);
            }
            self.write_byte(low | 0x80)?;
        }
    }

    fn write_signed_modular_char(&mut self, value: i64) -> Result<()> {
        let negative = value < 0;
        let mut rest = value.unsigned_abs();
        // 7 payload bits per continuation byte, 6 in the terminal byte
        while rest >= 0x40 {
            self.write_byte((rest & 0x7F) as u8 | 0x80)?;
            rest >>= 7;
        }
        let sign = if negative { 0x40 } else { 0 };
        self.write_byte(rest as u8 | sign)
    }

    fn write_modular_short(&mut self, value: u64) -> Result<()> {
        let mut rest = value;
        loop {
            let low = (rest & 0x7FFF) as u16;
            rest >>= 15;
            if rest == 0 {
                return self.write_raw_ushort(low);
            }
            self.write_raw_ushort(low | 0x8000)?;
        }
    }

    fn write_handle_reference_raw(&mut self, reference: &HandleReference) -> Result<()> {
        self.write_bytes(&reference.to_bytes())
    }

    /// Absolute reference with the minimal payload.
    fn write_handle_reference(&mut self, reference_type: DwgReferenceType, handle: u64) -> Result<()> {
        self.write_handle_reference_raw(&HandleReference::absolute(reference_type, handle))
    }

    /// Shortest reference resolving to `handle` against `reference`.
    fn write_handle_reference_relative(&mut self, handle: u64, reference: u64) -> Result<()> {
        self.write_handle_reference_raw(&HandleReference::relative(handle, reference))
    }

    /// Reference that stays on the main stream even when handles are
    /// routed elsewhere.
    fn write_handle_reference_on_main(&mut self, handle: u64) -> Result<()> {
        DwgStreamWriter::write_handle_reference(self, DwgReferenceType::Undefined, handle)
    }

    fn write_variable_text(&mut self, value: &str) -> Result<()> {
        if value.is_empty() {
            return self.write_bit_short(0);
        }
        let (length, bytes) = match self.codec().text {
            TextEncoding::Utf16 => {
                let units: Vec<u16> = value.encode_utf16().collect();
                let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
                (units.len(), bytes)
            }
            TextEncoding::CodePage => {
                let (encoded, _, _) = self.encoding().encode(value);
                (encoded.len(), encoded.into_owned())
            }
        };
        let length = i16::try_from(length).map_err(|_| {
            DwgError::InvalidFormat(format!("text of {} units does not fit a BitShort", length))
        })?;
        self.write_bit_short(length)?;
        self.write_bytes(&bytes)
    }

    fn write_sentinel(&mut self, sentinel: &[u8; 16]) -> Result<()> {
        self.write_bytes(sentinel)
    }

    fn write_object_type(&mut self, value: u16) -> Result<()> {
        match self.codec().object_type {
            ObjectTypeEncoding::BitShort => self.write_bit_short(value as i16),
            ObjectTypeEncoding::Tagged => match value {
                0..=0xFF => {
                    self.write_2bits(0)?;
                    self.write_byte(value as u8)
                }
                0x1F0..=0x2EF => {
                    self.write_2bits(1)?;
                    self.write_byte((value - 0x1F0) as u8)
                }
                _ => {
                    self.write_2bits(2)?;
                    self.write_raw_ushort(value)
                }
            },
        }
    }

    fn write_bit_extrusion(&mut self, normal: Vector3) -> Result<()> {
        match self.codec().extrusion {
            DefaultedValue::Flagged if normal == Vector3::UNIT_Z => self.write_bit(true),
            DefaultedValue::Flagged => {
                self.write_bit(false)?;
                self.write_3bit_double(normal)
            }
            DefaultedValue::Raw => self.write_3bit_double(normal),
        }
    }

    fn write_bit_thickness(&mut self, thickness: f64) -> Result<()> {
        match self.codec().thickness {
            DefaultedValue::Flagged if thickness == 0.0 => self.write_bit(true),
            DefaultedValue::Flagged => {
                self.write_bit(false)?;
                self.write_bit_double(thickness)
            }
            DefaultedValue::Raw => self.write_bit_double(thickness),
        }
    }
}
