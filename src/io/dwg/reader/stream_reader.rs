//! Bit-level reading of DWG primitives.
//!
//! DWG data is bit-aligned. The trait needs a handful of cursor operations
//! from an implementor and derives every compound primitive from them:
//!
//! - **B** bit, **BB** 2-bit code, **3B** 3-bit code
//! - **BS** BitShort, **BL** BitLong, **BLL** BitLongLong
//! - **BD** BitDouble, **DD** BitDouble with default
//! - **MC** modular char, **MS** modular short
//! - **H** handle reference
//! - **TV** variable text
//! - **RC/RS/RL/RD** raw char, short, long, double
//! - **SN** 16-byte sentinel
//! - **BE** BitExtrusion, **BT** BitThickness, **OT** object type
//!
//! The merged reader of R2007+ records overrides text and handle reads to
//! route them to their own sub-streams; everything else stays on the main
//! stream.

use crate::error::{DwgError, Result};
use crate::io::dwg::reference_type::{HandleCode, HandleReference};
use crate::io::dwg::version_codec::{DefaultedValue, ObjectTypeEncoding, TextEncoding, VersionCodec};
use crate::types::{Vector2, Vector3};

use encoding_rs::Encoding;

/// Upper bound on a single byte-array read.
pub const MAX_READ_LENGTH: usize = 64 * 1024 * 1024;

pub trait DwgStreamReader {
    /// Revision strategy the stream was opened with.
    fn codec(&self) -> &VersionCodec;

    /// Code page used for single-byte text.
    fn encoding(&self) -> &'static Encoding;

    /// Current position in bits from the start of the stream.
    fn position_in_bits(&self) -> u64;

    fn set_position_in_bits(&mut self, position: u64) -> Result<()>;

    fn read_bit(&mut self) -> Result<bool>;

    /// A byte starting at the current bit position.
    fn read_byte(&mut self) -> Result<u8>;

    fn read_2bits(&mut self) -> Result<u8> {
        let hi = self.read_bit()? as u8;
        let lo = self.read_bit()? as u8;
        Ok((hi << 1) | lo)
    }

    fn read_3bits(&mut self) -> Result<u8> {
        let b1 = self.read_bit()? as u8;
        let b2 = self.read_bit()? as u8;
        let b3 = self.read_bit()? as u8;
        Ok((b1 << 2) | (b2 << 1) | b3)
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        if length > MAX_READ_LENGTH {
            return Err(DwgError::InvalidFormat(format!(
                "byte read of {} exceeds the {} byte limit",
                length, MAX_READ_LENGTH
            )));
        }
        (0..length).map(|_| self.read_byte()).collect()
    }

    fn read_raw_short(&mut self) -> Result<i16> {
        Ok(self.read_raw_ushort()? as i16)
    }

    fn read_raw_ushort(&mut self) -> Result<u16> {
        let lo = self.read_byte()? as u16;
        let hi = self.read_byte()? as u16;
        Ok(lo | (hi << 8))
    }

    fn read_raw_long(&mut self) -> Result<i32> {
        Ok(self.read_raw_ulong()? as i32)
    }

    fn read_raw_ulong(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        for b in bytes.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_raw_double(&mut self) -> Result<f64> {
        let mut bytes = [0u8; 8];
        for b in bytes.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_2raw_double(&mut self) -> Result<Vector2> {
        let x = self.read_raw_double()?;
        let y = self.read_raw_double()?;
        Ok(Vector2::new(x, y))
    }

    fn read_3raw_double(&mut self) -> Result<Vector3> {
        let x = self.read_raw_double()?;
        let y = self.read_raw_double()?;
        let z = self.read_raw_double()?;
        Ok(Vector3::new(x, y, z))
    }

    fn read_bit_short(&mut self) -> Result<i16> {
        match self.read_2bits()? {
            // 00: a short follows, little-endian
            0 => self.read_raw_short(),
            // 01: an unsigned char follows
            1 => Ok(self.read_byte()? as i16),
            2 => Ok(0),
            _ => Ok(256),
        }
    }

    fn read_bit_short_as_bool(&mut self) -> Result<bool> {
        Ok(self.read_bit_short()? != 0)
    }

    fn read_bit_long(&mut self) -> Result<i32> {
        match self.read_2bits()? {
            0 => self.read_raw_long(),
            1 => Ok(self.read_byte()? as i32),
            2 => Ok(0),
            tag => Err(DwgError::InvalidTag {
                primitive: "BitLong",
                tag,
            }),
        }
    }

    fn read_bit_long_long(&mut self) -> Result<i64> {
        let size = self.read_3bits()?;
        let mut value: u64 = 0;
        for i in 0..size {
            value |= (self.read_byte()? as u64) << (i as u64 * 8);
        }
        Ok(value as i64)
    }

    fn read_bit_double(&mut self) -> Result<f64> {
        match self.read_2bits()? {
            0 => self.read_raw_double(),
            1 => Ok(1.0),
            2 => Ok(0.0),
            tag => Err(DwgError::InvalidTag {
                primitive: "BitDouble",
                tag,
            }),
        }
    }

    fn read_bit_double_with_default(&mut self, def: f64) -> Result<f64> {
        let mut arr = def.to_le_bytes();
        match self.read_2bits()? {
            0 => Ok(def),
            1 => {
                // 4 bytes patch the low half of the default
                for b in arr.iter_mut().take(4) {
                    *b = self.read_byte()?;
                }
                Ok(f64::from_le_bytes(arr))
            }
            2 => {
                // 6 bytes: [4], [5], then [0..4]
                arr[4] = self.read_byte()?;
                arr[5] = self.read_byte()?;
                for b in arr.iter_mut().take(4) {
                    *b = self.read_byte()?;
                }
                Ok(f64::from_le_bytes(arr))
            }
            _ => self.read_raw_double(),
        }
    }

    fn read_2bit_double(&mut self) -> Result<Vector2> {
        let x = self.read_bit_double()?;
        let y = self.read_bit_double()?;
        Ok(Vector2::new(x, y))
    }

    fn read_3bit_double(&mut self) -> Result<Vector3> {
        let x = self.read_bit_double()?;
        let y = self.read_bit_double()?;
        let z = self.read_bit_double()?;
        Ok(Vector3::new(x, y, z))
    }

    fn read_3bit_double_with_default(&mut self, def: Vector3) -> Result<Vector3> {
        let x = self.read_bit_double_with_default(def.x)?;
        let y = self.read_bit_double_with_default(def.y)?;
        let z = self.read_bit_double_with_default(def.z)?;
        Ok(Vector3::new(x, y, z))
    }

    fn read_modular_char(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 64 {
                return Err(DwgError::InvalidFormat("modular char overflows 64 bits".into()));
            }
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn read_signed_modular_char(&mut self) -> Result<i64> {
        let mut value: i64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 63 {
                return Err(DwgError::InvalidFormat(
                    "signed modular char overflows 64 bits".into(),
                ));
            }
            if byte & 0x80 != 0 {
                value |= ((byte & 0x7F) as i64) << shift;
                shift += 7;
                continue;
            }
            // Terminal byte: bit 0x40 is the sign, 6 payload bits remain
            value |= ((byte & 0x3F) as i64) << shift;
            if byte & 0x40 != 0 {
                value = -value;
            }
            return Ok(value);
        }
    }

    fn read_modular_short(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let word = self.read_raw_ushort()?;
            if shift >= 60 {
                return Err(DwgError::InvalidFormat("modular short overflows 64 bits".into()));
            }
            value |= ((word & 0x7FFF) as u64) << shift;
            if word & 0x8000 == 0 {
                return Ok(value);
            }
            shift += 15;
        }
    }

    /// `counter` bytes as a big-endian magnitude.
    fn read_handle(&mut self, counter: u8) -> Result<u64> {
        if counter > 8 {
            return Err(DwgError::InvalidFormat(format!(
                "handle byte count {} exceeds 8",
                counter
            )));
        }
        let mut value: u64 = 0;
        for _ in 0..counter {
            value = (value << 8) | self.read_byte()? as u64;
        }
        Ok(value)
    }

    /// Read a handle reference and resolve it against `reference`.
    fn read_handle_reference_typed(&mut self, reference: u64) -> Result<(u64, HandleCode)> {
        let (code, counter) = HandleReference::parse_header(self.read_byte()?)?;
        let payload = if code.has_payload() {
            self.read_handle(counter)?
        } else {
            0
        };
        let href = HandleReference {
            code,
            counter,
            payload,
        };
        Ok((href.resolve(reference)?, code))
    }

    fn read_handle_reference(&mut self, reference: u64) -> Result<u64> {
        Ok(self.read_handle_reference_typed(reference)?.0)
    }

    /// Handle reference that is always read from the main stream, such as
    /// the own handle at the start of an object.
    fn read_handle_reference_on_main(&mut self) -> Result<u64> {
        DwgStreamReader::read_handle_reference(self, 0)
    }

    /// TV: text in the revision's encoding.
    fn read_variable_text(&mut self) -> Result<String> {
        let length = self.read_bit_short()?;
        if length <= 0 {
            return Ok(String::new());
        }
        match self.codec().text {
            TextEncoding::Utf16 => {
                let bytes = self.read_bytes((length as usize) << 1)?;
                let (decoded, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(&bytes);
                Ok(decoded.replace('\0', ""))
            }
            TextEncoding::CodePage => {
                let bytes = self.read_bytes(length as usize)?;
                let (decoded, _) = self.encoding().decode_without_bom_handling(&bytes);
                Ok(decoded.replace('\0', ""))
            }
        }
    }

    fn read_sentinel(&mut self) -> Result<[u8; 16]> {
        let mut sentinel = [0u8; 16];
        for b in sentinel.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(sentinel)
    }

    /// OT: object type code.
    fn read_object_type(&mut self) -> Result<u16> {
        match self.codec().object_type {
            ObjectTypeEncoding::BitShort => Ok(self.read_bit_short()? as u16),
            ObjectTypeEncoding::Tagged => match self.read_2bits()? {
                0 => Ok(self.read_byte()? as u16),
                1 => Ok(0x1F0 + self.read_byte()? as u16),
                _ => self.read_raw_ushort(),
            },
        }
    }

    /// BE: extrusion vector, (0,0,1) when flagged as default.
    fn read_bit_extrusion(&mut self) -> Result<Vector3> {
        let mode = self.codec().extrusion;
        match mode {
            DefaultedValue::Flagged if self.read_bit()? => Ok(Vector3::UNIT_Z),
            _ => self.read_3bit_double(),
        }
    }

    /// BT: thickness, 0.0 when flagged as default.
    fn read_bit_thickness(&mut self) -> Result<f64> {
        let mode = self.codec().thickness;
        match mode {
            DefaultedValue::Flagged if self.read_bit()? => Ok(0.0),
            _ => self.read_bit_double(),
        }
    }
}
