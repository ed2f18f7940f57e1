//! Concrete bit reader over an in-memory buffer.

use std::io::{Cursor, Read};

use encoding_rs::Encoding;

use super::stream_reader::DwgStreamReader;
use crate::error::{DwgError, Result};
use crate::io::dwg::version_codec::{TextEncoding, VersionCodec};

/// Bit-addressable cursor.
///
/// The byte under a partial position is cached in `last_byte`; `bit_shift`
/// counts how many of its bits (MSB first) have been consumed. The
/// underlying cursor always points one past the cached byte when the shift
/// is nonzero.
#[derive(Debug, Clone)]
pub struct DwgBitReader {
    stream: Cursor<Vec<u8>>,
    bit_shift: u8,
    last_byte: u8,
    is_empty: bool,
    encoding: &'static Encoding,
    codec: VersionCodec,
}

impl DwgBitReader {
    pub fn new(data: Vec<u8>, codec: VersionCodec) -> Self {
        Self {
            stream: Cursor::new(data),
            bit_shift: 0,
            last_byte: 0,
            is_empty: false,
            encoding: encoding_rs::WINDOWS_1252,
            codec,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
    }

    pub fn stream_length(&self) -> u64 {
        self.stream.get_ref().len() as u64
    }

    pub fn get_ref(&self) -> &[u8] {
        self.stream.get_ref()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.stream.into_inner()
    }

    /// Byte position of the underlying cursor.
    pub fn position(&self) -> u64 {
        self.stream.position()
    }

    /// Jump to a byte position and drop any partial bit state.
    pub fn set_position(&mut self, position: u64) {
        self.stream.set_position(position);
        self.bit_shift = 0;
    }

    pub fn bit_shift(&self) -> u8 {
        self.bit_shift
    }

    /// Whether this stream has been marked as carrying no data, as a text
    /// stream does when its presence flag is clear.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn set_empty(&mut self, empty: bool) {
        self.is_empty = empty;
    }

    /// Remaining whole bits.
    pub fn remaining_bits(&self) -> u64 {
        (self.stream_length() * 8).saturating_sub(self.position_in_bits())
    }

    fn read_raw_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        match self.stream.read(&mut buf) {
            Ok(1) => Ok(buf[0]),
            Ok(_) => Err(DwgError::EndOfStream {
                offset_bits: self.stream.position() * 8,
            }),
            Err(e) => Err(DwgError::Io(e)),
        }
    }

    fn advance_byte(&mut self) -> Result<()> {
        self.last_byte = self.read_raw_byte()?;
        Ok(())
    }

    /// Skip `count` bytes from the current bit position.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        let target = self.position_in_bits() + count as u64 * 8;
        self.set_position_in_bits(target)
    }

    /// Drop the bit shift and read a raw little-endian u16 from the next
    /// byte boundary.
    pub fn reset_shift(&mut self) -> Result<u16> {
        self.bit_shift = 0;
        self.advance_byte()?;
        let low = self.last_byte as u16;
        self.advance_byte()?;
        let high = self.last_byte as u16;
        Ok(low | (high << 8))
    }

    /// Locate the text sub-stream of an R2007+ record from its presence
    /// flag at bit `flag_position`.
    ///
    /// Returns the text start and leaves the cursor there, or `None` when
    /// the flag is clear; the stream is then marked empty and text reads
    /// yield "" without consuming anything.
    pub fn set_position_by_flag(&mut self, flag_position: u64) -> Result<Option<u64>> {
        self.set_position_in_bits(flag_position)?;
        if !self.read_bit()? {
            self.is_empty = true;
            return Ok(None);
        }
        self.is_empty = false;

        let malformed = |what: &str| {
            DwgError::InvalidFormat(format!(
                "text stream {} before flag at bit {}",
                what, flag_position
            ))
        };

        let mut field = flag_position.checked_sub(16).ok_or_else(|| malformed("size"))?;
        self.set_position_in_bits(field)?;
        let mut size = self.read_raw_ushort()? as u64;
        if size & 0x8000 != 0 {
            field = field.checked_sub(16).ok_or_else(|| malformed("high size"))?;
            self.set_position_in_bits(field)?;
            let hi = self.read_raw_ushort()? as u64;
            size = (size & 0x7FFF) | (hi << 15);
        }

        let start = field
            .checked_sub(size)
            .ok_or_else(|| malformed("larger than the record"))?;
        self.set_position_in_bits(start)?;
        Ok(Some(start))
    }
}

impl DwgStreamReader for DwgBitReader {
    fn codec(&self) -> &VersionCodec {
        &self.codec
    }

    fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn position_in_bits(&self) -> u64 {
        let bits = self.stream.position() * 8;
        if self.bit_shift > 0 {
            bits + self.bit_shift as u64 - 8
        } else {
            bits
        }
    }

    fn set_position_in_bits(&mut self, position: u64) -> Result<()> {
        if position > self.stream_length() * 8 {
            return Err(DwgError::EndOfStream {
                offset_bits: position,
            });
        }
        self.set_position(position >> 3);
        self.bit_shift = (position & 7) as u8;
        if self.bit_shift > 0 {
            self.advance_byte()?;
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool> {
        if self.bit_shift == 0 {
            self.advance_byte()?;
            self.bit_shift = 1;
            return Ok(self.last_byte & 0x80 != 0);
        }
        let value = (self.last_byte << self.bit_shift) & 0x80 != 0;
        self.bit_shift = (self.bit_shift + 1) & 7;
        Ok(value)
    }

    fn read_2bits(&mut self) -> Result<u8> {
        match self.bit_shift {
            0 => {
                self.advance_byte()?;
                self.bit_shift = 2;
                Ok(self.last_byte >> 6)
            }
            7 => {
                let hi = (self.last_byte << 1) & 0x02;
                self.advance_byte()?;
                self.bit_shift = 1;
                Ok(hi | (self.last_byte >> 7))
            }
            shift => {
                let value = (self.last_byte >> (6 - shift)) & 0x03;
                self.bit_shift = (shift + 2) & 7;
                Ok(value)
            }
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        if self.bit_shift == 0 {
            self.last_byte = self.read_raw_byte()?;
            return Ok(self.last_byte);
        }
        let high = ((self.last_byte as u16) << self.bit_shift) as u8;
        self.last_byte = self.read_raw_byte()?;
        Ok(high | (self.last_byte >> (8 - self.bit_shift)))
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        if length > super::stream_reader::MAX_READ_LENGTH {
            return Err(DwgError::InvalidFormat(format!(
                "byte read of {} exceeds the read limit",
                length
            )));
        }
        if self.remaining_bits() < length as u64 * 8 {
            return Err(DwgError::EndOfStream {
                offset_bits: self.stream_length() * 8,
            });
        }
        let mut raw = vec![0u8; length];
        self.stream.read_exact(&mut raw)?;
        if self.bit_shift == 0 {
            if let Some(&last) = raw.last() {
                self.last_byte = last;
            }
            return Ok(raw);
        }
        let shift = 8 - self.bit_shift;
        for byte in raw.iter_mut() {
            let high = ((self.last_byte as u16) << self.bit_shift) as u8;
            self.last_byte = *byte;
            *byte = high | (self.last_byte >> shift);
        }
        Ok(raw)
    }

    fn read_variable_text(&mut self) -> Result<String> {
        if self.is_empty {
            return Ok(String::new());
        }
        let length = self.read_bit_short()?;
        if length <= 0 {
            return Ok(String::new());
        }
        let (bytes, encoding) = match self.codec.text {
            TextEncoding::Utf16 => {
                (self.read_bytes((length as usize) << 1)?, encoding_rs::UTF_16LE)
            }
            TextEncoding::CodePage => {
                (self.read_bytes(length as usize)?, self.encoding)
            }
        };
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes);
        Ok(decoded.replace('\0', ""))
    }
}
