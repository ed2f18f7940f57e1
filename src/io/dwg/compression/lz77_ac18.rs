//! LZ77 AC18 compression and decompression.
//!
//! The variant used by AC1018 (R2004), AC1024 (R2010), AC1027 (R2013) and
//! AC1032 (R2018) section pages.
//!
//! Stream grammar:
//!
//! ```text
//! stream   := literals? (match literals?)* 0x11
//! literals := run-length opcode (high nibble 0), literal bytes
//! match    := one of three opcode layouts; the low 2 bits of its last
//!             offset byte hold 1..=3 trailing literals inline
//! ```
//!
//! Match layouts, by first opcode byte:
//!
//! | opcode      | length        | offset          |
//! |-------------|---------------|-----------------|
//! | 0x40..=0xFF | `(op>>4) - 1` | 1..=0x400       |
//! | 0x20..=0x3F | `op & 0x1F`+2 | 1..=0x4000      |
//! | 0x10..=0x1F | `op & 7` + 2  | 0x4001..=0xBFFF |
//!
//! A zero length field is followed by an escape chain: each 0 byte adds
//! 0xFF and the first nonzero byte ends it.

use super::{copy_back, source_window, Compressor, Decompressor, MatchFinder, MAX_MATCH_DISTANCE};
use crate::error::{DwgError, Result};

const TERMINATOR: u8 = 0x11;

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

/// Decompressor for the LZ77 AC18 variant.
pub struct Lz77Ac18Decompressor;

impl Decompressor for Lz77Ac18Decompressor {
    fn decompress(&self, source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        let mut input = Input { data: source, pos: 0 };
        // Inputs under 4 bytes are padded to the first literal run
        let limit = decompressed_size.max(4);
        let mut out = Vec::with_capacity(decompressed_size);

        let mut opcode = input.byte()?;
        if opcode & 0xF0 == 0 {
            let count = literal_count(opcode, &mut input)? + 3;
            opcode = copy_literals(count, &mut input, &mut out, limit)?;
        }

        while opcode != TERMINATOR {
            let (length, distance);
            if opcode < 0x10 || opcode >= 0x40 {
                length = ((opcode >> 4) as usize).checked_sub(1).ok_or_else(|| {
                    DwgError::Decompression(format!(
                        "opcode {:#04X} at {} is not a back-reference",
                        opcode,
                        input.pos - 1
                    ))
                })?;
                let next = input.byte()?;
                distance = ((((opcode >> 2) & 3) as usize) | ((next as usize) << 2)) + 1;
            } else if opcode < 0x20 {
                length = match_length(opcode, 0x07, &mut input)?;
                let high = ((opcode & 0x08) as usize) << 11;
                let (first, offset) = two_byte_offset(&mut input)?;
                distance = (high | offset) + 0x4000;
                opcode = first;
            } else {
                length = match_length(opcode, 0x1F, &mut input)?;
                let (first, offset) = two_byte_offset(&mut input)?;
                distance = offset + 1;
                opcode = first;
            }

            if out.len() + length > limit {
                return Err(overrun(limit));
            }
            copy_back(&mut out, distance, length)?;

            let mut literals = (opcode & 3) as usize;
            if literals == 0 {
                opcode = input.byte()?;
                if opcode & 0xF0 == 0 {
                    literals = literal_count(opcode, &mut input)? + 3;
                }
            }
            if literals > 0 {
                opcode = copy_literals(literals, &mut input, &mut out, limit)?;
            }
        }

        if out.len() < decompressed_size {
            return Err(DwgError::Decompression(format!(
                "stream ended after {} of {} bytes",
                out.len(),
                decompressed_size
            )));
        }
        out.truncate(decompressed_size);
        Ok(out)
    }
}

struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or_else(|| {
            DwgError::Decompression(format!("compressed stream truncated at {}", self.pos))
        })?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let slice = self
            .pos
            .checked_add(count)
            .and_then(|end| self.data.get(self.pos..end))
            .ok_or_else(|| {
                DwgError::Decompression(format!(
                    "{} literal bytes requested at {} of {}",
                    count,
                    self.pos,
                    self.data.len()
                ))
            })?;
        self.pos += count;
        Ok(slice)
    }

    /// Sum of an escape chain: 0xFF per zero byte plus the closing byte.
    fn escape(&mut self) -> Result<usize> {
        let mut total = 0usize;
        loop {
            match self.byte()? {
                0 => total += 0xFF,
                b => return Ok(total + b as usize),
            }
        }
    }
}

fn overrun(limit: usize) -> DwgError {
    DwgError::Decompression(format!("output exceeds the declared {} bytes", limit))
}

fn literal_count(opcode: u8, input: &mut Input<'_>) -> Result<usize> {
    match opcode & 0x0F {
        0 => Ok(input.escape()? + 0x0F),
        low => Ok(low as usize),
    }
}

fn match_length(opcode: u8, mask: u8, input: &mut Input<'_>) -> Result<usize> {
    let length = match opcode & mask {
        0 => input.escape()? + mask as usize,
        bits => bits as usize,
    };
    Ok(length + 2)
}

/// Returns the first byte (which carries the inline literal count) and the
/// 14-bit offset spread over both bytes.
fn two_byte_offset(input: &mut Input<'_>) -> Result<(u8, usize)> {
    let first = input.byte()?;
    let second = input.byte()?;
    Ok((first, ((first as usize) >> 2) | ((second as usize) << 6)))
}

fn copy_literals(count: usize, input: &mut Input<'_>, out: &mut Vec<u8>, limit: usize) -> Result<u8> {
    if out.len() + count > limit {
        return Err(overrun(limit));
    }
    out.extend_from_slice(input.take(count)?);
    input.byte()
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

/// Compressor for the LZ77 AC18 variant.
pub struct Lz77Ac18Compressor;

impl Compressor for Lz77Ac18Compressor {
    fn compress(&self, source: &[u8], offset: usize, total_size: usize) -> Result<Vec<u8>> {
        let window = source_window(source, offset, total_size)?;
        Ok(Ac18Encoder::default().encode(window))
    }
}

#[derive(Default)]
struct Ac18Encoder {
    out: Vec<u8>,
}

impl Ac18Encoder {
    fn encode(mut self, source: &[u8]) -> Vec<u8> {
        if source.is_empty() {
            return vec![TERMINATOR, 0, 0];
        }

        // The stream must open with a run of at least 4 literals
        let padded;
        let data = if source.len() < 4 {
            let mut buf = source.to_vec();
            buf.resize(4, 0);
            padded = buf;
            &padded[..]
        } else {
            source
        };

        let mut finder = MatchFinder::new(MAX_MATCH_DISTANCE, usize::MAX);
        let mut pos = 4.min(data.len());
        for p in 0..pos {
            finder.insert(data, p);
        }

        let mut literal_start = 0;
        let mut pending: Option<super::Match> = None;
        while pos + 4 <= data.len() {
            let found = finder
                .find(data, pos)
                .filter(|m| m.distance <= 0x4000 || m.length >= 4);
            let Some(found) = found else {
                pos += 1;
                continue;
            };

            self.emit(pending, &data[literal_start..pos]);
            for p in pos + 1..pos + found.length {
                finder.insert(data, p);
            }
            pos += found.length;
            literal_start = pos;
            pending = Some(found);
        }
        self.emit(pending, &data[literal_start..]);

        self.out.extend_from_slice(&[TERMINATOR, 0, 0]);
        self.out
    }

    /// Write the pending match (or the opening run) followed by `literals`.
    fn emit(&mut self, pending: Option<super::Match>, literals: &[u8]) {
        let count = literals.len();
        match pending {
            None => self.literal_run(count),
            Some(m) => {
                let inline = if (1..=3).contains(&count) { count as u8 } else { 0 };
                self.back_reference(m, inline);
                if count >= 4 {
                    self.literal_run(count);
                }
            }
        }
        self.out.extend_from_slice(literals);
    }

    fn escape(&mut self, mut rest: usize) {
        while rest > 0xFF {
            self.out.push(0);
            rest -= 0xFF;
        }
        self.out.push(rest as u8);
    }

    /// Run-length opcode for `count` >= 4 literals.
    fn literal_run(&mut self, count: usize) {
        if count - 3 <= 0x0F {
            self.out.push((count - 3) as u8);
        } else {
            self.out.push(0);
            self.escape(count - 18);
        }
    }

    fn length_field(&mut self, opcode: u8, length: usize, mask: u8) {
        if length <= mask as usize {
            self.out.push(opcode | length as u8);
        } else {
            self.out.push(opcode);
            self.escape(length - mask as usize);
        }
    }

    fn back_reference(&mut self, m: super::Match, inline: u8) {
        let (length, distance) = (m.length, m.distance);
        if distance <= 0x400 && length <= 14 {
            let d = distance - 1;
            self.out
                .push((((length + 1) << 4) | ((d & 3) << 2)) as u8 | inline);
            self.out.push((d >> 2) as u8);
        } else if distance <= 0x4000 {
            let d = distance - 1;
            self.length_field(0x20, length - 2, 0x1F);
            self.out.push(((d & 0x3F) << 2) as u8 | inline);
            self.out.push((d >> 6) as u8);
        } else {
            let d = distance - 0x4000;
            self.length_field(0x10 | ((d >> 11) & 0x08) as u8, length - 2, 0x07);
            self.out.push(((d & 0x3F) << 2) as u8 | inline);
            self.out.push(((d >> 6) & 0xFF) as u8);
        }
    }
}
