//! LZ77 AC21 compression and decompression.
//!
//! The variant used exclusively by AC1021 (R2007). Unlike AC18 there is no
//! terminator: the decoder stops when the compressed input is exhausted,
//! so the exact compressed length must be known.
//!
//! The stream opens with a literal block, either `0x20 ?? ?? n` for n <= 7
//! or `n - 8` with an escape at 0x0F. Every back-reference carries up to 7
//! trailing literals in the low 3 bits of its last byte; when that count is
//! 0 the next byte is read in "chained" context, where a high nibble of 0
//! starts a literal block and 15 stands for the nibble-0 match form.

use super::{copy_back, source_window, Compressor, Decompressor, Match, MatchFinder, MAX_MATCH_DISTANCE};
use crate::error::{DwgError, Result};

/// Longest length the 16-bit extended form can hold.
const MAX_MATCH_LENGTH: usize = 0x100 + 0xFFFF;

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

/// Decompressor for the LZ77 AC21 variant.
pub struct Lz77Ac21Decompressor;

impl Decompressor for Lz77Ac21Decompressor {
    fn decompress(&self, source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        let mut state = DecompressState {
            source,
            index: 0,
            out: Vec::with_capacity(decompressed_size),
            limit: decompressed_size,
        };
        state.run()?;
        if state.out.len() != decompressed_size {
            return Err(DwgError::Decompression(format!(
                "stream produced {} of {} bytes",
                state.out.len(),
                decompressed_size
            )));
        }
        Ok(state.out)
    }
}

struct DecompressState<'a> {
    source: &'a [u8],
    index: usize,
    out: Vec<u8>,
    limit: usize,
}

/// One decoded instruction.
struct Instruction {
    length: usize,
    distance: usize,
    /// Last byte read; its low 3 bits count trailing literals.
    last: u8,
}

impl<'a> DecompressState<'a> {
    fn at_end(&self) -> bool {
        self.index >= self.source.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self.source.get(self.index).ok_or_else(|| {
            DwgError::Decompression(format!("compressed stream truncated at {}", self.index))
        })?;
        self.index += 1;
        Ok(b)
    }

    fn run(&mut self) -> Result<()> {
        let Some(&first) = self.source.first() else {
            return Ok(());
        };
        self.index = 1;
        if self.at_end() {
            return Ok(());
        }

        let mut opcode = first;
        let mut length = 0usize;
        if opcode & 0xF0 == 0x20 {
            self.index += 3;
            length = (*self.source.get(self.index - 1).ok_or_else(|| {
                DwgError::Decompression("literal header truncated".into())
            })? & 7) as usize;
        }

        while !self.at_end() {
            if length == 0 {
                length = self.literal_length(opcode)?;
            }
            self.copy_literals(length)?;
            if self.at_end() {
                break;
            }
            let (next_opcode, trailing) = self.copy_matches()?;
            opcode = next_opcode;
            length = trailing;
        }
        Ok(())
    }

    fn literal_length(&mut self, opcode: u8) -> Result<usize> {
        let mut length = opcode as usize + 8;
        if length == 0x17 {
            let n = self.byte()?;
            length += n as usize;
            if n == 0xFF {
                loop {
                    let word = u16::from_le_bytes([self.byte()?, self.byte()?]);
                    length += word as usize;
                    if word != 0xFFFF {
                        break;
                    }
                }
            }
        }
        Ok(length)
    }

    fn copy_literals(&mut self, length: usize) -> Result<()> {
        let end = self.index + length;
        let bytes = self.source.get(self.index..end).ok_or_else(|| {
            DwgError::Decompression(format!(
                "{} literal bytes requested at {} of {}",
                length,
                self.index,
                self.source.len()
            ))
        })?;
        if self.out.len() + length > self.limit {
            return Err(self.overrun());
        }
        self.out.extend_from_slice(bytes);
        self.index = end;
        Ok(())
    }

    fn overrun(&self) -> DwgError {
        DwgError::Decompression(format!("output exceeds the declared {} bytes", self.limit))
    }

    /// Decode back-references until one carries trailing literals or a
    /// literal block opcode appears. Returns that opcode and the inline
    /// literal count (0 for a literal block).
    fn copy_matches(&mut self) -> Result<(u8, usize)> {
        let opcode = self.byte()?;
        let mut instruction = self.instruction(opcode)?;
        loop {
            if self.out.len() + instruction.length > self.limit {
                return Err(self.overrun());
            }
            copy_back(&mut self.out, instruction.distance, instruction.length)?;

            let trailing = (instruction.last & 7) as usize;
            if trailing != 0 || self.at_end() {
                return Ok((instruction.last, trailing));
            }

            let mut opcode = self.byte()?;
            match opcode >> 4 {
                0 => return Ok((opcode, 0)),
                15 => opcode &= 0x0F,
                _ => {}
            }
            instruction = self.instruction(opcode)?;
        }
    }

    fn instruction(&mut self, opcode: u8) -> Result<Instruction> {
        match opcode >> 4 {
            0 => {
                let low = self.byte()? as usize;
                let last = self.byte()?;
                Ok(Instruction {
                    length: (opcode & 0x0F) as usize + 0x13 + ((last >> 3) & 0x10) as usize,
                    distance: (((last & 0x78) as usize) << 5) + 1 + low,
                    last,
                })
            }
            1 => {
                let low = self.byte()? as usize;
                let last = self.byte()?;
                Ok(Instruction {
                    length: (opcode & 0x0F) as usize + 3,
                    distance: (((last & 0xF8) as usize) << 5) + 1 + low,
                    last,
                })
            }
            2 => {
                let offset = u16::from_le_bytes([self.byte()?, self.byte()?]) as usize;
                let base = (opcode & 7) as usize;
                if opcode & 8 == 0 {
                    let last = self.byte()?;
                    Ok(Instruction {
                        length: (last & 0xF8) as usize + base,
                        distance: offset,
                        last,
                    })
                } else {
                    let mid = self.byte()? as usize;
                    let last = self.byte()?;
                    Ok(Instruction {
                        length: (((last & 0xF8) as usize) << 8) + (mid << 3) + base + 0x100,
                        distance: offset + 1,
                        last,
                    })
                }
            }
            nibble => {
                let last = self.byte()?;
                Ok(Instruction {
                    length: nibble as usize,
                    distance: (((last & 0xF8) as usize) << 1) + (opcode & 0x0F) as usize + 1,
                    last,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

/// Compressor for the LZ77 AC21 variant.
pub struct Lz77Ac21Compressor;

impl Compressor for Lz77Ac21Compressor {
    fn compress(&self, source: &[u8], offset: usize, total_size: usize) -> Result<Vec<u8>> {
        let data = source_window(source, offset, total_size)?;
        if data.is_empty() {
            return Ok(vec![0x20, 0x00, 0x00, 0x00]);
        }

        let matches = find_matches(data);
        let mut encoder = Ac21Encoder { out: Vec::with_capacity(data.len() / 2 + 16) };

        let first_end = matches.first().map_or(data.len(), |(pos, _)| *pos);
        encoder.opening_literals(first_end);
        encoder.out.extend_from_slice(&data[..first_end]);

        let mut chained = false;
        for (i, &(pos, m)) in matches.iter().enumerate() {
            let literal_start = pos + m.length;
            let literal_end = matches.get(i + 1).map_or(data.len(), |(next, _)| *next);
            let trailing = literal_end - literal_start;
            let inline = if trailing <= 7 { trailing as u8 } else { 0 };

            encoder.back_reference(m, inline, chained);
            if trailing > 7 {
                encoder.literal_block(trailing);
            }
            encoder.out.extend_from_slice(&data[literal_start..literal_end]);
            chained = trailing == 0;
        }

        Ok(encoder.out)
    }
}

/// Greedy parse into `(position, match)` pairs.
fn find_matches(data: &[u8]) -> Vec<(usize, Match)> {
    let mut finder = MatchFinder::new(MAX_MATCH_DISTANCE, MAX_MATCH_LENGTH);
    let mut matches = Vec::new();
    let mut pos = 0;
    while pos + 4 <= data.len() {
        match finder.find(data, pos) {
            Some(m) => {
                for p in pos + 1..pos + m.length {
                    finder.insert(data, p);
                }
                matches.push((pos, m));
                pos += m.length;
            }
            None => pos += 1,
        }
    }
    matches
}

struct Ac21Encoder {
    out: Vec<u8>,
}

impl Ac21Encoder {
    /// Extra length after the 0x0F escape: a byte, or 0xFF followed by
    /// 16-bit words where 0xFFFF continues.
    fn extended_length(&mut self, mut rest: usize) {
        if rest < 0xFF {
            self.out.push(rest as u8);
            return;
        }
        self.out.push(0xFF);
        rest -= 0xFF;
        while rest >= 0xFFFF {
            self.out.extend_from_slice(&[0xFF, 0xFF]);
            rest -= 0xFFFF;
        }
        self.out.extend_from_slice(&(rest as u16).to_le_bytes());
    }

    fn opening_literals(&mut self, count: usize) {
        if count <= 7 {
            self.out.extend_from_slice(&[0x20, 0x00, 0x00, count as u8]);
        } else {
            self.literal_block(count);
        }
    }

    /// Opcode for a block of `count` >= 8 literals.
    fn literal_block(&mut self, count: usize) {
        if count <= 22 {
            self.out.push((count - 8) as u8);
        } else {
            self.out.push(0x0F);
            self.extended_length(count - 23);
        }
    }

    fn back_reference(&mut self, m: Match, inline: u8, chained: bool) {
        let (length, distance) = (m.length, m.distance);
        // Nibble 15 is reserved for the escaped nibble-0 form after a chain
        let short_limit = if chained { 14 } else { 15 };
        if length <= short_limit && distance <= 0x200 {
            let d = distance - 1;
            self.out.push(((length << 4) | (d & 0x0F)) as u8);
            self.out.push(((d >> 4) << 3) as u8 | inline);
        } else if length <= 18 && distance <= 0x2000 {
            let d = distance - 1;
            self.out.push(0x10 | (length - 3) as u8);
            self.out.push((d & 0xFF) as u8);
            self.out.push(((d >> 8) << 3) as u8 | inline);
        } else if (19..=50).contains(&length) && distance <= 0x1000 {
            let d = distance - 1;
            let long = length >= 35;
            let low = (length - 19 - if long { 16 } else { 0 }) as u8;
            self.out.push(if chained { 0xF0 | low } else { low });
            self.out.push((d & 0xFF) as u8);
            self.out
                .push((((d >> 8) << 3) & 0x78) as u8 | if long { 0x80 } else { 0 } | inline);
        } else if length <= 0xFF {
            self.out.push(0x20 | (length & 7) as u8);
            self.out.extend_from_slice(&(distance as u16).to_le_bytes());
            self.out.push((length & 0xF8) as u8 | inline);
        } else {
            let adjusted = length - 0x100;
            self.out.push(0x28 | (adjusted & 7) as u8);
            self.out.extend_from_slice(&((distance - 1) as u16).to_le_bytes());
            self.out.push(((adjusted >> 3) & 0xFF) as u8);
            self.out.push(((adjusted >> 8) & 0xF8) as u8 | inline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let compressed = Lz77Ac21Compressor.compress(data, 0, data.len()).unwrap();
        Lz77Ac21Decompressor
            .decompress(&compressed, data.len())
            .unwrap()
    }

    #[test]
    fn test_empty_input() {
        let compressed = Lz77Ac21Compressor.compress(&[], 0, 0).unwrap();
        assert_eq!(compressed, vec![0x20, 0, 0, 0]);
        assert!(Lz77Ac21Decompressor.decompress(&compressed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_single_byte() {
        let compressed = Lz77Ac21Compressor.compress(&[0x42], 0, 1).unwrap();
        assert_eq!(compressed, vec![0x20, 0, 0, 1, 0x42]);
        assert_eq!(roundtrip(&[0x42]), vec![0x42]);
    }

    #[test]
    fn test_opening_block_forms() {
        for len in [7usize, 8, 22, 23, 300, 70_000] {
            // Strictly increasing 16-bit words never repeat a 4-byte window
            let data: Vec<u8> = (0..len).map(|i| ((i / 2) as u16).to_be_bytes()[i % 2]).collect();
            assert_eq!(roundtrip(&data), data, "length {}", len);
        }
    }

    #[test]
    fn test_long_run() {
        let data = vec![0u8; 40_000];
        let compressed = Lz77Ac21Compressor.compress(&data, 0, data.len()).unwrap();
        assert!(compressed.len() < 64);
        assert_eq!(
            Lz77Ac21Decompressor.decompress(&compressed, data.len()).unwrap(),
            data
        );
    }

    #[test]
    fn test_every_match_form() {
        // Repeats at distances and lengths that reach each opcode layout
        let mut seed = 0xC0FF_EE11u32;
        let mut noise = |n: usize| -> Vec<u8> {
            (0..n)
                .map(|_| {
                    seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                    (seed >> 16) as u8
                })
                .collect()
        };
        let mut data = noise(0x6000);
        for (distance, length) in [(100usize, 5usize), (3000, 12), (2000, 40), (20_000, 200), (9000, 1000)] {
            let start = data.len() - distance;
            data.extend_from_within(start..start + length.min(distance));
            data.extend(noise(9));
        }
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn test_chained_matches() {
        // Two back-to-back matches with no literals in between
        let mut data: Vec<u8> = (0..=255u8).collect();
        data.extend_from_within(10..25);
        data.extend_from_within(100..140);
        data.extend_from_within(0..4);
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn test_size_mismatch_fails() {
        let data = vec![9u8; 500];
        let compressed = Lz77Ac21Compressor.compress(&data, 0, data.len()).unwrap();
        assert!(Lz77Ac21Decompressor.decompress(&compressed, 499).is_err());
        assert!(Lz77Ac21Decompressor.decompress(&compressed, 501).is_err());
    }

    #[test]
    fn test_truncated_literals_fail() {
        let stream = [0x20u8, 0, 0, 5, 1, 2];
        assert!(Lz77Ac21Decompressor.decompress(&stream, 5).is_err());
    }
}
