//! Section locator record of the flat (R13-R2000) file header.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Bytes of one record on disk.
pub const LOCATOR_RECORD_SIZE: usize = 9;

/// File offset and size of one section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DwgSectionLocatorRecord {
    pub number: u8,
    pub seeker: u32,
    pub size: u32,
}

impl DwgSectionLocatorRecord {
    pub fn new(number: u8, seeker: u32, size: u32) -> Self {
        Self {
            number,
            seeker,
            size,
        }
    }

    /// First byte past the section.
    pub fn end(&self) -> u64 {
        self.seeker as u64 + self.size as u64
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u8(self.number)?;
        writer.write_u32::<LittleEndian>(self.seeker)?;
        writer.write_u32::<LittleEndian>(self.size)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            number: reader.read_u8()?,
            seeker: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
        })
    }
}
