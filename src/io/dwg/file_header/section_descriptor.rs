//! Section descriptors of the paged container and the section map that
//! lists them.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::local_section_map::DwgLocalSectionMap;
use crate::error::{DwgError, Result};
use crate::io::dwg::constants::paged;

const NAME_SIZE: usize = 64;

/// A named section and the pages holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwgSectionDescriptor {
    pub name: String,
    /// Decompressed section size.
    pub size: u64,
    pub max_page_size: u32,
    pub compressed: bool,
    pub section_id: u32,
    pub encrypted: u32,
    /// Non-zero pages in offset order.
    pub pages: Vec<DwgLocalSectionMap>,
}

impl DwgSectionDescriptor {
    pub fn new(name: &str, section_id: u32) -> Self {
        Self {
            name: name.to_string(),
            size: 0,
            max_page_size: paged::MAX_PAGE_SIZE as u32,
            compressed: true,
            section_id,
            encrypted: 0,
            pages: Vec::new(),
        }
    }

    pub fn compression_code(&self) -> u32 {
        if self.compressed {
            paged::COMPRESSION_LZ77
        } else {
            paged::COMPRESSION_NONE
        }
    }

    /// Rebuild the section from page contents, filling every gap between
    /// declared offsets with zeros.
    ///
    /// The last page must end exactly at `size`. Offsets and sizes are
    /// checked before anything is allocated for them.
    pub fn assemble<F>(&self, mut page_content: F) -> Result<Vec<u8>>
    where
        F: FnMut(&DwgLocalSectionMap) -> Result<Vec<u8>>,
    {
        let size = usize::try_from(self.size).map_err(|_| {
            DwgError::InvalidFormat(format!("section {} of {} bytes", self.name, self.size))
        })?;
        let mut pages: Vec<&DwgLocalSectionMap> = self.pages.iter().collect();
        pages.sort_by_key(|p| p.offset);

        let mut out = Vec::new();
        for page in pages {
            let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
            if offset < out.len() {
                return Err(DwgError::InvalidFormat(format!(
                    "page {} of {} overlaps the previous page at {:#X}",
                    page.page_number, self.name, page.offset
                )));
            }
            let content = page_content(page)?;
            let end = offset.checked_add(content.len()).filter(|&end| end <= size).ok_or_else(|| {
                DwgError::InvalidFormat(format!(
                    "page {} of {} ends past the declared {} bytes",
                    page.page_number, self.name, size
                ))
            })?;
            if offset > out.len() {
                tracing::trace!(section = %self.name, from = out.len(), to = offset, "synthesized zero pages");
            }
            out.try_reserve_exact(end - out.len()).map_err(|e| {
                DwgError::InvalidFormat(format!("section {} of {} bytes: {}", self.name, size, e))
            })?;
            out.resize(offset, 0);
            out.extend_from_slice(&content);
        }

        if out.len() != size {
            return Err(DwgError::InvalidFormat(format!(
                "pages of {} hold {} bytes, {} declared",
                self.name,
                out.len(),
                size
            )));
        }
        Ok(out)
    }
}

/// Serialize the section map body.
pub fn encode_section_map(descriptors: &[DwgSectionDescriptor]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let count = descriptors.len() as u32;
    out.write_u32::<LittleEndian>(count)?;
    out.write_u32::<LittleEndian>(2)?;
    out.write_u32::<LittleEndian>(paged::MAX_PAGE_SIZE as u32)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(count)?;

    for desc in descriptors {
        out.write_u64::<LittleEndian>(desc.size)?;
        out.write_u32::<LittleEndian>(desc.pages.len() as u32)?;
        out.write_u32::<LittleEndian>(desc.max_page_size)?;
        out.write_u32::<LittleEndian>(1)?;
        out.write_u32::<LittleEndian>(desc.compression_code())?;
        out.write_u32::<LittleEndian>(desc.section_id)?;
        out.write_u32::<LittleEndian>(desc.encrypted)?;

        let name = desc.name.as_bytes();
        if name.len() >= NAME_SIZE {
            return Err(DwgError::InvalidFormat(format!(
                "section name {} exceeds {} bytes",
                desc.name,
                NAME_SIZE - 1
            )));
        }
        let mut field = [0u8; NAME_SIZE];
        field[..name.len()].copy_from_slice(name);
        out.write_all(&field)?;

        for page in &desc.pages {
            out.write_u32::<LittleEndian>(page.page_number)?;
            out.write_u32::<LittleEndian>(page.compressed_size)?;
            out.write_u64::<LittleEndian>(page.offset)?;
        }
    }
    Ok(out)
}

/// Parse a section map body.
pub fn decode_section_map(data: &[u8]) -> Result<Vec<DwgSectionDescriptor>> {
    let mut cursor = Cursor::new(data);
    read_section_map(&mut cursor).map_err(|e| DwgError::from_read(e, cursor.position()))
}

fn read_section_map(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Vec<DwgSectionDescriptor>> {
    let count = cursor.read_u32::<LittleEndian>()?;
    let mut preamble = [0u8; 16];
    cursor.read_exact(&mut preamble)?;
    (0..count).map(|_| read_descriptor(cursor)).collect()
}

fn read_descriptor(cursor: &mut Cursor<&[u8]>) -> std::io::Result<DwgSectionDescriptor> {
    let size = cursor.read_u64::<LittleEndian>()?;
    let page_count = cursor.read_u32::<LittleEndian>()?;
    let max_page_size = cursor.read_u32::<LittleEndian>()?;
    let _unknown = cursor.read_u32::<LittleEndian>()?;
    let compression = cursor.read_u32::<LittleEndian>()?;
    let section_id = cursor.read_u32::<LittleEndian>()?;
    let encrypted = cursor.read_u32::<LittleEndian>()?;
    let mut field = [0u8; NAME_SIZE];
    cursor.read_exact(&mut field)?;
    let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
    let name = String::from_utf8_lossy(&field[..end]).into_owned();

    let mut pages = Vec::new();
    for _ in 0..page_count {
        let page_number = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let offset = cursor.read_u64::<LittleEndian>()?;
        pages.push(DwgLocalSectionMap {
            compressed_size,
            ..DwgLocalSectionMap::new(page_number, offset)
        });
    }
    Ok(DwgSectionDescriptor {
        name,
        size,
        max_page_size,
        compressed: compression == paged::COMPRESSION_LZ77,
        section_id,
        encrypted,
        pages,
    })
}
