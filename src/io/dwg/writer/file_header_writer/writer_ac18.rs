//! Paged container writer for R2004 and R2010+.
//!
//! Sections are cut into pages of at most 0x7400 bytes. Pages that are
//! entirely zero are left out and rebuilt by the reader from the offsets
//! of the remaining pages. Each stored page is a masked data page header,
//! the body (LZ77 or raw) and magic padding to a 32-byte boundary. The
//! section map and page map pages follow the data pages.

use rayon::prelude::*;

use crate::error::{DwgError, Result};
use crate::io::dwg::checksum::{self, MAGIC_SEQUENCE};
use crate::io::dwg::compression::{Compressor, Lz77Ac18Compressor};
use crate::io::dwg::constants::{paged, section_names};
use crate::io::dwg::crc;
use crate::io::dwg::encryption::{DataPageHeader, OffsetWidth};
use crate::io::dwg::file_header::{
    encode_page_map, encode_paged_preamble, encode_section_map, non_zero_pages, DwgLocalSectionMap,
    DwgSectionDescriptor, PageMapEntry, PagedFileHeader, SystemPageHeader,
};
use crate::types::DwgVersion;

use super::DwgFileHeaderWriter;

/// Tries at settling the page map's own size entry before storing it raw.
const PAGE_MAP_ATTEMPTS: usize = 4;

pub struct DwgFileHeaderWriterAC18 {
    version: DwgVersion,
    maintenance_version: u8,
    code_page: u16,
    width: OffsetWidth,
    compress: bool,
    descriptors: Vec<DwgSectionDescriptor>,
    page_map: Vec<PageMapEntry>,
    output: Vec<u8>,
}

impl DwgFileHeaderWriterAC18 {
    pub fn new(
        version: DwgVersion,
        maintenance_version: u8,
        code_page: u16,
        width: OffsetWidth,
        compress: bool,
    ) -> Self {
        Self {
            version,
            maintenance_version,
            code_page,
            width,
            compress,
            descriptors: Vec::new(),
            page_map: Vec::new(),
            output: vec![0u8; paged::DATA_START as usize],
        }
    }

    fn next_page_number(&self) -> u32 {
        self.page_map.len() as u32 + 1
    }

    fn position(&self) -> u64 {
        self.output.len() as u64
    }

    /// Append `parts` followed by magic filler up to the next 32-byte
    /// boundary, returning the bytes the page occupies.
    fn push_page(&mut self, parts: &[&[u8]]) -> u32 {
        let start = self.output.len();
        for part in parts {
            self.output.extend_from_slice(part);
        }
        let padding = checksum::compression_padding(self.output.len() - start);
        self.output.extend_from_slice(&checksum::magic_padding(padding));
        (self.output.len() - start) as u32
    }

    fn write_system_page(&mut self, page_type: u32, body: &[u8], page_number: u32) -> Result<(u64, u32)> {
        let seeker = self.position();
        let compressed = Lz77Ac18Compressor.compress(body, 0, body.len())?;
        let header = SystemPageHeader::for_body(
            page_type,
            body.len() as u32,
            paged::COMPRESSION_LZ77,
            &compressed,
        );
        let size = self.push_page(&[&header.to_bytes(), &compressed]);
        self.page_map.push(PageMapEntry { number: page_number, size });
        Ok((seeker, size))
    }

    /// The page map lists itself, so its size entry has to match the
    /// compressed result. Retry until it settles, then fall back to a
    /// stored body whose size is known up front.
    fn write_page_map(&mut self) -> Result<(u32, u64, u32)> {
        let number = self.next_page_number();
        let seeker = self.position();
        let header_size = paged::SYSTEM_PAGE_HEADER_SIZE;
        let entries_len = (self.page_map.len() + 1) * 8;

        let mut guess = stored_size(header_size + entries_len);
        for _ in 0..PAGE_MAP_ATTEMPTS {
            let mut entries = self.page_map.clone();
            entries.push(PageMapEntry { number, size: guess });
            let body = encode_page_map(&entries)?;
            let compressed = Lz77Ac18Compressor.compress(&body, 0, body.len())?;
            let size = stored_size(header_size + compressed.len());
            if size == guess {
                let header = SystemPageHeader::for_body(
                    paged::PAGE_TYPE_PAGE_MAP,
                    body.len() as u32,
                    paged::COMPRESSION_LZ77,
                    &compressed,
                );
                self.push_page(&[&header.to_bytes(), &compressed]);
                self.page_map = entries;
                return Ok((number, seeker, size));
            }
            guess = size;
        }

        let size = stored_size(header_size + entries_len);
        let mut entries = self.page_map.clone();
        entries.push(PageMapEntry { number, size });
        let body = encode_page_map(&entries)?;
        let header = SystemPageHeader::for_body(
            paged::PAGE_TYPE_PAGE_MAP,
            body.len() as u32,
            paged::COMPRESSION_NONE,
            &body,
        );
        self.push_page(&[&header.to_bytes(), &body]);
        self.page_map = entries;
        Ok((number, seeker, size))
    }

    fn preview_address(&self) -> Result<u32> {
        let first = self
            .descriptors
            .iter()
            .find(|d| d.name == section_names::PREVIEW)
            .and_then(|d| d.pages.first());
        match first {
            Some(page) => u32::try_from(page.seeker + self.width.header_size() as u64).map_err(|_| {
                DwgError::InvalidFormat(format!("preview page at {:#X} is beyond a 4-byte address", page.seeker))
            }),
            None => Ok(0),
        }
    }
}

fn stored_size(len: usize) -> u32 {
    (len + checksum::compression_padding(len)) as u32
}

impl DwgFileHeaderWriter for DwgFileHeaderWriterAC18 {
    fn add_section(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        if self.descriptors.iter().any(|d| d.name == name) {
            return Err(DwgError::InvalidFormat(format!("section {} added twice", name)));
        }
        let mut descriptor = DwgSectionDescriptor::new(name, self.descriptors.len() as u32);
        descriptor.size = data.len() as u64;
        descriptor.compressed = self.compress;

        let pages: Vec<(u64, &[u8])> = non_zero_pages(&data, paged::MAX_PAGE_SIZE).collect();
        let compress = self.compress;
        let bodies = pages
            .par_iter()
            .map(|(_, chunk)| {
                if compress {
                    Lz77Ac18Compressor.compress(chunk, 0, chunk.len())
                } else {
                    Ok(chunk.to_vec())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            section = name,
            size = data.len(),
            pages = pages.len(),
            omitted = data.len().div_ceil(paged::MAX_PAGE_SIZE) - pages.len(),
            "paged section"
        );

        for ((offset, chunk), body) in pages.iter().zip(bodies) {
            let seeker = self.position();
            let header_size = self.width.header_size();
            let page_size = stored_size(header_size + body.len());
            let checksum = crc::crc32(0, &body);
            let header = DataPageHeader::new(chunk.len() as u32, body.len() as u32, page_size, *offset, checksum)
                .encode(self.width, seeker)?;

            let number = self.next_page_number();
            self.push_page(&[&header, &body]);
            self.page_map.push(PageMapEntry { number, size: page_size });

            tracing::trace!(section = name, page = number, seeker, offset, stored = body.len(), "data page");
            descriptor.pages.push(DwgLocalSectionMap {
                page_number: number,
                compressed_size: body.len() as u32,
                decompressed_size: chunk.len() as u32,
                offset: *offset,
                page_size,
                seeker,
                checksum,
            });
        }

        self.descriptors.push(descriptor);
        Ok(())
    }

    fn write_file(&mut self) -> Result<Vec<u8>> {
        let section_map = encode_section_map(&self.descriptors)?;
        let section_map_id = self.next_page_number();
        self.write_system_page(paged::PAGE_TYPE_SECTION_MAP, &section_map, section_map_id)?;

        let (page_map_id, page_map_address, page_map_size) = self.write_page_map()?;
        let second_header_address = self.position();

        let header = PagedFileHeader {
            last_page_id: page_map_id,
            last_section_address: page_map_address + page_map_size as u64 - paged::DATA_START,
            second_header_address,
            gap_amount: 0,
            section_amount: page_map_id - 1,
            page_map_id,
            page_map_address,
            section_map_id,
            section_array_page_size: self.page_map.len() as u32,
            gap_array_size: 0,
        };
        let block = header.encode()?;
        let preamble = encode_paged_preamble(
            self.version,
            self.maintenance_version,
            self.code_page,
            self.preview_address()?,
        )?;

        let tail_start = 0x80 + paged::ENCRYPTED_HEADER_SIZE;
        let tail = &MAGIC_SEQUENCE[236..236 + (paged::DATA_START as usize - tail_start)];
        self.output[..0x80].copy_from_slice(&preamble);
        self.output[0x80..tail_start].copy_from_slice(&block);
        self.output[tail_start..paged::DATA_START as usize].copy_from_slice(tail);

        self.output.extend_from_slice(&block);
        self.output.extend_from_slice(tail);

        tracing::debug!(
            pages = self.page_map.len(),
            sections = self.descriptors.len(),
            size = self.output.len(),
            "paged file assembled"
        );
        Ok(std::mem::take(&mut self.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(compress: bool) -> DwgFileHeaderWriterAC18 {
        DwgFileHeaderWriterAC18::new(DwgVersion::AC1018, 104, 30, OffsetWidth::Narrow, compress)
    }

    #[test]
    fn test_pages_are_aligned() {
        let mut w = writer(true);
        w.add_section(section_names::HEADER, vec![7u8; 100]).unwrap();
        w.add_section(section_names::CLASSES, (0..0x8000u32).map(|i| (i % 251) as u8).collect())
            .unwrap();
        for d in &w.descriptors {
            for page in &d.pages {
                assert_eq!(page.seeker % paged::ALIGNMENT as u64, 0);
                assert_eq!(page.page_size % paged::ALIGNMENT as u32, 0);
            }
        }
        assert_eq!(w.descriptors[1].pages.len(), 2);
        assert_eq!(w.descriptors[1].pages[1].offset, paged::MAX_PAGE_SIZE as u64);
    }

    #[test]
    fn test_zero_pages_are_not_stored() {
        let mut data = vec![0u8; paged::MAX_PAGE_SIZE * 4];
        data[paged::MAX_PAGE_SIZE + 5] = 1;
        let mut w = writer(false);
        w.add_section(section_names::ACDB_OBJECTS, data).unwrap();
        let d = &w.descriptors[0];
        assert_eq!(d.size, paged::MAX_PAGE_SIZE as u64 * 4);
        let offsets: Vec<u64> = d.pages.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![paged::MAX_PAGE_SIZE as u64, paged::MAX_PAGE_SIZE as u64 * 3]);
    }

    #[test]
    fn test_header_block_and_tail() {
        let mut w = writer(true);
        w.add_section(section_names::HEADER, vec![1, 2, 3, 4]).unwrap();
        let out = w.write_file().unwrap();
        assert_eq!(&out[..6], b"AC1018");
        assert_eq!(&out[0xEC..0x100], &MAGIC_SEQUENCE[236..]);
        let tail = &out[out.len() - 20..];
        assert_eq!(tail, &MAGIC_SEQUENCE[236..]);
        assert_eq!(&out[0x80..0xEC], &out[out.len() - 20 - 0x6C..out.len() - 20]);
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let mut w = writer(true);
        w.add_section(section_names::HEADER, vec![1]).unwrap();
        assert!(w.add_section(section_names::HEADER, vec![1]).is_err());
    }
}
