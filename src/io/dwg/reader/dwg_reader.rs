//! Container reader: the entry point for splitting a DWG file into its
//! named sections.
//!
//! # Usage
//!
//! ```rust,ignore
//! use acad_dwg_core::io::dwg::reader::DwgFileReader;
//! use acad_dwg_core::notification::NotificationCollection;
//!
//! let mut notes = NotificationCollection::new();
//! let file = DwgFileReader::from_file("sample.dwg")?.read(&mut notes)?;
//! let classes = file.section("AcDb:Classes");
//! ```

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use ahash::AHashMap;
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::error::{DwgError, Result};
use crate::io::dwg::compression::{Decompressor, Lz77Ac18Decompressor};
use crate::io::dwg::configuration::DwgReaderConfiguration;
use crate::io::dwg::constants::{paged, section_names};
use crate::io::dwg::crc;
use crate::io::dwg::encryption::{DataPageHeader, OffsetWidth};
use crate::io::dwg::file_header::{
    decode_page_map, decode_section_map, read_preamble, DwgFile, DwgSectionDescriptor, FlatFileHeader,
    PagedFileHeader, SystemPageHeader, FLAT_HEADER_SIZE,
};
use crate::io::dwg::version_codec::{FileLayout, VersionCodec};
use crate::notification::{NotificationCollection, NotificationType};
use crate::types::DwgVersion;

const PAGE_MAP: &str = "page map";
const SECTION_MAP: &str = "section map";

/// Reads the container of any supported revision.
///
/// The read pipeline is:
///
/// 1. Identify the revision from the magic.
/// 2. Decode the file header of the revision's layout.
/// 3. Flat: slice each located section. Paged: read the page map and the
///    section map, then rebuild each section from its pages.
pub struct DwgFileReader<R: Read + Seek> {
    reader: R,
    config: DwgReaderConfiguration,
}

impl DwgFileReader<BufReader<File>> {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<'a> DwgFileReader<Cursor<&'a [u8]>> {
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self::from_reader(Cursor::new(data))
    }
}

impl<R: Read + Seek> DwgFileReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            config: DwgReaderConfiguration::default(),
        }
    }

    pub fn with_config(mut self, config: DwgReaderConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn read(mut self, notifications: &mut NotificationCollection) -> Result<DwgFile> {
        let head = self.read_up_to(0, paged::DATA_START as usize)?;
        let version = DwgVersion::from_magic(&head)?;
        let (_, maintenance_version, _) = read_preamble(&head)?;
        let codec = VersionCodec::with_maintenance(version, maintenance_version);

        let file = match codec.layout {
            FileLayout::Flat => self.read_flat(&head, notifications)?,
            FileLayout::Paged(width) => self.read_paged(&head, width, notifications)?,
            FileLayout::ReedSolomon => {
                return Err(DwgError::NotImplemented(format!(
                    "{} container (Reed-Solomon pages)",
                    version
                )))
            }
        };
        tracing::debug!(%version, sections = file.sections.len(), "file read");
        Ok(file)
    }

    // ------------------------------------------------------------------
    // Byte access
    // ------------------------------------------------------------------

    fn stream_len(&mut self) -> Result<u64> {
        Ok(self.reader.seek(SeekFrom::End(0))?)
    }

    /// Read exactly `len` bytes. Lengths past the end of the stream fail
    /// before the buffer is allocated.
    fn read_at(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        let file_len = self.stream_len()?;
        if position.checked_add(len as u64).map_or(true, |end| end > file_len) {
            return Err(DwgError::EndOfStream {
                offset_bits: file_len * 8,
            });
        }
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buf = vec![0u8; len];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| DwgError::from_read(e, position))?;
        Ok(buf)
    }

    /// Read at most `len` bytes; shorter streams return what they hold.
    fn read_up_to(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buf = Vec::with_capacity(len);
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    // ------------------------------------------------------------------
    // Flat layout
    // ------------------------------------------------------------------

    /// Sections named in the locator table are sliced directly. The object
    /// data sits unrecorded in front of the handle map, and the preview
    /// runs from the header's preview seeker to the end of the file.
    fn read_flat(&mut self, head: &[u8], notifications: &mut NotificationCollection) -> Result<DwgFile> {
        let header = FlatFileHeader::decode(head, &self.config, notifications)?;
        let file_len = self.stream_len()?;

        let mut located: Vec<(u64, String, Vec<u8>)> = Vec::new();
        for record in &header.records {
            let Some(name) = section_names::flat_locator_name(record.number) else {
                notifications.notify_at(
                    NotificationType::NotSupported,
                    "file header",
                    0x19,
                    format!("locator record {} names no known section", record.number),
                );
                continue;
            };
            if record.end() > file_len {
                return Err(DwgError::EndOfStream {
                    offset_bits: file_len * 8,
                }
                .in_section(name, record.seeker as u64));
            }
            let data = self.read_at(record.seeker as u64, record.size as usize)?;
            located.push((record.seeker as u64, name.to_string(), data));
        }

        let preview_seeker = (header.preview_seeker != 0).then_some(header.preview_seeker as u64);
        let handles_seeker = header
            .records
            .iter()
            .find(|r| section_names::flat_locator_name(r.number) == Some(section_names::HANDLES))
            .map(|r| r.seeker as u64);

        let objects_end = handles_seeker.or(preview_seeker).unwrap_or(file_len);
        let objects_start = header
            .records
            .iter()
            .filter(|r| (r.seeker as u64) < objects_end)
            .map(|r| r.end())
            .fold(FLAT_HEADER_SIZE as u64, u64::max);
        if objects_end > objects_start {
            let data = self.read_at(objects_start, (objects_end - objects_start) as usize)?;
            located.push((objects_start, section_names::ACDB_OBJECTS.to_string(), data));
        }

        if let Some(seeker) = preview_seeker {
            if seeker > file_len {
                return Err(DwgError::EndOfStream {
                    offset_bits: file_len * 8,
                }
                .in_section(section_names::PREVIEW, seeker));
            }
            let data = self.read_at(seeker, (file_len - seeker) as usize)?;
            located.push((seeker, section_names::PREVIEW.to_string(), data));
        }

        located.sort_by_key(|(seeker, _, _)| *seeker);
        tracing::debug!(records = header.records.len(), sections = located.len(), "flat layout");

        Ok(DwgFile {
            version: header.version,
            maintenance_version: header.maintenance_version,
            code_page: header.code_page,
            sections: located.into_iter().map(|(_, name, data)| (name, data)).collect(),
        })
    }

    // ------------------------------------------------------------------
    // Paged layout
    // ------------------------------------------------------------------

    fn read_paged(
        &mut self,
        head: &[u8],
        width: OffsetWidth,
        notifications: &mut NotificationCollection,
    ) -> Result<DwgFile> {
        let (version, maintenance_version, code_page) = read_preamble(head)?;
        let block_end = 0x80 + paged::ENCRYPTED_HEADER_SIZE;
        let block = head.get(0x80..block_end).ok_or(DwgError::EndOfStream {
            offset_bits: head.len() as u64 * 8,
        })?;
        let header = PagedFileHeader::decode(block, &self.config, notifications)?;

        let page_map = self.read_system_page(
            header.page_map_address,
            paged::PAGE_TYPE_PAGE_MAP,
            PAGE_MAP,
            notifications,
        )?;
        let pages = decode_page_map(&page_map).map_err(|e| e.in_section(PAGE_MAP, header.page_map_address))?;
        tracing::debug!(pages = pages.len(), "page map");

        let &(section_map_address, _) = pages.get(&header.section_map_id).ok_or_else(|| {
            DwgError::InvalidFormat(format!("section map page {} is not in the page map", header.section_map_id))
        })?;
        let section_map = self.read_system_page(
            section_map_address,
            paged::PAGE_TYPE_SECTION_MAP,
            SECTION_MAP,
            notifications,
        )?;
        let descriptors =
            decode_section_map(&section_map).map_err(|e| e.in_section(SECTION_MAP, section_map_address))?;

        let mut sections = IndexMap::with_capacity(descriptors.len());
        for mut descriptor in descriptors {
            for page in &mut descriptor.pages {
                let &(seeker, _) = pages.get(&page.page_number).ok_or_else(|| {
                    DwgError::InvalidFormat(format!(
                        "page {} of {} is not in the page map",
                        page.page_number, descriptor.name
                    ))
                    .in_section(SECTION_MAP, section_map_address)
                })?;
                page.seeker = seeker;
            }
            let data = self.read_section(&descriptor, width, notifications)?;
            sections.insert(descriptor.name.clone(), data);
        }

        Ok(DwgFile {
            version,
            maintenance_version,
            code_page,
            sections,
        })
    }

    /// Read a page map or section map page and return its decompressed body.
    fn read_system_page(
        &mut self,
        position: u64,
        page_type: u32,
        name: &str,
        notifications: &mut NotificationCollection,
    ) -> Result<Vec<u8>> {
        let raw = self.read_at(position, paged::SYSTEM_PAGE_HEADER_SIZE)?;
        let header = SystemPageHeader::from_bytes(&raw, position)?;
        if header.page_type != page_type {
            return Err(DwgError::InvalidFormat(format!(
                "expected page type {:#010X}, found {:#010X}",
                page_type, header.page_type
            ))
            .in_section(name, position));
        }

        let body_position = position + paged::SYSTEM_PAGE_HEADER_SIZE as u64;
        let body = self
            .read_at(body_position, header.compressed_size as usize)
            .map_err(|e| e.in_section(name, body_position))?;

        let actual = header.compute_checksum(&body);
        if actual != header.checksum {
            let error = DwgError::ChecksumMismatch {
                section: name.to_string(),
                expected: header.checksum,
                actual,
            };
            self.config.recover(error, name, position, notifications)?;
        }

        match header.compression_type {
            paged::COMPRESSION_LZ77 => Lz77Ac18Decompressor
                .decompress(&body, header.decompressed_size as usize)
                .map_err(|e| e.in_section(name, body_position)),
            paged::COMPRESSION_NONE => Ok(body),
            other => Err(DwgError::InvalidFormat(format!("compression type {}", other)).in_section(name, position)),
        }
    }

    /// Rebuild a section from its stored pages. Checksums are checked in
    /// file order, pages are then decompressed in parallel.
    fn read_section(
        &mut self,
        descriptor: &DwgSectionDescriptor,
        width: OffsetWidth,
        notifications: &mut NotificationCollection,
    ) -> Result<Vec<u8>> {
        let name = descriptor.name.as_str();
        let header_size = width.header_size();

        let mut stored = Vec::with_capacity(descriptor.pages.len());
        for page in &descriptor.pages {
            let raw = self.read_at(page.seeker, header_size).map_err(|e| e.in_section(name, page.seeker))?;
            let header = DataPageHeader::decode(&raw, width, page.seeker).map_err(|e| e.in_section(name, page.seeker))?;
            let body_position = page.seeker + header_size as u64;
            let body = self
                .read_at(body_position, header.compressed_size as usize)
                .map_err(|e| e.in_section(name, body_position))?;

            if header.start_offset != page.offset {
                let error = DwgError::InvalidFormat(format!(
                    "page {} header offset {:#X}, section map offset {:#X}",
                    page.page_number, header.start_offset, page.offset
                ));
                self.config.recover(error, name, page.seeker, notifications)?;
            }
            if self.config.verify_page_checksums {
                let actual = crc::crc32(0, &body);
                if actual != header.checksum {
                    let error = DwgError::ChecksumMismatch {
                        section: name.to_string(),
                        expected: header.checksum,
                        actual,
                    };
                    self.config.recover(error, name, page.seeker, notifications)?;
                }
            }
            tracing::trace!(section = name, page = page.page_number, seeker = page.seeker, "data page");
            stored.push((page.page_number, page.seeker, header.decompressed_size as usize, body));
        }

        let compressed = descriptor.compressed;
        let contents = stored
            .into_par_iter()
            .map(|(number, seeker, size, body)| {
                let content = if compressed {
                    Lz77Ac18Decompressor.decompress(&body, size)
                } else if body.len() >= size {
                    Ok(body[..size].to_vec())
                } else {
                    Err(DwgError::EndOfStream {
                        offset_bits: body.len() as u64 * 8,
                    })
                };
                content.map(|c| (number, c)).map_err(|e| e.in_section(name, seeker))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut contents: AHashMap<u32, Vec<u8>> = contents.into_iter().collect();

        let data = descriptor
            .assemble(|page| {
                contents.remove(&page.page_number).ok_or_else(|| {
                    DwgError::InvalidFormat(format!("page {} listed twice", page.page_number))
                })
            })
            .map_err(|e| e.in_section(name, 0))?;
        tracing::debug!(section = name, size = data.len(), pages = descriptor.pages.len(), "paged section");
        Ok(data)
    }
}
