//! DWG binary core.
//!
//! # Module Structure
//!
//! - [`constants`]: magic numbers, sentinels, section names, page constants
//! - [`code_page`]: header code page index to text encoding
//! - [`crc`]: CRC-16 (seed 0xC0C1) and CRC-32
//! - [`checksum`]: system page checksum, magic sequence, padding
//! - [`encryption`]: page header and file header masking
//! - [`compression`]: LZ77 page codecs for R2004+ and R2007
//! - [`version_codec`]: per-revision encoding strategy
//! - [`reference_type`]: handle reference codes and resolution
//! - [`section_frame`]: sentinel, size and CRC framing of sections
//! - [`configuration`]: reader and writer options
//! - [`file_header`]: flat and paged file header structures
//! - [`reader`] / [`writer`]: bit cursors, section codecs and containers

pub mod checksum;
pub mod code_page;
pub mod compression;
pub mod configuration;
pub mod constants;
pub mod crc;
pub mod encryption;
pub mod file_header;
pub mod reader;
pub mod reference_type;
pub mod section_frame;
pub mod version_codec;
pub mod writer;

pub use code_page::encoding_from_code_page;
pub use compression::{Compressor, Decompressor};
pub use configuration::{DwgReaderConfiguration, DwgWriterConfiguration, Strictness};
pub use file_header::{DwgFile, DwgLocalSectionMap, DwgSectionDescriptor, DwgSectionLocatorRecord};
pub use reference_type::{DwgReferenceType, HandleCode, HandleReference};
pub use section_frame::SectionFrame;
pub use version_codec::{FileLayout, PageCodec, VersionCodec};
