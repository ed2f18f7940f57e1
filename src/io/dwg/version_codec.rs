//! Per-revision encoding strategy.
//!
//! Every revision-dependent choice the bit streams and section codecs make
//! is resolved here once, when a file is opened or assembled. Readers and
//! writers hold a copy and match on its fields instead of comparing
//! versions at each call site.

use super::encryption::OffsetWidth;
use crate::types::DwgVersion;

/// How variable text (TV) is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// BS byte length, then code-page bytes.
    CodePage,
    /// BS character count, then UTF-16LE code units.
    Utf16,
}

/// How an extrusion vector or thickness with a well-known default is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultedValue {
    /// Always written out in full.
    Raw,
    /// A leading bit; when set the value is the default and nothing follows.
    Flagged,
}

/// How the object type code at the start of a record is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectTypeEncoding {
    BitShort,
    /// 2-bit tag: byte, byte + 0x1F0, or raw short.
    Tagged,
}

/// Physical layout of the file container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLayout {
    /// R13 to R2000: a locator table followed by sections.
    Flat,
    /// R2004, R2010 and later: compressed pages with page and section maps.
    Paged(OffsetWidth),
    /// R2007: Reed-Solomon protected pages.
    ReedSolomon,
}

/// Which LZ77 codec compresses section pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCodec {
    /// Opcode-stream variant (R2004, R2010+).
    Ac18,
    /// Hash-match variant with nibble opcodes (R2007).
    Ac21,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCodec {
    version: DwgVersion,
    maintenance: u8,
    pub text: TextEncoding,
    pub extrusion: DefaultedValue,
    pub thickness: DefaultedValue,
    pub object_type: ObjectTypeEncoding,
    pub layout: FileLayout,
    pub page_codec: Option<PageCodec>,
    /// Object text lives in a separate sub-stream at the end of the record.
    pub merged_text: bool,
    /// Records declare the handle sub-stream size up front (MC) instead of
    /// carrying the main-stream size in bits (RL).
    pub handle_stream_size: bool,
    /// Class entries carry instance count and version fields.
    pub extended_classes: bool,
    /// Framed sections are followed by 8 zero bytes.
    pub section_trailer: bool,
}

impl VersionCodec {
    /// Select the strategy for a revision with its default maintenance
    /// release.
    pub fn for_version(version: DwgVersion) -> Self {
        Self::with_maintenance(version, version.maintenance_version())
    }

    pub fn with_maintenance(version: DwgVersion, maintenance: u8) -> Self {
        let text = if version >= DwgVersion::AC1021 {
            TextEncoding::Utf16
        } else {
            TextEncoding::CodePage
        };
        let defaulted = if version >= DwgVersion::AC1015 {
            DefaultedValue::Flagged
        } else {
            DefaultedValue::Raw
        };
        let object_type = if version >= DwgVersion::AC1024 {
            ObjectTypeEncoding::Tagged
        } else {
            ObjectTypeEncoding::BitShort
        };
        let (layout, page_codec) = match version {
            DwgVersion::AC1012 | DwgVersion::AC1014 | DwgVersion::AC1015 => (FileLayout::Flat, None),
            DwgVersion::AC1018 => (FileLayout::Paged(OffsetWidth::Narrow), Some(PageCodec::Ac18)),
            DwgVersion::AC1021 => (FileLayout::ReedSolomon, Some(PageCodec::Ac21)),
            DwgVersion::AC1024 | DwgVersion::AC1027 | DwgVersion::AC1032 => {
                (FileLayout::Paged(OffsetWidth::Wide), Some(PageCodec::Ac18))
            }
        };

        tracing::debug!(%version, maintenance, ?layout, ?page_codec, "selected version codec");

        Self {
            version,
            maintenance,
            text,
            extrusion: defaulted,
            thickness: defaulted,
            object_type,
            layout,
            page_codec,
            merged_text: version >= DwgVersion::AC1021,
            handle_stream_size: version >= DwgVersion::AC1024,
            extended_classes: version >= DwgVersion::AC1018,
            section_trailer: version >= DwgVersion::AC1018,
        }
    }

    pub fn version(&self) -> DwgVersion {
        self.version
    }

    pub fn maintenance(&self) -> u8 {
        self.maintenance
    }

    /// Whether framed sections carry a second RL with the high size word.
    pub fn section_high_size(&self) -> bool {
        (self.version >= DwgVersion::AC1024 && self.maintenance > 3)
            || self.version >= DwgVersion::AC1032
    }
}
