//! Fixed byte sequences and magic numbers of the DWG container.

/// Section names as stored in the paged section map.
pub mod section_names {
    pub const ACDB_OBJECTS: &str = "AcDb:AcDbObjects";
    pub const AUX_HEADER: &str = "AcDb:AuxHeader";
    pub const HEADER: &str = "AcDb:Header";
    pub const CLASSES: &str = "AcDb:Classes";
    pub const HANDLES: &str = "AcDb:Handles";
    pub const OBJ_FREE_SPACE: &str = "AcDb:ObjFreeSpace";
    pub const TEMPLATE: &str = "AcDb:Template";
    pub const PREVIEW: &str = "AcDb:Preview";

    /// Locator record number of a section in the flat (R13-R2000) file
    /// header. Sections outside the locator table return `None`.
    pub fn flat_locator_index(name: &str) -> Option<u8> {
        match name {
            HEADER => Some(0),
            CLASSES => Some(1),
            HANDLES => Some(2),
            OBJ_FREE_SPACE => Some(3),
            TEMPLATE => Some(4),
            AUX_HEADER => Some(5),
            _ => None,
        }
    }

    /// Inverse of [`flat_locator_index`].
    pub fn flat_locator_name(index: u8) -> Option<&'static str> {
        match index {
            0 => Some(HEADER),
            1 => Some(CLASSES),
            2 => Some(HANDLES),
            3 => Some(OBJ_FREE_SPACE),
            4 => Some(TEMPLATE),
            5 => Some(AUX_HEADER),
            _ => None,
        }
    }
}

/// 16-byte section boundary markers.
pub mod sentinels {
    pub const HEADER_START: [u8; 16] = [
        0xCF, 0x7B, 0x1F, 0x23, 0xFD, 0xDE, 0x38, 0xA9, 0x5F, 0x7C, 0x68, 0xB8, 0x4E, 0x6D,
        0x33, 0x5F,
    ];
    pub const HEADER_END: [u8; 16] = [
        0x30, 0x84, 0xE0, 0xDC, 0x02, 0x21, 0xC7, 0x56, 0xA0, 0x83, 0x97, 0x47, 0xB1, 0x92,
        0xCC, 0xA0,
    ];
    pub const CLASSES_START: [u8; 16] = [
        0x8D, 0xA1, 0xC4, 0xB8, 0xC4, 0xA9, 0xF8, 0xC5, 0xC0, 0xDC, 0xF4, 0x5F, 0xE7, 0xCF,
        0xB6, 0x8A,
    ];
    pub const CLASSES_END: [u8; 16] = [
        0x72, 0x5E, 0x3B, 0x47, 0x3B, 0x56, 0x07, 0x3A, 0x3F, 0x23, 0x0B, 0xA0, 0x18, 0x30,
        0x49, 0x75,
    ];
    pub const PREVIEW_START: [u8; 16] = [
        0x1F, 0x25, 0x6D, 0x07, 0xD4, 0x36, 0x28, 0x28, 0x9D, 0x57, 0xCA, 0x3F, 0x9D, 0x44,
        0x10, 0x2B,
    ];
    pub const PREVIEW_END: [u8; 16] = [
        0xE0, 0xDA, 0x92, 0xF8, 0x2B, 0xC9, 0xD7, 0xD7, 0x62, 0xA8, 0x35, 0xC0, 0x62, 0xBB,
        0xEF, 0xD4,
    ];
    /// Closes the flat (R13-R2000) file header.
    pub const FILE_HEADER_END_AC15: [u8; 16] = [
        0x95, 0xA0, 0x4E, 0x28, 0x99, 0x82, 0x1A, 0xE5, 0x5E, 0x41, 0xE0, 0x5F, 0x9D, 0x3A,
        0x4D, 0x00,
    ];

    /// Start and end sentinels of a framed section, if it has published ones.
    pub fn pair(section_name: &str) -> Option<(&'static [u8; 16], &'static [u8; 16])> {
        use super::section_names;
        match section_name {
            section_names::HEADER => Some((&HEADER_START, &HEADER_END)),
            section_names::CLASSES => Some((&CLASSES_START, &CLASSES_END)),
            section_names::PREVIEW => Some((&PREVIEW_START, &PREVIEW_END)),
            _ => None,
        }
    }
}

/// Paged container (R2004 and later) constants.
pub mod paged {
    /// Plain-text block at 0x80 before masking.
    pub const FILE_ID: &[u8; 12] = b"AcFssFcAJMB\0";
    /// Size of the masked header block at 0x80.
    pub const ENCRYPTED_HEADER_SIZE: usize = 0x6C;
    /// First byte after the file header region; page 1 starts here.
    pub const DATA_START: u64 = 0x100;
    /// XOR key base for data page headers.
    pub const PAGE_HEADER_MASK: u32 = 0x4164536B;
    /// Maximum decompressed size of one page.
    pub const MAX_PAGE_SIZE: usize = 0x7400;
    pub const DATA_PAGE_HEADER_SIZE: usize = 32;
    pub const SYSTEM_PAGE_HEADER_SIZE: usize = 20;
    pub const PAGE_TYPE_DATA: u32 = 0x4163043B;
    pub const PAGE_TYPE_PAGE_MAP: u32 = 0x41630E3B;
    pub const PAGE_TYPE_SECTION_MAP: u32 = 0x4163003B;
    /// Compression code: stored as-is.
    pub const COMPRESSION_NONE: u32 = 1;
    /// Compression code: opcode-stream LZ77.
    pub const COMPRESSION_LZ77: u32 = 2;
    /// Page and section alignment.
    pub const ALIGNMENT: usize = 0x20;
}

/// Handle map chunking; each chunk holds at most this many bytes of
/// size field plus data.
pub const HANDLE_MAP_MAX_CHUNK: usize = 2032;

/// Seed of the 16-bit section CRC.
pub const CRC16_SEED: u16 = 0xC0C1;
