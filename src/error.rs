//! Error types for the DWG binary core

use std::fmt;
use std::io;
use thiserror::Error;

/// Which of the two sentinels of a framed section failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    Start,
    End,
}

impl fmt::Display for SentinelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentinelKind::Start => write!(f, "start"),
            SentinelKind::End => write!(f, "end"),
        }
    }
}

/// Main error type for DWG encode/decode operations
#[derive(Debug, Error)]
pub enum DwgError {
    /// IO error from the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The 6-byte magic names a revision without a codec
    #[error("Unsupported DWG revision: {0:?}")]
    UnsupportedRevision(String),

    /// Attempted read past the end of the available bytes
    #[error("Unexpected end of stream at bit {offset_bits}")]
    EndOfStream { offset_bits: u64 },

    /// Section start or end marker did not match
    #[error("Sentinel mismatch ({kind}) in section {section}")]
    SentinelMismatch {
        section: String,
        kind: SentinelKind,
    },

    /// Object type code has no registered schema
    #[error("Unimplemented record type: {type_code:#X}")]
    UnimplementedRecordType { type_code: u16 },

    /// A handle reference with an out-of-range code, or one that does not
    /// resolve to a valid unsigned handle
    #[error("Malformed handle reference code: {code:#X}")]
    MalformedHandleCode { code: u8 },

    /// CRC or page checksum mismatch
    #[error("Checksum mismatch in {section}: expected {expected:#X}, got {actual:#X}")]
    ChecksumMismatch {
        section: String,
        expected: u32,
        actual: u32,
    },

    /// A 2-bit tag that is not valid for the primitive being read
    #[error("Invalid tag {tag:#b} for {primitive}")]
    InvalidTag { primitive: &'static str, tag: u8 },

    /// Error during compression
    #[error("Compression error: {0}")]
    Compression(String),

    /// Error during decompression
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Structurally invalid data
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Feature not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Failure while decoding a named section, with the byte offset
    #[error("{section} at byte {offset:#X}: {source}")]
    Section {
        section: String,
        offset: u64,
        #[source]
        source: Box<DwgError>,
    },

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),
}

impl DwgError {
    /// Wrap this error with the section name and byte offset where it
    /// surfaced. Wrapping an already wrapped error keeps the innermost
    /// section context.
    pub fn in_section(self, section: &str, offset: u64) -> Self {
        match self {
            DwgError::Section { .. } => self,
            other => DwgError::Section {
                section: section.to_string(),
                offset,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, with any section context removed.
    pub fn kind(&self) -> &DwgError {
        match self {
            DwgError::Section { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Map a failed byte-level read at `byte_offset`; a short read becomes
    /// `EndOfStream`.
    pub fn from_read(error: io::Error, byte_offset: u64) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            DwgError::EndOfStream {
                offset_bits: byte_offset * 8,
            }
        } else {
            DwgError::Io(error)
        }
    }

    /// The section name attached to this error, if any.
    pub fn section(&self) -> Option<&str> {
        match self {
            DwgError::Section { section, .. } => Some(section),
            DwgError::SentinelMismatch { section, .. } => Some(section),
            DwgError::ChecksumMismatch { section, .. } => Some(section),
            _ => None,
        }
    }
}

/// Result type alias for DWG operations
pub type Result<T> = std::result::Result<T, DwgError>;

impl From<String> for DwgError {
    fn from(s: String) -> Self {
        DwgError::Custom(s)
    }
}

impl From<&str> for DwgError {
    fn from(s: &str) -> Self {
        DwgError::Custom(s.to_string())
    }
}

/// Extension for attaching section context to a `Result`.
pub trait SectionContext<T> {
    fn in_section(self, section: &str, offset: u64) -> Result<T>;
}

impl<T> SectionContext<T> for Result<T> {
    fn in_section(self, section: &str, offset: u64) -> Result<T> {
        self.map_err(|e| e.in_section(section, offset))
    }
}
