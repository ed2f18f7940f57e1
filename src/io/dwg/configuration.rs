//! Reader and writer options.

use encoding_rs::Encoding;

use super::code_page;
use crate::error::{DwgError, Result};
use crate::notification::{NotificationCollection, NotificationType};

/// How integrity failures that do not prevent decoding are treated.
///
/// Covers checksum mismatches, end sentinel mismatches and page checksum
/// mismatches. A start sentinel mismatch always fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Fail the read.
    #[default]
    Strict,
    /// Record a warning notification and continue with the decoded data.
    Lenient,
}

/// Options for reading DWG data.
#[derive(Debug, Clone)]
pub struct DwgReaderConfiguration {
    pub strictness: Strictness,
    /// Skip records with no registered schema instead of failing.
    pub skip_unknown_records: bool,
    /// Check the CRC-32 of every data page.
    pub verify_page_checksums: bool,
}

impl Default for DwgReaderConfiguration {
    fn default() -> Self {
        Self {
            strictness: Strictness::Strict,
            skip_unknown_records: true,
            verify_page_checksums: true,
        }
    }
}

impl DwgReaderConfiguration {
    pub fn lenient() -> Self {
        Self {
            strictness: Strictness::Lenient,
            ..Self::default()
        }
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_skip_unknown_records(mut self, skip: bool) -> Self {
        self.skip_unknown_records = skip;
        self
    }

    pub fn with_verify_page_checksums(mut self, verify: bool) -> Self {
        self.verify_page_checksums = verify;
        self
    }

    /// Apply the strictness policy to a recoverable integrity failure.
    ///
    /// Strict returns the error; lenient records it as a warning located
    /// at `section`/`offset` and returns `Ok`.
    pub fn recover(
        &self,
        error: DwgError,
        section: &str,
        offset: u64,
        notifications: &mut NotificationCollection,
    ) -> Result<()> {
        match self.strictness {
            Strictness::Strict => Err(error),
            Strictness::Lenient => {
                notifications.notify_at(
                    NotificationType::Warning,
                    section,
                    offset,
                    error.to_string(),
                );
                Ok(())
            }
        }
    }
}

/// Options for writing DWG data.
#[derive(Debug, Clone)]
pub struct DwgWriterConfiguration {
    /// Maintenance release byte; `None` uses the revision default.
    pub maintenance_version: Option<u8>,
    /// Code page number stored in the file header (30 = ANSI_1252).
    pub code_page: u16,
    /// Compress section pages; when off, pages are stored.
    pub compress: bool,
}

impl Default for DwgWriterConfiguration {
    fn default() -> Self {
        Self {
            maintenance_version: None,
            code_page: code_page::ANSI_1252,
            compress: true,
        }
    }
}

impl DwgWriterConfiguration {
    pub fn with_maintenance_version(mut self, maintenance: u8) -> Self {
        self.maintenance_version = Some(maintenance);
        self
    }

    pub fn with_code_page(mut self, code_page: u16) -> Self {
        self.code_page = code_page;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Encoding the section writers use for single-byte text.
    pub fn encoding(&self) -> &'static Encoding {
        code_page::encoding_from_code_page(self.code_page)
    }
}
