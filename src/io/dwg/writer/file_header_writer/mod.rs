//! Container assembly.
//!
//! - `DwgFileHeaderWriterAC15`: flat locator layout (R13-R2000)
//! - `DwgFileHeaderWriterAC18`: paged layout with LZ77 pages (R2004, R2010+)

mod writer_ac15;
mod writer_ac18;

pub use writer_ac15::{DwgFileHeaderWriterAC15, FLAT_SECTION_ORDER};
pub use writer_ac18::DwgFileHeaderWriterAC18;

use crate::error::Result;

/// Collects named sections and lays out the finished file.
pub trait DwgFileHeaderWriter {
    /// Register a section's payload. Payloads are written in the order the
    /// layout prescribes, not necessarily in registration order.
    fn add_section(&mut self, name: &str, data: Vec<u8>) -> Result<()>;

    /// Assemble every registered section into the file bytes.
    fn write_file(&mut self) -> Result<Vec<u8>>;
}
