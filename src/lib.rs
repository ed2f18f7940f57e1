//! # acad-dwg-core
//!
//! The bit-level binary core for reading and writing DWG files.
//!
//! ## Features
//!
//! - Bit cursors for every DWG primitive (BS, BL, BD, MC, MS, handles, text)
//! - Per-revision encoding strategy from R13 (AC1012) to R2018 (AC1032)
//! - Merged main/text/handle sub-streams for R2007+
//! - Section framing with sentinels, sizes and CRC-16
//! - LZ77 page compression for R2004+ and R2007
//! - Handle map, class table and object record codecs
//! - Flat (R13-R2000) and paged (R2004, R2010+) file containers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acad_dwg_core::io::{DwgFileReader, DwgFileWriter};
//! use acad_dwg_core::notification::NotificationCollection;
//! use acad_dwg_core::DwgVersion;
//!
//! let mut notes = NotificationCollection::new();
//! let file = DwgFileReader::from_file("sample.dwg")?.read(&mut notes)?;
//! for (name, data) in &file.sections {
//!     println!("{}: {} bytes", name, data.len());
//! }
//!
//! let bytes = DwgFileWriter::new(DwgVersion::AC1032).write(&file.sections)?;
//! # Ok::<(), acad_dwg_core::error::DwgError>(())
//! ```

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod classes;
pub mod error;
pub mod io;
pub mod notification;
pub mod objects;
pub mod types;

pub use error::{DwgError, Result};
pub use types::{DwgVersion, Vector2, Vector3};

pub use classes::{DxfClass, DxfClassCollection};
pub use notification::{Notification, NotificationCollection, NotificationType};
pub use objects::{FieldKind, FieldValue, ObjectRegistry, RecordSchema, RecordValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_registry_is_shared() {
        assert!(objects::DEFAULT_REGISTRY.contains(objects::type_codes::LINE));
        assert_eq!(DwgVersion::ALL.len(), 8);
    }
}
