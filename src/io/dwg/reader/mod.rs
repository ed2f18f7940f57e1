//! Reader side of the DWG core.
//!
//! ## Bit streams
//! - [`stream_reader`]: the `DwgStreamReader` trait of primitive reads
//! - [`bit_reader`]: the bit cursor over one byte buffer
//! - [`merged_reader`]: main/text/handle sub-streams of one record
//!
//! ## Sections
//! - [`section_reader`]: sentinel/size/CRC framing
//! - [`handle_reader`]: `AcDb:Handles` (object map)
//! - [`classes_reader`]: `AcDb:Classes`
//! - [`object_reader`]: object records of `AcDb:AcDbObjects`
//!
//! ## Container
//! - [`dwg_reader`]: flat and paged file layouts

pub mod bit_reader;
pub mod merged_reader;
pub mod stream_reader;

pub mod classes_reader;
pub mod dwg_reader;
pub mod handle_reader;
pub mod object_reader;
pub mod section_reader;

pub use bit_reader::DwgBitReader;
pub use merged_reader::DwgMergedReader;
pub use stream_reader::DwgStreamReader;

pub use classes_reader::DwgClassesReader;
pub use dwg_reader::DwgFileReader;
pub use handle_reader::DwgHandleReader;
pub use object_reader::ObjectRecordReader;
pub use section_reader::{DwgSectionReader, FramedSection};
