//! Writer side of the DWG core.
//!
//! - [`stream_writer`]: the `DwgStreamWriter` trait of primitive writes
//! - [`bit_writer`]: the bit cursor writing into one buffer
//! - [`merged_writer`]: main/text/handle sub-streams of one record
//! - [`section_writer`]: sentinel/size/CRC framing
//! - [`handle_writer`]: handle map section writer
//! - [`classes_writer`]: classes section writer
//! - [`object_writer`]: object record writer
//! - [`file_header_writer`]: flat and paged container assembly
//! - [`dwg_writer`]: the container entry point

pub mod bit_writer;
pub mod classes_writer;
pub mod dwg_writer;
pub mod file_header_writer;
pub mod handle_writer;
pub mod merged_writer;
pub mod object_writer;
pub mod section_writer;
pub mod stream_writer;

pub use bit_writer::DwgBitWriter;
pub use classes_writer::DwgClassesWriter;
pub use dwg_writer::DwgFileWriter;
pub use file_header_writer::{DwgFileHeaderWriter, DwgFileHeaderWriterAC15, DwgFileHeaderWriterAC18};
pub use handle_writer::DwgHandleWriter;
pub use merged_writer::{DwgMergedWriter, MergedStreams};
pub use object_writer::{ObjectRecord, ObjectRecordWriter};
pub use section_writer::DwgSectionWriter;
pub use stream_writer::DwgStreamWriter;
