//! I/O for the DWG binary format

pub mod dwg;

pub use dwg::reader::{DwgFileReader, ObjectRecordReader};
pub use dwg::writer::{DwgFileWriter, ObjectRecordWriter};
pub use dwg::{DwgFile, DwgReaderConfiguration, DwgWriterConfiguration};
