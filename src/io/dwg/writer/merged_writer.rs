//! Writer that assembles the sub-streams of one object record.
//!
//! Fields are written in declaration order; text values (R2007+) and
//! handle references are diverted to their own buffers. [`finish`]
//! concatenates them into the on-disk layout:
//!
//! ```text
//! | main bits | text bits | text size words | flag | handle bits | pad |
//! ```
//!
//! Before R2007 there is no text stream and the layout is just
//! `| main bits | handle bits | pad |`.
//!
//! [`finish`]: DwgMergedWriter::finish

use encoding_rs::Encoding;

use super::bit_writer::DwgBitWriter;
use super::stream_writer::DwgStreamWriter;
use crate::error::{DwgError, Result};
use crate::io::dwg::reference_type::{DwgReferenceType, HandleReference};
use crate::io::dwg::version_codec::VersionCodec;

/// Output of [`DwgMergedWriter::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedStreams {
    /// The merged body, padded to whole bytes.
    pub data: Vec<u8>,
    /// Bit position of the handle stream within `data`.
    pub handle_start: u64,
}

impl MergedStreams {
    /// Bits from the handle start to the end of the padded body, the value
    /// R2010+ records declare up front.
    pub fn handle_stream_bits(&self) -> u64 {
        self.data.len() as u64 * 8 - self.handle_start
    }
}

pub struct DwgMergedWriter {
    main: DwgBitWriter,
    text: Option<DwgBitWriter>,
    handles: DwgBitWriter,
    /// Bit position of the RL that receives the handle start.
    size_placeholder: Option<u64>,
}

impl DwgMergedWriter {
    pub fn new(codec: VersionCodec) -> Self {
        Self::with_encoding(codec, encoding_rs::WINDOWS_1252)
    }

    pub fn with_encoding(codec: VersionCodec, encoding: &'static Encoding) -> Self {
        let stream = || DwgBitWriter::new(codec).with_encoding(encoding);
        Self {
            main: stream(),
            text: codec.merged_text.then(|| stream()),
            handles: stream(),
            size_placeholder: None,
        }
    }

    pub fn main(&mut self) -> &mut DwgBitWriter {
        &mut self.main
    }

    pub fn handles(&mut self) -> &mut DwgBitWriter {
        &mut self.handles
    }

    /// Reserve an RL on main that [`finish`](Self::finish) patches with the
    /// handle start in bits.
    pub fn save_position_for_size(&mut self) -> Result<()> {
        self.main.save_position_for_size()?;
        self.size_placeholder = Some(self.main.saved_position_in_bits());
        Ok(())
    }

    /// Merge the sub-streams into one padded body.
    pub fn finish(mut self) -> Result<MergedStreams> {
        let main_bits = self.main.position_in_bits();

        if let Some(text) = &self.text {
            let text_bits = text.position_in_bits();
            if text_bits > 0 {
                self.main.write_bits_from(text.data(), text_bits)?;
                self.main.set_position_by_flag(text_bits)?;
                self.main.write_bit(true)?;
            } else {
                self.main.write_bit(false)?;
            }
            tracing::trace!(main_bits, text_bits, "merged text stream");
        }

        let handle_start = self.main.position_in_bits();
        let handle_bits = self.handles.position_in_bits();
        self.main.write_bits_from(self.handles.data(), handle_bits)?;
        self.main.write_spear_shift()?;

        if let Some(placeholder) = self.size_placeholder {
            let value = u32::try_from(handle_start).map_err(|_| {
                DwgError::InvalidFormat(format!("handle start {} does not fit an RL", handle_start))
            })?;
            self.main.patch_raw_long(placeholder, value)?;
        }

        Ok(MergedStreams {
            data: self.main.into_inner(),
            handle_start,
        })
    }
}

impl DwgStreamWriter for DwgMergedWriter {
    fn codec(&self) -> &VersionCodec {
        self.main.codec()
    }

    fn encoding(&self) -> &'static Encoding {
        self.main.encoding()
    }

    fn position_in_bits(&self) -> u64 {
        self.main.position_in_bits()
    }

    fn write_bit(&mut self, value: bool) -> Result<()> {
        self.main.write_bit(value)
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        self.main.write_byte(value)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.main.write_bytes(bytes)
    }

    fn write_spear_shift(&mut self) -> Result<()> {
        self.main.write_spear_shift()
    }

    fn write_handle_reference_raw(&mut self, reference: &HandleReference) -> Result<()> {
        self.handles.write_handle_reference_raw(reference)
    }

    fn write_handle_reference_on_main(&mut self, handle: u64) -> Result<()> {
        self.main
            .write_handle_reference(DwgReferenceType::Undefined, handle)
    }

    fn write_variable_text(&mut self, value: &str) -> Result<()> {
        match self.text.as_mut() {
            Some(text) => text.write_variable_text(value),
            None => self.main.write_variable_text(value),
        }
    }
}
