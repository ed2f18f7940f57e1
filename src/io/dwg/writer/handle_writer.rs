//! `AcDb:Handles` writer.
//!
//! Writes the handle-to-offset map as delta-encoded modular chars in
//! chunks of at most 2032 bytes, each closed by a big-endian CRC.

use std::collections::BTreeMap;

use super::bit_writer::DwgBitWriter;
use super::stream_writer::DwgStreamWriter;
use crate::error::{DwgError, Result};
use crate::io::dwg::constants::{CRC16_SEED, HANDLE_MAP_MAX_CHUNK};
use crate::io::dwg::crc;
use crate::io::dwg::version_codec::VersionCodec;

pub struct DwgHandleWriter {
    codec: VersionCodec,
}

impl DwgHandleWriter {
    pub fn new(codec: VersionCodec) -> Self {
        Self { codec }
    }

    /// Serialize `handle_map` (handle → byte offset in the object data).
    ///
    /// Entries are written in ascending handle order; deltas restart from
    /// zero at each chunk.
    pub fn write(&self, handle_map: &BTreeMap<u64, u64>) -> Result<Vec<u8>> {
        // A zero first delta reads back as a skipped entry
        if handle_map.contains_key(&0) {
            return Err(DwgError::InvalidFormat("handle 0 cannot be mapped".to_string()));
        }
        let mut output = Vec::new();
        let mut chunk_start = output.len();
        output.extend_from_slice(&[0, 0]);

        let mut last_handle = 0u64;
        let mut last_offset = 0u64;
        let mut chunks = 1usize;

        for (&handle, &offset) in handle_map {
            let mut entry = self.encode_entry(handle, offset, last_handle, last_offset)?;
            if output.len() - chunk_start + entry.len() > HANDLE_MAP_MAX_CHUNK {
                close_chunk(&mut output, chunk_start);
                chunk_start = output.len();
                output.extend_from_slice(&[0, 0]);
                chunks += 1;
                entry = self.encode_entry(handle, offset, 0, 0)?;
            }
            output.extend_from_slice(&entry);
            last_handle = handle;
            last_offset = offset;
        }
        close_chunk(&mut output, chunk_start);

        // Terminating chunk: size field only
        let terminator = output.len();
        output.extend_from_slice(&[0, 0]);
        close_chunk(&mut output, terminator);

        tracing::debug!(entries = handle_map.len(), chunks, bytes = output.len(), "wrote handle map");
        Ok(output)
    }

    fn encode_entry(
        &self,
        handle: u64,
        offset: u64,
        last_handle: u64,
        last_offset: u64,
    ) -> Result<Vec<u8>> {
        let delta = signed_offset(offset)? - signed_offset(last_offset)?;
        let mut w = DwgBitWriter::new(self.codec);
        w.write_modular_char(handle - last_handle)?;
        w.write_signed_modular_char(delta)?;
        Ok(w.into_inner())
    }
}

fn signed_offset(offset: u64) -> Result<i64> {
    i64::try_from(offset).map_err(|_| {
        DwgError::InvalidFormat(format!("object offset {:#X} is out of range", offset))
    })
}

/// Patch the chunk size and append its CRC, both big-endian.
fn close_chunk(output: &mut Vec<u8>, chunk_start: usize) {
    let size = (output.len() - chunk_start) as u16;
    output[chunk_start..chunk_start + 2].copy_from_slice(&size.to_be_bytes());
    let crc = crc::crc8(CRC16_SEED, &output[chunk_start..]);
    output.extend_from_slice(&crc.to_be_bytes());
}
