//! One page of a paged section.

/// Location and sizes of a page.
///
/// `page_number`, `compressed_size` and `offset` are what the section map
/// stores; the rest is filled in from the page map and page header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DwgLocalSectionMap {
    pub page_number: u32,
    /// Stored body size.
    pub compressed_size: u32,
    /// Content bytes this page contributes to the section.
    pub decompressed_size: u32,
    /// Offset of the content in the decompressed section.
    pub offset: u64,
    /// Bytes the page occupies in the file, header and padding included.
    pub page_size: u32,
    /// Absolute file position of the page header.
    pub seeker: u64,
    /// CRC-32 of the stored body.
    pub checksum: u32,
}

impl DwgLocalSectionMap {
    pub fn new(page_number: u32, offset: u64) -> Self {
        Self {
            page_number,
            offset,
            ..Self::default()
        }
    }

    /// First decompressed byte past this page.
    pub fn end(&self) -> u64 {
        self.offset + self.decompressed_size as u64
    }
}

/// Split `data` into pages of at most `max_page_size` bytes, yielding the
/// offset and content of every page that is not entirely zero.
///
/// The final page is always yielded so its end marks the section size.
pub fn non_zero_pages(data: &[u8], max_page_size: usize) -> impl Iterator<Item = (u64, &[u8])> {
    let page_size = max_page_size.max(1);
    let last = data.len().div_ceil(page_size).saturating_sub(1);
    data.chunks(page_size)
        .enumerate()
        .filter(move |(i, chunk)| *i == last || chunk.iter().any(|&b| b != 0))
        .map(move |(i, chunk)| ((i * page_size) as u64, chunk))
}
