//! Page checksum, magic padding sequence and padding arithmetic for the
//! paged container.

/// Bytes between modulo reductions; keeps both sums inside 32 bits.
const CHUNK: usize = 0x15B0;
const MODULUS: u32 = 0xFFF1;

const fn build_magic_sequence() -> [u8; 256] {
    let mut out = [0u8; 256];
    let mut seed: u32 = 1;
    let mut i = 0;
    while i < 256 {
        seed = seed.wrapping_mul(0x343FD).wrapping_add(0x269EC3);
        out[i] = (seed >> 16) as u8;
        i += 1;
    }
    out
}

/// Fixed filler used for alignment padding and for masking the paged file
/// header. Generated by the LCG `seed * 0x343FD + 0x269EC3` from seed 1.
pub static MAGIC_SEQUENCE: [u8; 256] = build_magic_sequence();

/// Adler-style checksum of system pages, continuing from `seed`.
///
/// The low half of the seed is the running byte sum and the high half the
/// sum of sums, both reduced modulo 0xFFF1.
pub fn adler32(seed: u32, data: &[u8]) -> u32 {
    let mut sum1 = seed & 0xFFFF;
    let mut sum2 = seed >> 16;
    for chunk in data.chunks(CHUNK) {
        for &byte in chunk {
            sum1 += byte as u32;
            sum2 += sum1;
        }
        sum1 %= MODULUS;
        sum2 %= MODULUS;
    }
    (sum2 << 16) | (sum1 & 0xFFFF)
}

/// Bytes needed to extend `len` to the next multiple of 0x20.
pub fn compression_padding(len: usize) -> usize {
    0x1F - (len + 0x1F) % 0x20
}

/// `count` bytes of magic filler, cycling through the sequence.
pub fn magic_padding(count: usize) -> Vec<u8> {
    MAGIC_SEQUENCE.iter().copied().cycle().take(count).collect()
}
