//! Table-driven checksums used by the DWG container.
//!
//! - **CRC-8**, so named in the format documentation, is really a 16-bit
//!   reflected CRC (polynomial 0xA001). Sections and the handle map use it
//!   with seed `0xC0C1`.
//! - **CRC-32** is the reflected IEEE polynomial 0xEDB88320 with the seed
//!   and the result inverted. Page bodies and the paged file header use it.
//!
//! Both lookup tables are generated at compile time.

const fn build_crc8_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// 16-bit section CRC lookup table.
pub static CRC8_TABLE: [u16; 256] = build_crc8_table();

/// CRC-32 lookup table.
pub static CRC32_TABLE: [u32; 256] = build_crc32_table();

/// Section CRC over `data`, continuing from `seed`.
pub fn crc8(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |crc, &byte| {
        let index = (byte ^ crc as u8) as usize;
        (crc >> 8) ^ CRC8_TABLE[index]
    })
}

/// CRC-32 over `data`. `seed` is the previous result (0 to start), so
/// `crc32(crc32(0, a), b) == crc32(0, a ++ b)`.
pub fn crc32(seed: u32, data: &[u8]) -> u32 {
    let crc = data.iter().fold(!seed, |crc, &byte| {
        let index = (crc as u8 ^ byte) as usize;
        (crc >> 8) ^ CRC32_TABLE[index]
    });
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_entries() {
        assert_eq!(CRC8_TABLE[0], 0x0000);
        assert_eq!(CRC8_TABLE[1], 0xC0C1);
        assert_eq!(CRC8_TABLE[2], 0xC181);
        assert_eq!(CRC8_TABLE[0xC1], 0x90C1);
        assert_eq!(CRC8_TABLE[0xFF], 0x4040);
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[0xFF], 0x2D02_EF8D);
    }

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(0, &[]), 0);
        assert_eq!(crc8(0xC0C1, &[]), 0xC0C1);
    }

    #[test]
    fn test_crc8_check_value() {
        assert_eq!(crc8(0, b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_crc8_section_seed() {
        assert_eq!(crc8(0xC0C1, &[0x00]), 0x9001);
    }

    #[test]
    fn test_crc8_framed_classes_vector() {
        use crate::io::dwg::constants::sentinels::CLASSES_START;
        // RL size 3 and three payload bytes, as the section frame covers them
        let covered = [0x03, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC];
        assert_eq!(crc8(0xC0C1, &covered), 0x49A0);
        let with_sentinel = [&CLASSES_START[..], &covered[..]].concat();
        assert_eq!(crc8(0xC0C1, &with_sentinel), 0xAB9C);
    }

    #[test]
    fn test_crc8_residue_is_zero() {
        let data = b"AcDb:Classes payload";
        let crc = crc8(0xC0C1, data);
        let mut framed = data.to_vec();
        framed.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(crc8(0xC0C1, &framed), 0);
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(0, &[]), 0);
        assert_eq!(crc32(0, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_chaining() {
        let a = b"first half ";
        let b = b"second half";
        let joined = [&a[..], &b[..]].concat();
        assert_eq!(crc32(crc32(0, a), b), crc32(0, &joined));
    }
}
