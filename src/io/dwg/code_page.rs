//! DWG code page index to encoding mapping.
//!
//! The file header stores the drawing code page as a numeric index
//! (30 = ANSI_1252). Single-byte text of R13 to R2004 files is decoded
//! with the matching `encoding_rs` encoding; R2007+ text is UTF-16 and
//! does not use it.

use encoding_rs::Encoding;

/// Index written when nothing else is configured.
pub const ANSI_1252: u16 = 30;

/// Encoding for a header code page index.
///
/// Indices without an `encoding_rs` counterpart fall back to Windows-1252,
/// DOS pages map to their closest Windows page.
pub fn encoding_from_code_page(code_page: u16) -> &'static Encoding {
    match code_page {
        // ISO 8859
        3 => encoding_rs::ISO_8859_2,
        4 => encoding_rs::ISO_8859_3,
        5 => encoding_rs::ISO_8859_4,
        6 => encoding_rs::ISO_8859_5,
        7 => encoding_rs::ISO_8859_6,
        8 => encoding_rs::ISO_8859_7,
        9 => encoding_rs::ISO_8859_8,
        10 => encoding_rs::WINDOWS_1254,

        // DOS/OEM
        13 => encoding_rs::WINDOWS_1250,
        14 | 27 => encoding_rs::IBM866,
        15 => encoding_rs::WINDOWS_1254,
        21 => encoding_rs::WINDOWS_1253,
        22 | 38 => encoding_rs::SHIFT_JIS,
        23 => encoding_rs::MACINTOSH,

        // Asian
        24 | 41 => encoding_rs::BIG5,
        25 | 26 | 40 | 42 => encoding_rs::EUC_KR,
        31 | 39 => encoding_rs::GBK,

        // Windows/ANSI
        28 => encoding_rs::WINDOWS_1250,
        29 => encoding_rs::WINDOWS_1251,
        32 => encoding_rs::WINDOWS_1253,
        33 => encoding_rs::WINDOWS_1254,
        34 => encoding_rs::WINDOWS_1255,
        35 => encoding_rs::WINDOWS_1256,
        36 => encoding_rs::WINDOWS_1257,
        37 => encoding_rs::WINDOWS_874,
        44 => encoding_rs::WINDOWS_1258,

        _ => encoding_rs::WINDOWS_1252,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_indices() {
        assert_eq!(encoding_from_code_page(ANSI_1252), encoding_rs::WINDOWS_1252);
        assert_eq!(encoding_from_code_page(29), encoding_rs::WINDOWS_1251);
        assert_eq!(encoding_from_code_page(38), encoding_rs::SHIFT_JIS);
        assert_eq!(encoding_from_code_page(39), encoding_rs::GBK);
    }

    #[test]
    fn test_unknown_index_falls_back() {
        assert_eq!(encoding_from_code_page(0), encoding_rs::WINDOWS_1252);
        assert_eq!(encoding_from_code_page(1000), encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_cyrillic_text_bytes() {
        let encoding = encoding_from_code_page(29);
        let (bytes, _, unmappable) = encoding.encode("Слой");
        assert!(!unmappable);
        assert_eq!(&bytes[..], &[0xD1, 0xEB, 0xEE, 0xE9]);
    }
}
