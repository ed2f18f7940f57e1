//! Core value types: file revisions and coordinates.

mod vector;

pub use vector::{Vector2, Vector3};

use crate::error::{DwgError, Result};

/// DWG file revision, identified by the 6-byte magic at offset 0.
///
/// Variants are ordered so revision checks read as comparisons
/// (`version >= DwgVersion::AC1015`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DwgVersion {
    /// AutoCAD R13
    AC1012,
    /// AutoCAD R14
    AC1014,
    /// AutoCAD 2000
    AC1015,
    /// AutoCAD 2004
    AC1018,
    /// AutoCAD 2007
    AC1021,
    /// AutoCAD 2010
    AC1024,
    /// AutoCAD 2013
    AC1027,
    /// AutoCAD 2018
    AC1032,
}

impl DwgVersion {
    pub const ALL: [DwgVersion; 8] = [
        DwgVersion::AC1012,
        DwgVersion::AC1014,
        DwgVersion::AC1015,
        DwgVersion::AC1018,
        DwgVersion::AC1021,
        DwgVersion::AC1024,
        DwgVersion::AC1027,
        DwgVersion::AC1032,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DwgVersion::AC1012 => "AC1012",
            DwgVersion::AC1014 => "AC1014",
            DwgVersion::AC1015 => "AC1015",
            DwgVersion::AC1018 => "AC1018",
            DwgVersion::AC1021 => "AC1021",
            DwgVersion::AC1024 => "AC1024",
            DwgVersion::AC1027 => "AC1027",
            DwgVersion::AC1032 => "AC1032",
        }
    }

    /// The magic bytes written at the start of the file.
    pub fn magic(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out.copy_from_slice(self.as_str().as_bytes());
        out
    }

    /// Parse version from string (e.g., "AC1015")
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }

    /// Identify the revision from the first bytes of a file.
    ///
    /// Fails with `UnsupportedRevision` for anything that is not one of the
    /// known magic strings, including inputs shorter than six bytes.
    pub fn from_magic(bytes: &[u8]) -> Result<Self> {
        let head = &bytes[..bytes.len().min(6)];
        let text = String::from_utf8_lossy(head).into_owned();
        if head.len() < 6 {
            return Err(DwgError::UnsupportedRevision(text));
        }
        Self::parse(&text).ok_or(DwgError::UnsupportedRevision(text))
    }

    /// Marketing release name.
    pub fn release_name(&self) -> &'static str {
        match self {
            DwgVersion::AC1012 => "R13",
            DwgVersion::AC1014 => "R14",
            DwgVersion::AC1015 => "R2000",
            DwgVersion::AC1018 => "R2004",
            DwgVersion::AC1021 => "R2007",
            DwgVersion::AC1024 => "R2010",
            DwgVersion::AC1027 => "R2013",
            DwgVersion::AC1032 => "R2018",
        }
    }

    /// Default maintenance release byte written after the magic.
    pub fn maintenance_version(&self) -> u8 {
        match self {
            DwgVersion::AC1012 | DwgVersion::AC1014 => 0,
            DwgVersion::AC1015 => 20,
            DwgVersion::AC1018 => 104,
            DwgVersion::AC1021 => 50,
            DwgVersion::AC1024 => 226,
            DwgVersion::AC1027 => 125,
            DwgVersion::AC1032 => 228,
        }
    }
}

impl std::fmt::Display for DwgVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        assert_eq!(DwgVersion::AC1015.as_str(), "AC1015");
        assert_eq!(DwgVersion::AC1032.to_string(), "AC1032");
        assert_eq!(&DwgVersion::AC1018.magic(), b"AC1018");
    }

    #[test]
    fn test_from_magic() {
        assert_eq!(
            DwgVersion::from_magic(b"AC1024\x00\x00").unwrap(),
            DwgVersion::AC1024
        );
        assert!(matches!(
            DwgVersion::from_magic(b"AC1009"),
            Err(DwgError::UnsupportedRevision(_))
        ));
        assert!(matches!(
            DwgVersion::from_magic(b"AC"),
            Err(DwgError::UnsupportedRevision(_))
        ));
    }

    #[test]
    fn test_ordering() {
        assert!(DwgVersion::AC1012 < DwgVersion::AC1015);
        assert!(DwgVersion::AC1032 > DwgVersion::AC1021);
        for pair in DwgVersion::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
