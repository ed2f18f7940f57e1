//! Handle references: the format's substitute for pointers.
//!
//! On the wire a reference is `|CODE (4 bits)|COUNTER (4 bits)|PAYLOAD|`,
//! the payload being `COUNTER` big-endian bytes. Codes 2 to 5 (and 0)
//! carry an absolute handle and say what kind of link it is. Codes 6, 8,
//! 0xA and 0xC are resolved against a reference handle supplied by the
//! caller, usually the handle of the object being decoded.

use crate::error::{DwgError, Result};

/// Semantic kind of an absolute reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DwgReferenceType {
    /// Code 0; used for an object's own handle.
    Undefined = 0,
    /// Non-exclusive owner link (code 2).
    SoftOwnership = 2,
    /// Exclusive ownership; the target dies with the referrer (code 3).
    HardOwnership = 3,
    /// Non-owning back-reference (code 4).
    SoftPointer = 4,
    /// Non-owning link the target must outlive (code 5).
    HardPointer = 5,
}

impl DwgReferenceType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DwgReferenceType::Undefined),
            2 => Some(DwgReferenceType::SoftOwnership),
            3 => Some(DwgReferenceType::HardOwnership),
            4 => Some(DwgReferenceType::SoftPointer),
            5 => Some(DwgReferenceType::HardPointer),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the referrer owns the target.
    pub fn is_ownership(self) -> bool {
        matches!(
            self,
            DwgReferenceType::SoftOwnership | DwgReferenceType::HardOwnership
        )
    }
}

/// The 4-bit code of a reference, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleCode {
    Absolute(DwgReferenceType),
    /// reference + 1
    PlusOne,
    /// reference - 1
    MinusOne,
    /// reference + payload
    PlusOffset,
    /// reference - payload
    MinusOffset,
}

impl HandleCode {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x6 => Ok(HandleCode::PlusOne),
            0x8 => Ok(HandleCode::MinusOne),
            0xA => Ok(HandleCode::PlusOffset),
            0xC => Ok(HandleCode::MinusOffset),
            other => DwgReferenceType::from_code(other)
                .map(HandleCode::Absolute)
                .ok_or(DwgError::MalformedHandleCode { code: other }),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            HandleCode::Absolute(t) => t.code(),
            HandleCode::PlusOne => 0x6,
            HandleCode::MinusOne => 0x8,
            HandleCode::PlusOffset => 0xA,
            HandleCode::MinusOffset => 0xC,
        }
    }

    /// Codes 6 and 8 imply their value and never carry payload bytes.
    pub fn has_payload(self) -> bool {
        !matches!(self, HandleCode::PlusOne | HandleCode::MinusOne)
    }
}

/// Number of bytes needed for the big-endian magnitude of `value`.
pub fn byte_count(value: u64) -> u8 {
    ((64 - value.leading_zeros() + 7) / 8) as u8
}

/// A reference as stored: code, payload length and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleReference {
    pub code: HandleCode,
    pub counter: u8,
    pub payload: u64,
}

impl HandleReference {
    /// Absolute reference with the minimal payload.
    pub fn absolute(reference_type: DwgReferenceType, handle: u64) -> Self {
        Self {
            code: HandleCode::Absolute(reference_type),
            counter: byte_count(handle),
            payload: handle,
        }
    }

    /// Shortest encoding of `handle` given the caller's reference handle.
    ///
    /// Relative forms are only taken when they are strictly shorter than
    /// the absolute soft pointer.
    pub fn relative(handle: u64, reference: u64) -> Self {
        let mut best = Self::absolute(DwgReferenceType::SoftPointer, handle);
        let candidate = if reference.checked_add(1) == Some(handle) {
            Self { code: HandleCode::PlusOne, counter: 0, payload: 0 }
        } else if reference.checked_sub(1) == Some(handle) {
            Self { code: HandleCode::MinusOne, counter: 0, payload: 0 }
        } else if handle > reference {
            let delta = handle - reference;
            Self { code: HandleCode::PlusOffset, counter: byte_count(delta), payload: delta }
        } else {
            let delta = reference - handle;
            Self { code: HandleCode::MinusOffset, counter: byte_count(delta), payload: delta }
        };
        if candidate.counter < best.counter {
            best = candidate;
        }
        best
    }

    /// The `code << 4 | counter` header byte.
    pub fn header_byte(&self) -> u8 {
        (self.code.code() << 4) | (self.counter & 0x0F)
    }

    /// Split a header byte into code and counter.
    ///
    /// Counters above 8 cannot hold a 64-bit handle and are rejected.
    pub fn parse_header(form: u8) -> Result<(HandleCode, u8)> {
        let code = HandleCode::from_code(form >> 4)?;
        let counter = form & 0x0F;
        if counter > 8 {
            return Err(DwgError::InvalidFormat(format!(
                "handle reference with {} payload bytes",
                counter
            )));
        }
        Ok((code, counter))
    }

    /// Absolute handle this reference designates.
    ///
    /// Arithmetic that leaves the `u64` range is reported as a malformed
    /// reference.
    pub fn resolve(&self, reference: u64) -> Result<u64> {
        let malformed = DwgError::MalformedHandleCode {
            code: self.code.code(),
        };
        match self.code {
            HandleCode::Absolute(_) => Ok(self.payload),
            HandleCode::PlusOne => reference.checked_add(1).ok_or(malformed),
            HandleCode::MinusOne => reference.checked_sub(1).ok_or(malformed),
            HandleCode::PlusOffset => reference.checked_add(self.payload).ok_or(malformed),
            HandleCode::MinusOffset => reference.checked_sub(self.payload).ok_or(malformed),
        }
    }

    /// Byte-aligned encoding: header byte, then the payload big-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.counter as usize);
        out.push(self.header_byte());
        if self.code.has_payload() {
            let be = self.payload.to_be_bytes();
            out.extend_from_slice(&be[8 - self.counter as usize..]);
        }
        out
    }

    /// Decode a byte-aligned reference, returning it with the bytes used.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize)> {
        let form = *bytes.first().ok_or(DwgError::EndOfStream { offset_bits: 0 })?;
        let (code, counter) = Self::parse_header(form)?;
        let len = if code.has_payload() { counter as usize } else { 0 };
        let body = bytes.get(1..1 + len).ok_or(DwgError::EndOfStream {
            offset_bits: bytes.len() as u64 * 8,
        })?;
        let payload = body.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        Ok((Self { code, counter, payload }, 1 + len))
    }
}
