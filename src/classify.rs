//! Per-unit structural classification
//!
//! Every function here looks at exactly one code unit and answers with range
//! comparisons only. The validator turns these answers into window masks.

/// Structural role of a UTF-8 byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Class {
    /// 0x00..=0x7F
    Ascii,
    /// 0x80..=0xBF
    Continuation,
    /// 0xC0..=0xDF
    Lead2,
    /// 0xE0..=0xEF
    Lead3,
    /// 0xF0..=0xF7
    Lead4,
    /// 0xF8..=0xFF, never legal
    InvalidLead,
}

impl Utf8Class {
    /// Number of bytes in a sequence started by this class, 1 for anything
    /// that cannot start a multi-byte sequence.
    #[inline]
    pub fn sequence_len(self) -> usize {
        match self {
            Utf8Class::Lead2 => 2,
            Utf8Class::Lead3 => 3,
            Utf8Class::Lead4 => 4,
            _ => 1,
        }
    }

    /// Whether this class starts a multi-byte sequence
    #[inline]
    pub fn is_lead(self) -> bool {
        matches!(self, Utf8Class::Lead2 | Utf8Class::Lead3 | Utf8Class::Lead4)
    }
}

/// Structural role of a UTF-16 code unit (native value)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf16Class {
    /// Anything outside 0xD800..=0xDFFF
    Plain,
    /// 0xD800..=0xDBFF
    HighSurrogate,
    /// 0xDC00..=0xDFFF
    LowSurrogate,
}

/// Structural role of a UTF-32 code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf32Class {
    /// A Unicode scalar value
    Plain,
    /// A surrogate value, not encodable on its own
    Surrogate,
    /// Above 0x10FFFF
    OutOfRange,
}

/// Classify one UTF-8 byte
#[inline]
pub fn classify_utf8(byte: u8) -> Utf8Class {
    if byte < 0x80 {
        Utf8Class::Ascii
    } else if byte < 0xC0 {
        Utf8Class::Continuation
    } else if byte < 0xE0 {
        Utf8Class::Lead2
    } else if byte < 0xF0 {
        Utf8Class::Lead3
    } else if byte < 0xF8 {
        Utf8Class::Lead4
    } else {
        Utf8Class::InvalidLead
    }
}

/// Classify one UTF-16 code unit given in native byte order
#[inline]
pub fn classify_utf16(unit: u16) -> Utf16Class {
    match unit & 0xFC00 {
        0xD800 => Utf16Class::HighSurrogate,
        0xDC00 => Utf16Class::LowSurrogate,
        _ => Utf16Class::Plain,
    }
}

/// Classify one UTF-32 code unit
#[inline]
pub fn classify_utf32(unit: u32) -> Utf32Class {
    if unit > 0x10FFFF {
        Utf32Class::OutOfRange
    } else if (0xD800..=0xDFFF).contains(&unit) {
        Utf32Class::Surrogate
    } else {
        Utf32Class::Plain
    }
}

/// Whether a byte is a UTF-8 continuation byte
#[inline]
pub fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
