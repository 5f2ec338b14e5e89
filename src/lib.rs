//! # FastTranscode - Window-Based Unicode Validation and Transcoding
//!
//! Validates and converts text between UTF-8, UTF-16LE, UTF-16BE, UTF-32 and
//! Latin-1, reporting the exact position of the first malformed unit when the
//! input is not well formed.
//!
//! ## Features
//!
//! - **Slice API** for every encoding pair, in checked, trusted and boolean flavours
//! - **UTF-16 in host order** (`utf16`) or an explicit byte order (`utf16le`, `utf16be`)
//! - **Exact error positions** with the partial output already committed
//! - **ASCII fast path** over 64-unit windows
//! - **Streaming support** that carries incomplete sequences between chunks
//! - **Chunk boundaries** found with `trim_partial_utf8` and `trim_partial_utf16*`
//! - **Lossy conversion** with U+FFFD replacement
//!
//! ## Quick Start
//!
//! ```rust
//! use fast_transcode::{Encoding, ErrorKind, Transcoder};
//!
//! let transcoder = Transcoder::new(Encoding::UTF8, Encoding::UTF16LE);
//! let utf16 = transcoder.convert("añb".as_bytes()).unwrap();
//! assert_eq!(utf16, [0x61, 0x00, 0xF1, 0x00, 0x62, 0x00]);
//!
//! // The slice API reports where validation failed
//! let mut out = [0u32; 4];
//! let err = fast_transcode::convert_utf8_to_utf32_with_errors(b"ok\xED\xA0\x80", &mut out)
//!     .unwrap_err();
//! assert_eq!(err.kind, ErrorKind::Surrogate);
//! assert_eq!(err.position, 2);
//! assert_eq!(err.written, 2);
//! ```

#![deny(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod classify;
mod assemble;
mod convert;
mod length;
mod pipeline;
mod transcoder;
mod units;
mod validate;

pub use convert::*;
pub use length::*;
pub use transcoder::{DEFAULT_BUFFER_SIZE, StreamingTranscoder, Transcoder};

/// Result type for transcoding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the byte-oriented [`Transcoder`] API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input is not well formed, or cannot be represented in the target
    Transcode(TranscodeError),
    /// Invalid input data
    InvalidInput(String),
    /// An encoding label that names none of the supported encodings
    UnknownEncoding(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transcode(err) => write!(f, "{}", err),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::UnknownEncoding(label) => write!(f, "Unknown encoding: {}", label),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transcode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TranscodeError> for Error {
    fn from(err: TranscodeError) -> Self {
        Error::Transcode(err)
    }
}

/// Why a unit could not take part in a legal encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A byte that can never appear in UTF-8 (0xF8 and above)
    HeaderBits,
    /// A lead byte without all of its continuation bytes
    TooShort,
    /// A continuation byte that no lead byte asked for
    TooLong,
    /// A sequence that encodes its code point with more bytes than needed
    Overlong,
    /// A code point above 0x10FFFF, or above what the destination can hold
    TooLarge,
    /// A surrogate value where none is allowed
    Surrogate,
    /// The destination slice has no room for the next code point
    OutputBufferTooSmall,
}

impl ErrorKind {
    /// Stable upper-case code of this kind
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::HeaderBits => "HEADER_BITS",
            ErrorKind::TooShort => "TOO_SHORT",
            ErrorKind::TooLong => "TOO_LONG",
            ErrorKind::Overlong => "OVERLONG",
            ErrorKind::TooLarge => "TOO_LARGE",
            ErrorKind::Surrogate => "SURROGATE",
            ErrorKind::OutputBufferTooSmall => "OUTPUT_BUFFER_TOO_SMALL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First failure found while validating or converting a slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscodeError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Offset, in source units, of the construct that failed
    pub position: usize,
    /// Destination units written before the failure; they are a prefix of
    /// the conversion of `input[..position]`
    pub written: usize,
    /// The failing sequence was cut off by the end of the input and may
    /// complete once more input arrives
    pub incomplete: bool,
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.kind, self.position)?;
        if self.incomplete {
            write!(f, " (incomplete input)")?;
        }
        Ok(())
    }
}

impl std::error::Error for TranscodeError {}

/// Counts of a successful conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Converted {
    /// Source units consumed, always the whole input
    pub read: usize,
    /// Destination units written
    pub written: usize,
}

/// Supported encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8 (variable length, 1-4 bytes)
    UTF8,
    /// UTF-16 little endian
    UTF16LE,
    /// UTF-16 big endian
    UTF16BE,
    /// UTF-32, little endian when handled as bytes
    UTF32,
    /// ISO-8859-1, code points 0..=0xFF
    LATIN1,
}

impl Encoding {
    /// All supported encodings
    pub const ALL: [Encoding; 5] = [
        Encoding::UTF8,
        Encoding::UTF16LE,
        Encoding::UTF16BE,
        Encoding::UTF32,
        Encoding::LATIN1,
    ];

    /// Canonical label
    pub fn name(self) -> &'static str {
        match self {
            Encoding::UTF8 => "UTF-8",
            Encoding::UTF16LE => "UTF-16LE",
            Encoding::UTF16BE => "UTF-16BE",
            Encoding::UTF32 => "UTF-32",
            Encoding::LATIN1 => "ISO-8859-1",
        }
    }

    /// Bytes per code unit
    pub fn unit_width(self) -> usize {
        match self {
            Encoding::UTF8 | Encoding::LATIN1 => 1,
            Encoding::UTF16LE | Encoding::UTF16BE => 2,
            Encoding::UTF32 => 4,
        }
    }

    /// Whether ASCII text is stored byte for byte
    pub fn is_ascii_compatible(self) -> bool {
        matches!(self, Encoding::UTF8 | Encoding::LATIN1)
    }

    /// Whether one code point may take more than one code unit
    pub fn is_variable_width(self) -> bool {
        matches!(self, Encoding::UTF8 | Encoding::UTF16LE | Encoding::UTF16BE)
    }

    /// Byte order mark, if the encoding has one
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            Encoding::UTF8 => Some(&[0xEF, 0xBB, 0xBF]),
            Encoding::UTF16LE => Some(&[0xFF, 0xFE]),
            Encoding::UTF16BE => Some(&[0xFE, 0xFF]),
            Encoding::UTF32 => Some(&[0xFF, 0xFE, 0x00, 0x00]),
            Encoding::LATIN1 => None,
        }
    }

    /// Upper bound on the destination units produced from `input_units`
    /// units of this encoding, computed without looking at the data.
    pub fn max_output_units(self, to: Encoding, input_units: usize) -> usize {
        let factor = match (self, to) {
            (Encoding::UTF16LE | Encoding::UTF16BE, Encoding::UTF8) => 3,
            (Encoding::UTF32, Encoding::UTF8) => 4,
            (Encoding::UTF32, Encoding::UTF16LE | Encoding::UTF16BE) => 2,
            (Encoding::LATIN1, Encoding::UTF8) => 2,
            _ => 1,
        };
        input_units.saturating_mul(factor)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let encoding = match s.to_uppercase().as_str() {
            "UTF8" | "UTF-8" => Encoding::UTF8,
            "UTF16LE" | "UTF-16LE" => Encoding::UTF16LE,
            "UTF16BE" | "UTF-16BE" => Encoding::UTF16BE,
            "UTF32" | "UTF-32" | "UTF32LE" | "UTF-32LE" => Encoding::UTF32,
            "ISO88591" | "ISO-8859-1" | "LATIN1" | "LATIN-1" | "L1" => Encoding::LATIN1,
            _ => return Err(Error::UnknownEncoding(s.to_string())),
        };
        Ok(encoding)
    }
}
