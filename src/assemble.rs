//! Code point assembly and re-encoding
//!
//! Decoders turn one validated sequence into a scalar value; sinks write a
//! scalar value in the destination's unit width. Sinks come in a checked
//! flavour, which reports values the destination cannot hold and running out
//! of room, and a trusted flavour used by the `convert_valid_*` family.

use std::marker::PhantomData;

use crate::ErrorKind;
use crate::classify::{Utf16Class, classify_utf8, classify_utf16};
use crate::units::{ByteOrder, CodeUnit};

/// Scalar value encoded by a surrogate pair
#[inline]
pub(crate) fn compose_surrogates(high: u16, low: u16) -> u32 {
    0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00)
}

/// Surrogate pair for a scalar value above 0xFFFF
#[inline]
pub(crate) fn split_surrogates(code_point: u32) -> (u16, u16) {
    let offset = code_point.wrapping_sub(0x10000) & 0xF_FFFF;
    (
        0xD800 + (offset >> 10) as u16,
        0xDC00 + (offset & 0x3FF) as u16,
    )
}

/// Decode the UTF-8 sequence starting at `at`.
///
/// Returns the scalar value and the number of bytes it spans. Missing
/// continuation bytes read as zero payload; this only matters for input that
/// never went through validation.
#[inline]
pub(crate) fn decode_utf8(input: &[u8], at: usize) -> (u32, usize) {
    let lead = input[at];
    let len = classify_utf8(lead).sequence_len();
    if len == 1 {
        return (u32::from(lead), 1);
    }
    let mut code_point = u32::from(lead & (0x7F >> len));
    for i in 1..len {
        let byte = input.get(at + i).copied().unwrap_or(0x80);
        code_point = (code_point << 6) | u32::from(byte & 0x3F);
    }
    (code_point, len)
}

/// Decode the UTF-16 unit or surrogate pair starting at `at`
#[inline]
pub(crate) fn decode_utf16<E: ByteOrder>(input: &[u16], at: usize) -> (u32, usize) {
    let unit = E::read(input[at]);
    if classify_utf16(unit) == Utf16Class::HighSurrogate {
        if let Some(&next) = input.get(at + 1) {
            let next = E::read(next);
            if classify_utf16(next) == Utf16Class::LowSurrogate {
                return (compose_surrogates(unit, next), 2);
            }
        }
    }
    (u32::from(unit), 1)
}

/// Number of UTF-8 bytes for a scalar value
#[inline]
pub(crate) fn utf8_len(code_point: u32) -> usize {
    match code_point {
        0..=0x7F => 1,
        0x80..=0x7FF => 2,
        0x800..=0xFFFF => 3,
        _ => 4,
    }
}

#[inline]
fn write_utf8(code_point: u32, out: &mut [u8]) -> usize {
    match utf8_len(code_point) {
        1 => {
            out[0] = code_point as u8;
            1
        }
        2 => {
            out[0] = 0xC0 | (code_point >> 6) as u8;
            out[1] = 0x80 | (code_point & 0x3F) as u8;
            2
        }
        3 => {
            out[0] = 0xE0 | (code_point >> 12) as u8;
            out[1] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
            out[2] = 0x80 | (code_point & 0x3F) as u8;
            3
        }
        _ => {
            out[0] = 0xF0 | (code_point >> 18) as u8;
            out[1] = 0x80 | ((code_point >> 12) & 0x3F) as u8;
            out[2] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
            out[3] = 0x80 | (code_point & 0x3F) as u8;
            4
        }
    }
}

/// Destination encoding of the pipeline
pub(crate) trait Sink {
    type Unit: CodeUnit;

    /// Write one scalar value, failing if the destination cannot represent it
    /// or `out` is too short.
    fn encode(code_point: u32, out: &mut [Self::Unit]) -> Result<usize, ErrorKind>;

    /// Write one scalar value already known to be representable.
    ///
    /// Panics if `out` is too short.
    fn encode_valid(code_point: u32, out: &mut [Self::Unit]) -> usize;

    /// Unit holding an ASCII byte
    fn from_ascii(byte: u8) -> Self::Unit;
}

#[derive(Debug)]
pub(crate) struct Utf8Sink;

#[derive(Debug)]
pub(crate) struct Utf16Sink<E>(PhantomData<E>);

#[derive(Debug)]
pub(crate) struct Utf32Sink;

#[derive(Debug)]
pub(crate) struct Latin1Sink;

impl Sink for Utf8Sink {
    type Unit = u8;

    #[inline]
    fn encode(code_point: u32, out: &mut [u8]) -> Result<usize, ErrorKind> {
        if out.len() < utf8_len(code_point) {
            return Err(ErrorKind::OutputBufferTooSmall);
        }
        Ok(write_utf8(code_point, out))
    }

    #[inline]
    fn encode_valid(code_point: u32, out: &mut [u8]) -> usize {
        write_utf8(code_point, out)
    }

    #[inline]
    fn from_ascii(byte: u8) -> u8 {
        byte
    }
}

impl<E: ByteOrder> Sink for Utf16Sink<E> {
    type Unit = u16;

    #[inline]
    fn encode(code_point: u32, out: &mut [u16]) -> Result<usize, ErrorKind> {
        let needed = if code_point > 0xFFFF { 2 } else { 1 };
        if out.len() < needed {
            return Err(ErrorKind::OutputBufferTooSmall);
        }
        Ok(Self::encode_valid(code_point, out))
    }

    #[inline]
    fn encode_valid(code_point: u32, out: &mut [u16]) -> usize {
        if code_point <= 0xFFFF {
            out[0] = E::write(code_point as u16);
            1
        } else {
            let (high, low) = split_surrogates(code_point);
            out[0] = E::write(high);
            out[1] = E::write(low);
            2
        }
    }

    #[inline]
    fn from_ascii(byte: u8) -> u16 {
        E::write(u16::from(byte))
    }
}

impl Sink for Utf32Sink {
    type Unit = u32;

    #[inline]
    fn encode(code_point: u32, out: &mut [u32]) -> Result<usize, ErrorKind> {
        let slot = out.first_mut().ok_or(ErrorKind::OutputBufferTooSmall)?;
        *slot = code_point;
        Ok(1)
    }

    #[inline]
    fn encode_valid(code_point: u32, out: &mut [u32]) -> usize {
        out[0] = code_point;
        1
    }

    #[inline]
    fn from_ascii(byte: u8) -> u32 {
        u32::from(byte)
    }
}

impl Sink for Latin1Sink {
    type Unit = u8;

    #[inline]
    fn encode(code_point: u32, out: &mut [u8]) -> Result<usize, ErrorKind> {
        if code_point > 0xFF {
            return Err(ErrorKind::TooLarge);
        }
        let slot = out.first_mut().ok_or(ErrorKind::OutputBufferTooSmall)?;
        *slot = code_point as u8;
        Ok(1)
    }

    #[inline]
    fn encode_valid(code_point: u32, out: &mut [u8]) -> usize {
        out[0] = code_point as u8;
        1
    }

    #[inline]
    fn from_ascii(byte: u8) -> u8 {
        byte
    }
}
