//! Output sizing and chunk boundaries
//!
//! These functions assume valid input and never fail. On malformed input they
//! still return a number, which is not meaningful.

use crate::assemble::utf8_len;
use crate::classify::{Utf16Class, classify_utf16, is_continuation};
use crate::units::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use crate::validate::trailing_incomplete_utf8;

/// Number of code points in UTF-8 input
pub fn count_utf8(input: &[u8]) -> usize {
    input.iter().filter(|&&byte| !is_continuation(byte)).count()
}

fn code_points_in_utf16<E: ByteOrder>(input: &[u16]) -> usize {
    input
        .iter()
        .filter(|&&unit| classify_utf16(E::read(unit)) != Utf16Class::LowSurrogate)
        .count()
}

/// Number of code points in native UTF-16 input
pub fn count_utf16(input: &[u16]) -> usize {
    code_points_in_utf16::<NativeEndian>(input)
}

/// Number of code points in UTF-16LE input
pub fn count_utf16le(input: &[u16]) -> usize {
    code_points_in_utf16::<LittleEndian>(input)
}

/// Number of code points in UTF-16BE input
pub fn count_utf16be(input: &[u16]) -> usize {
    code_points_in_utf16::<BigEndian>(input)
}

/// UTF-16 units needed for UTF-8 input
pub fn utf16_length_from_utf8(input: &[u8]) -> usize {
    input
        .iter()
        .map(|&byte| usize::from(!is_continuation(byte)) + usize::from(byte >= 0xF0))
        .sum()
}

/// UTF-32 units needed for UTF-8 input
pub fn utf32_length_from_utf8(input: &[u8]) -> usize {
    count_utf8(input)
}

/// Latin-1 bytes needed for UTF-8 input
pub fn latin1_length_from_utf8(input: &[u8]) -> usize {
    count_utf8(input)
}

fn utf8_bytes_for_utf16<E: ByteOrder>(input: &[u16]) -> usize {
    input
        .iter()
        .map(|&unit| match E::read(unit) {
            0..=0x7F => 1,
            0x80..=0x7FF => 2,
            // each half of a pair accounts for two of its four bytes
            0xD800..=0xDFFF => 2,
            _ => 3,
        })
        .sum()
}

/// UTF-8 bytes needed for native UTF-16 input
pub fn utf8_length_from_utf16(input: &[u16]) -> usize {
    utf8_bytes_for_utf16::<NativeEndian>(input)
}

/// UTF-8 bytes needed for UTF-16LE input
pub fn utf8_length_from_utf16le(input: &[u16]) -> usize {
    utf8_bytes_for_utf16::<LittleEndian>(input)
}

/// UTF-8 bytes needed for UTF-16BE input
pub fn utf8_length_from_utf16be(input: &[u16]) -> usize {
    utf8_bytes_for_utf16::<BigEndian>(input)
}

/// UTF-32 units needed for native UTF-16 input
pub fn utf32_length_from_utf16(input: &[u16]) -> usize {
    count_utf16(input)
}

/// UTF-32 units needed for UTF-16LE input
pub fn utf32_length_from_utf16le(input: &[u16]) -> usize {
    count_utf16le(input)
}

/// UTF-32 units needed for UTF-16BE input
pub fn utf32_length_from_utf16be(input: &[u16]) -> usize {
    count_utf16be(input)
}

/// Latin-1 bytes needed for UTF-16 input of any byte order
pub fn latin1_length_from_utf16(input: &[u16]) -> usize {
    input.len()
}

/// UTF-8 bytes needed for UTF-32 input
pub fn utf8_length_from_utf32(input: &[u32]) -> usize {
    input.iter().map(|&unit| utf8_len(unit)).sum()
}

/// UTF-16 units needed for UTF-32 input
pub fn utf16_length_from_utf32(input: &[u32]) -> usize {
    input
        .iter()
        .map(|&unit| 1 + usize::from(unit > 0xFFFF))
        .sum()
}

/// Latin-1 bytes needed for UTF-32 input
pub fn latin1_length_from_utf32(input: &[u32]) -> usize {
    input.len()
}

/// UTF-8 bytes needed for Latin-1 input
pub fn utf8_length_from_latin1(input: &[u8]) -> usize {
    input.len() + input.iter().filter(|&&byte| byte >= 0x80).count()
}

/// UTF-16 units needed for Latin-1 input
pub fn utf16_length_from_latin1(input: &[u8]) -> usize {
    input.len()
}

/// UTF-32 units needed for Latin-1 input
pub fn utf32_length_from_latin1(input: &[u8]) -> usize {
    input.len()
}

/// Length of the longest prefix of UTF-8 input that does not end inside a
/// code point.
///
/// Use it to split a buffer before converting it in pieces: up to three
/// trailing bytes of a truncated sequence are left out.
pub fn trim_partial_utf8(input: &[u8]) -> usize {
    trailing_incomplete_utf8(input).unwrap_or(input.len())
}

fn trim_partial_units<E: ByteOrder>(input: &[u16]) -> usize {
    let ends_on_high = input
        .last()
        .is_some_and(|&unit| classify_utf16(E::read(unit)) == Utf16Class::HighSurrogate);
    input.len() - usize::from(ends_on_high)
}

/// Length of native UTF-16 input without a trailing high surrogate
pub fn trim_partial_utf16(input: &[u16]) -> usize {
    trim_partial_units::<NativeEndian>(input)
}

/// Length of UTF-16LE input without a trailing high surrogate
pub fn trim_partial_utf16le(input: &[u16]) -> usize {
    trim_partial_units::<LittleEndian>(input)
}

/// Length of UTF-16BE input without a trailing high surrogate
pub fn trim_partial_utf16be(input: &[u16]) -> usize {
    trim_partial_units::<BigEndian>(input)
}
