//! Structural validation over fixed-size windows
//!
//! A window holds at most [`WINDOW`] units, so every per-unit property fits in
//! one bit of a `u64`. The UTF-8 check predicts where continuation bytes must
//! appear by shifting the lead masks and compares the prediction with the
//! bytes actually present; UTF-16 does the same with one-unit lookahead.
//!
//! A window always starts on a sequence boundary. A multi-unit sequence that
//! runs past the end of a window which is not the end of the input is
//! deferred: the scan reports fewer consumed units and the pipeline presents
//! those (at most 3) units again at the front of the next window.

use crate::ErrorKind;
use crate::classify::{
    Utf8Class, Utf16Class, Utf32Class, classify_utf8, classify_utf16, classify_utf32,
    is_continuation,
};
use crate::units::ByteOrder;

/// Units examined together
pub(crate) const WINDOW: usize = 64;

/// First structural violation inside a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Violation {
    pub kind: ErrorKind,
    /// Offset from the start of the window
    pub offset: usize,
    /// The sequence at `offset` was cut off by the end of the input
    pub incomplete: bool,
}

impl Violation {
    fn at(kind: ErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            incomplete: false,
        }
    }
}

/// Outcome of scanning one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowScan {
    /// The first `consumed` units form complete, legal sequences
    Clean { consumed: usize },
    /// Units before `offset` are legal; the one at `offset` is not
    Violation(Violation),
}

#[inline]
fn prefix_mask(len: usize) -> u64 {
    if len >= 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

/// Keep the earliest violation. At equal offsets a truncated sequence wins
/// over a range error on the same lead.
fn keep_first(slot: &mut Option<Violation>, candidate: Violation) {
    let replace = match slot {
        None => true,
        Some(current) => {
            candidate.offset < current.offset
                || (candidate.offset == current.offset && candidate.kind == ErrorKind::TooShort)
        }
    };
    if replace {
        *slot = Some(candidate);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Utf8Masks {
    cont: u64,
    lead2: u64,
    lead3: u64,
    lead4: u64,
    header: u64,
    /// Leads whose second byte needs a range check
    special: u64,
}

impl Utf8Masks {
    fn build(window: &[u8]) -> Self {
        let mut masks = Self::default();
        for (i, &byte) in window.iter().enumerate() {
            let bit = 1u64 << i;
            match classify_utf8(byte) {
                Utf8Class::Ascii => {}
                Utf8Class::Continuation => masks.cont |= bit,
                Utf8Class::Lead2 => masks.lead2 |= bit,
                Utf8Class::Lead3 => masks.lead3 |= bit,
                Utf8Class::Lead4 => masks.lead4 |= bit,
                Utf8Class::InvalidLead => masks.header |= bit,
            }
            if matches!(byte, 0xC0 | 0xC1 | 0xE0 | 0xED | 0xF0 | 0xF4..=0xF7) {
                masks.special |= bit;
            }
        }
        masks
    }

    /// Positions that must hold a continuation byte
    fn expected_continuations(&self) -> u64 {
        let second = self.lead2 | self.lead3 | self.lead4;
        let third = self.lead3 | self.lead4;
        (second << 1) | (third << 2) | (self.lead4 << 3)
    }
}

/// Overlong, surrogate and out-of-range checks on a lead and its second byte
#[inline]
fn range_violation(lead: u8, second: u8) -> Option<ErrorKind> {
    match lead {
        0xC0 | 0xC1 => Some(ErrorKind::Overlong),
        0xE0 if second < 0xA0 => Some(ErrorKind::Overlong),
        0xED if second >= 0xA0 => Some(ErrorKind::Surrogate),
        0xF0 if second < 0x90 => Some(ErrorKind::Overlong),
        0xF4 if second >= 0x90 => Some(ErrorKind::TooLarge),
        0xF5..=0xF7 => Some(ErrorKind::TooLarge),
        _ => None,
    }
}

/// Lead of the last sequence if it needs more bytes than the window holds
pub(crate) fn trailing_incomplete_utf8(window: &[u8]) -> Option<usize> {
    let len = window.len();
    for back in 1..=len.min(3) {
        let at = len - back;
        let class = classify_utf8(window[at]);
        if class == Utf8Class::Continuation {
            continue;
        }
        return (class.is_lead() && at + class.sequence_len() > len).then_some(at);
    }
    None
}

/// Nearest byte before `at` that is not a continuation byte
fn lead_before(window: &[u8], at: usize) -> usize {
    (0..at).rev().find(|&i| !is_continuation(window[i])).unwrap_or(0)
}

pub(crate) fn scan_utf8_window(window: &[u8], end_of_input: bool) -> WindowScan {
    debug_assert!(window.len() <= WINDOW);
    let len = window.len();
    let masks = Utf8Masks::build(window);
    let deferred = trailing_incomplete_utf8(window);
    let limit = deferred.unwrap_or(len);
    // The deferred lead is still inspected: an earlier lead may expect a
    // continuation in its place.
    let region = prefix_mask((limit + 1).min(len));

    let expected = masks.expected_continuations();
    let stray = masks.cont & !expected & region;
    let missing = expected & !masks.cont & region;
    let header = masks.header & region;

    let mut first = None;
    if stray != 0 {
        let at = stray.trailing_zeros() as usize;
        keep_first(&mut first, Violation::at(ErrorKind::TooLong, at));
    }
    if header != 0 {
        let at = header.trailing_zeros() as usize;
        keep_first(&mut first, Violation::at(ErrorKind::HeaderBits, at));
    }
    if missing != 0 {
        let lead = lead_before(window, missing.trailing_zeros() as usize);
        keep_first(&mut first, Violation::at(ErrorKind::TooShort, lead));
    }

    let mut special = masks.special & prefix_mask(limit);
    while special != 0 {
        let at = special.trailing_zeros() as usize;
        special &= special - 1;
        let Some(&second) = window.get(at + 1) else {
            continue;
        };
        if !is_continuation(second) {
            continue;
        }
        if let Some(kind) = range_violation(window[at], second) {
            keep_first(&mut first, Violation::at(kind, at));
            break;
        }
    }

    if let Some(violation) = first {
        return WindowScan::Violation(violation);
    }
    match deferred {
        Some(at) if end_of_input => WindowScan::Violation(Violation {
            kind: ErrorKind::TooShort,
            offset: at,
            incomplete: true,
        }),
        Some(at) => WindowScan::Clean { consumed: at },
        None => WindowScan::Clean { consumed: len },
    }
}

pub(crate) fn scan_utf16_window<E: ByteOrder>(window: &[u16], end_of_input: bool) -> WindowScan {
    debug_assert!(window.len() <= WINDOW);
    let len = window.len();
    let mut high = 0u64;
    let mut low = 0u64;
    for (i, &unit) in window.iter().enumerate() {
        match classify_utf16(E::read(unit)) {
            Utf16Class::Plain => {}
            Utf16Class::HighSurrogate => high |= 1u64 << i,
            Utf16Class::LowSurrogate => low |= 1u64 << i,
        }
    }

    let expected_low = (high << 1) & prefix_mask(len);
    // bit i set: the high surrogate at i - 1 is not followed by a low one
    let unpaired_high = expected_low & !low;
    let unpaired_low = low & !expected_low;

    let mut first = None;
    if unpaired_high != 0 {
        let at = unpaired_high.trailing_zeros() as usize - 1;
        keep_first(&mut first, Violation::at(ErrorKind::Surrogate, at));
    }
    if unpaired_low != 0 {
        let at = unpaired_low.trailing_zeros() as usize;
        keep_first(&mut first, Violation::at(ErrorKind::Surrogate, at));
    }
    if let Some(violation) = first {
        return WindowScan::Violation(violation);
    }

    if len > 0 && (high >> (len - 1)) & 1 == 1 {
        if end_of_input {
            return WindowScan::Violation(Violation {
                kind: ErrorKind::Surrogate,
                offset: len - 1,
                incomplete: true,
            });
        }
        return WindowScan::Clean { consumed: len - 1 };
    }
    WindowScan::Clean { consumed: len }
}

pub(crate) fn scan_utf32_window(window: &[u32]) -> WindowScan {
    debug_assert!(window.len() <= WINDOW);
    let mut too_large = 0u64;
    let mut surrogate = 0u64;
    for (i, &unit) in window.iter().enumerate() {
        match classify_utf32(unit) {
            Utf32Class::Plain => {}
            Utf32Class::Surrogate => surrogate |= 1u64 << i,
            Utf32Class::OutOfRange => too_large |= 1u64 << i,
        }
    }
    let mut first = None;
    if too_large != 0 {
        let at = too_large.trailing_zeros() as usize;
        keep_first(&mut first, Violation::at(ErrorKind::TooLarge, at));
    }
    if surrogate != 0 {
        let at = surrogate.trailing_zeros() as usize;
        keep_first(&mut first, Violation::at(ErrorKind::Surrogate, at));
    }
    match first {
        Some(violation) => WindowScan::Violation(violation),
        None => WindowScan::Clean {
            consumed: window.len(),
        },
    }
}

pub(crate) fn scan_ascii_window(window: &[u8]) -> WindowScan {
    match window.iter().position(|&byte| byte >= 0x80) {
        Some(offset) => WindowScan::Violation(Violation::at(ErrorKind::TooLarge, offset)),
        None => WindowScan::Clean {
            consumed: window.len(),
        },
    }
}

const ASCII_MASK: u64 = 0x8080_8080_8080_8080;

/// Whether every byte is below 0x80, eight bytes at a time
#[inline]
pub(crate) fn bytes_are_ascii(window: &[u8]) -> bool {
    let mut words = window.chunks_exact(8);
    let mut seen = 0u64;
    for word in &mut words {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(word);
        seen |= u64::from_ne_bytes(bytes);
    }
    seen & ASCII_MASK == 0 && words.remainder().iter().all(|&byte| byte < 0x80)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{BigEndian, LittleEndian};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn violation(kind: ErrorKind, offset: usize) -> WindowScan {
        WindowScan::Violation(Violation::at(kind, offset))
    }

    #[test_case(b"a\xC3\xB1b", 4 ; "two byte sequence")]
    #[test_case(b"\xE2\x82\xAC", 3 ; "euro sign")]
    #[test_case(b"\xF0\x9F\x98\x80", 4 ; "emoji")]
    #[test_case(b"\xEF\xBF\xBF\xF4\x8F\xBF\xBF", 7 ; "boundary code points")]
    #[test_case(b"", 0 ; "empty")]
    fn test_clean_utf8(input: &[u8], consumed: usize) {
        let scan = scan_utf8_window(input, true);
        assert_eq!(scan, WindowScan::Clean { consumed });
    }

    #[test_case(b"\x80", ErrorKind::TooLong, 0 ; "lone continuation")]
    #[test_case(b"a\xC3\xB1\xB1", ErrorKind::TooLong, 3 ; "extra continuation")]
    #[test_case(b"ab\xF8", ErrorKind::HeaderBits, 2 ; "five byte header")]
    #[test_case(b"\xC3a", ErrorKind::TooShort, 0 ; "missing continuation")]
    #[test_case(b"x\xE2\x82a", ErrorKind::TooShort, 1 ; "three byte cut short")]
    #[test_case(b"\xE0\x80a", ErrorKind::TooShort, 0 ; "truncation beats overlong")]
    #[test_case(b"\xC0\x80", ErrorKind::Overlong, 0 ; "overlong nul")]
    #[test_case(b"\xE0\x9F\xBF", ErrorKind::Overlong, 0 ; "overlong three byte")]
    #[test_case(b"\xF0\x8F\xBF\xBF", ErrorKind::Overlong, 0 ; "overlong four byte")]
    #[test_case(b"\xED\xA0\x80", ErrorKind::Surrogate, 0 ; "encoded surrogate")]
    #[test_case(b"\xF4\x90\x80\x80", ErrorKind::TooLarge, 0 ; "above max")]
    #[test_case(b"\xF5\x80\x80\x80", ErrorKind::TooLarge, 0 ; "lead above f4")]
    #[test_case(b"ok\xC0\x80\x80", ErrorKind::Overlong, 2 ; "lowest offset wins")]
    fn test_utf8_violations(input: &[u8], kind: ErrorKind, offset: usize) {
        assert_eq!(scan_utf8_window(input, true), violation(kind, offset));
    }

    #[test]
    fn test_incomplete_at_end_of_input() {
        let scan = scan_utf8_window(b"ab\xF0\x9F\x98", true);
        assert_eq!(
            scan,
            WindowScan::Violation(Violation {
                kind: ErrorKind::TooShort,
                offset: 2,
                incomplete: true,
            })
        );
    }

    #[test]
    fn test_straddling_sequence_is_deferred() {
        let mut window = vec![b'a'; WINDOW - 2];
        window.extend_from_slice(&[0xE2, 0x82]);
        let consumed = WINDOW - 2;
        let scan = scan_utf8_window(&window, false);
        assert_eq!(scan, WindowScan::Clean { consumed });
    }

    #[test]
    fn test_error_before_deferred_lead_is_reported() {
        let mut window = vec![b'a'; WINDOW - 3];
        window.extend_from_slice(&[0xF0, 0x9F, 0xE2]);
        let scan = scan_utf8_window(&window, false);
        assert_eq!(scan, violation(ErrorKind::TooShort, WINDOW - 3));
    }

    #[test]
    fn test_utf16_pairs() {
        let le = [0xD83Du16.to_le(), 0xDE00u16.to_le(), 0x0041u16.to_le()];
        let scan = scan_utf16_window::<LittleEndian>(&le, true);
        assert_eq!(scan, WindowScan::Clean { consumed: 3 });
        let be = [0xD83Du16.to_be(), 0xDE00u16.to_be()];
        let scan = scan_utf16_window::<BigEndian>(&be, true);
        assert_eq!(scan, WindowScan::Clean { consumed: 2 });
    }

    #[test]
    fn test_utf16_lone_surrogates() {
        let lone_high = [0xD800u16.to_le(), u16::from(b'x').to_le()];
        assert_eq!(
            scan_utf16_window::<LittleEndian>(&lone_high, true),
            violation(ErrorKind::Surrogate, 0)
        );
        let lone_low = [0x41u16.to_le(), 0xDC00u16.to_le()];
        assert_eq!(
            scan_utf16_window::<LittleEndian>(&lone_low, true),
            violation(ErrorKind::Surrogate, 1)
        );
        let double_high = [0xD800u16.to_le(), 0xD801u16.to_le(), 0xDC00u16.to_le()];
        assert_eq!(
            scan_utf16_window::<LittleEndian>(&double_high, true),
            violation(ErrorKind::Surrogate, 0)
        );
    }

    #[test]
    fn test_utf16_high_surrogate_at_window_end() {
        let units = [0x41u16.to_le(), 0xD83Du16.to_le()];
        let scan = scan_utf16_window::<LittleEndian>(&units, false);
        assert_eq!(scan, WindowScan::Clean { consumed: 1 });
        assert_eq!(
            scan_utf16_window::<LittleEndian>(&units, true),
            WindowScan::Violation(Violation {
                kind: ErrorKind::Surrogate,
                offset: 1,
                incomplete: true,
            })
        );
    }

    #[test]
    fn test_utf32_ranges() {
        let clean = WindowScan::Clean { consumed: 2 };
        assert_eq!(scan_utf32_window(&[0x41, 0x10FFFF]), clean);
        let surrogate = violation(ErrorKind::Surrogate, 1);
        assert_eq!(scan_utf32_window(&[0x41, 0xDFFF, 0x110000]), surrogate);
        let too_large = violation(ErrorKind::TooLarge, 0);
        assert_eq!(scan_utf32_window(&[0x110000, 0xD800]), too_large);
    }

    #[test]
    fn test_ascii() {
        let plain = b"plain text that spans more than eight bytes";
        let accented = b"plain text that spans more than \xC3\xA9ight bytes";
        assert!(bytes_are_ascii(plain));
        assert!(!bytes_are_ascii(accented));
        assert!(!bytes_are_ascii(b"abc\x80"));
        let scan = scan_ascii_window(b"ab\xFF");
        assert_eq!(scan, violation(ErrorKind::TooLarge, 2));
    }
}
