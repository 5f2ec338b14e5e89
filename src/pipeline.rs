//! Windowed drivers
//!
//! [`BlockPipeline`] walks the input one window at a time. Windows made only
//! of ASCII are widened or narrowed straight into the destination; every
//! other window is classified and validated, then its legal prefix is
//! assembled into the destination. The trusted driver skips validation and
//! the validate-only driver skips assembly.

use std::cmp::min;
use std::marker::PhantomData;

use crate::assemble::{Sink, decode_utf8, decode_utf16};
use crate::units::{ByteOrder, CodeUnit};
use crate::validate::{
    WINDOW, WindowScan, bytes_are_ascii, scan_ascii_window, scan_utf8_window, scan_utf16_window,
    scan_utf32_window,
};
use crate::{Converted, TranscodeError};

/// Source encoding of the pipeline
pub(crate) trait Source {
    type Unit: CodeUnit;

    /// Structural check of one window starting on a sequence boundary
    fn scan(window: &[Self::Unit], end_of_input: bool) -> WindowScan;

    /// Whether every unit of the window is ASCII
    fn is_ascii(window: &[Self::Unit]) -> bool;

    /// The ASCII byte held by a unit that passed [`Source::is_ascii`]
    fn ascii_byte(unit: Self::Unit) -> u8;

    /// Scalar value and length of the sequence starting at `at`
    fn decode(input: &[Self::Unit], at: usize) -> (u32, usize);
}

#[derive(Debug)]
pub(crate) struct Utf8Source;

#[derive(Debug)]
pub(crate) struct Utf16Source<E>(PhantomData<E>);

#[derive(Debug)]
pub(crate) struct Utf32Source;

#[derive(Debug)]
pub(crate) struct Latin1Source;

/// UTF-8 restricted to 0..=0x7F
#[derive(Debug)]
pub(crate) struct AsciiSource;

impl Source for Utf8Source {
    type Unit = u8;

    fn scan(window: &[u8], end_of_input: bool) -> WindowScan {
        scan_utf8_window(window, end_of_input)
    }

    #[inline]
    fn is_ascii(window: &[u8]) -> bool {
        bytes_are_ascii(window)
    }

    #[inline]
    fn ascii_byte(unit: u8) -> u8 {
        unit
    }

    #[inline]
    fn decode(input: &[u8], at: usize) -> (u32, usize) {
        decode_utf8(input, at)
    }
}

impl<E: ByteOrder> Source for Utf16Source<E> {
    type Unit = u16;

    fn scan(window: &[u16], end_of_input: bool) -> WindowScan {
        scan_utf16_window::<E>(window, end_of_input)
    }

    #[inline]
    fn is_ascii(window: &[u16]) -> bool {
        window.iter().all(|&unit| E::read(unit) < 0x80)
    }

    #[inline]
    fn ascii_byte(unit: u16) -> u8 {
        E::read(unit) as u8
    }

    #[inline]
    fn decode(input: &[u16], at: usize) -> (u32, usize) {
        decode_utf16::<E>(input, at)
    }
}

impl Source for Utf32Source {
    type Unit = u32;

    fn scan(window: &[u32], _end_of_input: bool) -> WindowScan {
        scan_utf32_window(window)
    }

    #[inline]
    fn is_ascii(window: &[u32]) -> bool {
        window.iter().all(|&unit| unit < 0x80)
    }

    #[inline]
    fn ascii_byte(unit: u32) -> u8 {
        unit as u8
    }

    #[inline]
    fn decode(input: &[u32], at: usize) -> (u32, usize) {
        (input[at], 1)
    }
}

impl Source for Latin1Source {
    type Unit = u8;

    fn scan(window: &[u8], _end_of_input: bool) -> WindowScan {
        WindowScan::Clean {
            consumed: window.len(),
        }
    }

    #[inline]
    fn is_ascii(window: &[u8]) -> bool {
        bytes_are_ascii(window)
    }

    #[inline]
    fn ascii_byte(unit: u8) -> u8 {
        unit
    }

    #[inline]
    fn decode(input: &[u8], at: usize) -> (u32, usize) {
        (u32::from(input[at]), 1)
    }
}

impl Source for AsciiSource {
    type Unit = u8;

    fn scan(window: &[u8], _end_of_input: bool) -> WindowScan {
        scan_ascii_window(window)
    }

    #[inline]
    fn is_ascii(window: &[u8]) -> bool {
        bytes_are_ascii(window)
    }

    #[inline]
    fn ascii_byte(unit: u8) -> u8 {
        unit
    }

    #[inline]
    fn decode(input: &[u8], at: usize) -> (u32, usize) {
        (u32::from(input[at]), 1)
    }
}

/// Where the pipeline is in its walk over the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    /// About to look at the next window
    Scanning,
    /// The current window is all ASCII
    AsciiFastPath,
    /// The current window needs full validation and assembly
    MixedPath,
    /// The current window reaches the end of the input
    Tail,
    Done,
    Failed(TranscodeError),
}

/// Checked conversion of one buffer
pub(crate) struct BlockPipeline<'a, S: Source, D: Sink> {
    input: &'a [S::Unit],
    output: &'a mut [D::Unit],
    read: usize,
    written: usize,
    window_end: usize,
    stage: Stage,
}

impl<'a, S: Source, D: Sink> BlockPipeline<'a, S, D> {
    pub(crate) fn new(input: &'a [S::Unit], output: &'a mut [D::Unit]) -> Self {
        Self {
            input,
            output,
            read: 0,
            written: 0,
            window_end: 0,
            stage: Stage::Scanning,
        }
    }

    pub(crate) fn run(mut self) -> Result<Converted, TranscodeError> {
        loop {
            self.stage = match self.stage {
                Stage::Scanning => self.enter_window(),
                Stage::AsciiFastPath => self.copy_ascii(),
                Stage::MixedPath => self.process_window(false),
                Stage::Tail => self.process_window(true),
                Stage::Done => {
                    return Ok(Converted {
                        read: self.read,
                        written: self.written,
                    });
                }
                Stage::Failed(error) => return Err(error),
            };
        }
    }

    fn enter_window(&mut self) -> Stage {
        if self.read == self.input.len() {
            return Stage::Done;
        }
        self.window_end = min(self.read + WINDOW, self.input.len());
        let window = &self.input[self.read..self.window_end];
        if S::is_ascii(window) && self.written + window.len() <= self.output.len() {
            Stage::AsciiFastPath
        } else if self.window_end == self.input.len() {
            Stage::Tail
        } else {
            Stage::MixedPath
        }
    }

    fn copy_ascii(&mut self) -> Stage {
        let window = &self.input[self.read..self.window_end];
        let out = &mut self.output[self.written..self.written + window.len()];
        for (slot, &unit) in out.iter_mut().zip(window) {
            *slot = D::from_ascii(S::ascii_byte(unit));
        }
        self.written += window.len();
        self.read = self.window_end;
        Stage::Scanning
    }

    fn process_window(&mut self, end_of_input: bool) -> Stage {
        let window = &self.input[self.read..self.window_end];
        match S::scan(window, end_of_input) {
            WindowScan::Clean { consumed } => {
                debug_assert!(consumed > 0 || end_of_input);
                match self.assemble(self.read + consumed) {
                    Ok(()) => Stage::Scanning,
                    Err(error) => Stage::Failed(error),
                }
            }
            WindowScan::Violation(violation) => {
                let position = self.read + violation.offset;
                if let Err(error) = self.assemble(position) {
                    return Stage::Failed(error);
                }
                Stage::Failed(TranscodeError {
                    kind: violation.kind,
                    position,
                    written: self.written,
                    incomplete: violation.incomplete,
                })
            }
        }
    }

    /// Re-encode validated units up to `until`
    fn assemble(&mut self, until: usize) -> Result<(), TranscodeError> {
        while self.read < until {
            let (code_point, len) = S::decode(self.input, self.read);
            match D::encode(code_point, &mut self.output[self.written..]) {
                Ok(units) => self.written += units,
                Err(kind) => {
                    return Err(TranscodeError {
                        kind,
                        position: self.read,
                        written: self.written,
                        incomplete: false,
                    });
                }
            }
            self.read += len;
        }
        Ok(())
    }
}

/// Structural validation only, nothing is written
pub(crate) fn validate<S: Source>(input: &[S::Unit]) -> Result<(), TranscodeError> {
    let mut read = 0;
    while read < input.len() {
        let end = min(read + WINDOW, input.len());
        let window = &input[read..end];
        if S::is_ascii(window) {
            read = end;
            continue;
        }
        match S::scan(window, end == input.len()) {
            WindowScan::Clean { consumed } => read += consumed,
            WindowScan::Violation(violation) => {
                return Err(TranscodeError {
                    kind: violation.kind,
                    position: read + violation.offset,
                    written: 0,
                    incomplete: violation.incomplete,
                });
            }
        }
    }
    Ok(())
}

/// Conversion of input known to be valid; no validator runs.
///
/// Panics if `output` is too short.
pub(crate) fn convert_valid<S: Source, D: Sink>(
    input: &[S::Unit],
    output: &mut [D::Unit],
) -> usize {
    let mut read = 0;
    let mut written = 0;
    while read < input.len() {
        let end = min(read + WINDOW, input.len());
        let window = &input[read..end];
        if S::is_ascii(window) {
            let out = &mut output[written..written + window.len()];
            for (slot, &unit) in out.iter_mut().zip(window) {
                *slot = D::from_ascii(S::ascii_byte(unit));
            }
            written += window.len();
            read = end;
            continue;
        }
        // A sequence may straddle `end`; the next window starts after it.
        while read < end {
            let (code_point, len) = S::decode(input, read);
            written += D::encode_valid(code_point, &mut output[written..]);
            read += len;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::assemble::{Latin1Sink, Utf8Sink, Utf16Sink, Utf32Sink};
    use crate::units::LittleEndian;
    use pretty_assertions::assert_eq;

    fn utf8_to_utf32(input: &[u8]) -> (Vec<u32>, Result<Converted, TranscodeError>) {
        let mut out = vec![0u32; input.len()];
        let result = BlockPipeline::<Utf8Source, Utf32Sink>::new(input, &mut out).run();
        (out, result)
    }

    #[test]
    fn test_mixed_window() {
        let (out, result) = utf8_to_utf32(b"a\xC3\xB1b");
        assert_eq!(
            result,
            Ok(Converted {
                read: 4,
                written: 3,
            })
        );
        assert_eq!(&out[..3], &[0x61, 0xF1, 0x62]);
    }

    #[test]
    fn test_sequences_straddling_windows() {
        let text = "x".repeat(WINDOW - 1) + &"é€😀".repeat(40);
        let (out, result) = utf8_to_utf32(text.as_bytes());
        let expected: Vec<u32> = text.chars().map(u32::from).collect();
        assert_eq!(result.unwrap().written, expected.len());
        assert_eq!(&out[..expected.len()], expected.as_slice());
    }

    #[test]
    fn test_partial_output_on_failure() {
        let mut input = "ab€".repeat(30).into_bytes();
        let bad = input.len();
        input.extend_from_slice(b"\xC3");
        let (out, result) = utf8_to_utf32(&input);
        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::TooShort);
        assert_eq!(error.position, bad);
        assert!(error.incomplete);
        assert_eq!(error.written, 90);
        assert_eq!(out[89], 0x20AC);
    }

    #[test]
    fn test_destination_range_error_position() {
        let input = "aé€".as_bytes();
        let mut out = [0u8; 8];
        let error = BlockPipeline::<Utf8Source, Latin1Sink>::new(input, &mut out)
            .run()
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::TooLarge);
        assert_eq!(error.position, 3);
        assert_eq!(error.written, 2);
        assert_eq!(&out[..2], &[b'a', 0xE9]);
    }

    #[test]
    fn test_output_too_small() {
        let input = "a".repeat(100);
        let mut out = [0u16; 70];
        let pipeline =
            BlockPipeline::<Utf8Source, Utf16Sink<LittleEndian>>::new(input.as_bytes(), &mut out);
        let error = pipeline.run().unwrap_err();
        assert_eq!(error.kind, ErrorKind::OutputBufferTooSmall);
        assert_eq!(error.position, 70);
        assert_eq!(error.written, 70);
    }

    #[test]
    fn test_validate_matches_pipeline() {
        let inputs: [&[u8]; 5] = [
            b"plain",
            b"\xE2\x82\xAC",
            b"\xED\xA0\x80",
            b"ab\x80",
            b"\xF0\x9F\x98",
        ];
        for input in inputs {
            let (_, converted) = utf8_to_utf32(input);
            match (validate::<Utf8Source>(input), converted) {
                (Ok(()), Ok(_)) => {}
                (Err(a), Err(b)) => {
                    assert_eq!(a.kind, b.kind);
                    assert_eq!(a.position, b.position);
                }
                (a, b) => panic!("disagreement on {input:?}: {a:?} vs {b:?}"),
            }
        }
    }

    #[test]
    fn test_trusted_path_matches_checked() {
        let text = "mixed ascii, Ελληνικά, 中文, 😀 and more ascii ".repeat(5);
        let mut checked = vec![0u8; text.len()];
        let mut trusted = vec![0u8; text.len()];
        let done = BlockPipeline::<Utf8Source, Utf8Sink>::new(text.as_bytes(), &mut checked)
            .run()
            .unwrap();
        let written = convert_valid::<Utf8Source, Utf8Sink>(text.as_bytes(), &mut trusted);
        assert_eq!(done.written, written);
        assert_eq!(checked, trusted);
    }

    #[test]
    fn test_stage_transitions() {
        let input = "a".repeat(WINDOW) + "é";
        let mut out = vec![0u32; input.len()];
        let mut pipeline = BlockPipeline::<Utf8Source, Utf32Sink>::new(input.as_bytes(), &mut out);
        assert_eq!(pipeline.enter_window(), Stage::AsciiFastPath);
        assert_eq!(pipeline.copy_ascii(), Stage::Scanning);
        assert_eq!(pipeline.enter_window(), Stage::Tail);
        assert_eq!(pipeline.process_window(true), Stage::Scanning);
        assert_eq!(pipeline.enter_window(), Stage::Done);
    }
}
