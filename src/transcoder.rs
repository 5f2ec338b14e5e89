//! Byte-oriented conversion between [`Encoding`] labels
//!
//! The [`Transcoder`] packs a byte buffer into the code units of its source
//! encoding, runs the block pipeline and unpacks the result. Error positions
//! and `written` counts it reports are in bytes.

use std::cmp::max;

use crate::assemble::{Latin1Sink, Sink, Utf8Sink, Utf16Sink, Utf32Sink};
use crate::pipeline::{
    self, BlockPipeline, Latin1Source, Source, Utf8Source, Utf16Source, Utf32Source,
};
use crate::units::{BigEndian, CodeUnit, LittleEndian, pack, unpack, whole_units_len};
use crate::{Encoding, Error, ErrorKind, Result, TranscodeError};

/// Default chunk size of a [`StreamingTranscoder`]
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Smallest chunk that always holds a whole code point
const MIN_BUFFER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Stop at the first error
    Strict,
    /// Replace each error and keep going
    Lossy,
}

/// Output of one pass, with the error that ended it in strict mode
#[derive(Debug)]
struct Outcome {
    output: Vec<u8>,
    error: Option<TranscodeError>,
}

/// Converts byte buffers from one encoding to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    from: Encoding,
    to: Encoding,
}

impl Transcoder {
    /// Create a transcoder; every pair of supported encodings is allowed.
    pub fn new(from: Encoding, to: Encoding) -> Self {
        Self { from, to }
    }

    /// Source encoding
    pub fn from_encoding(&self) -> Encoding {
        self.from
    }

    /// Target encoding
    pub fn to_encoding(&self) -> Encoding {
        self.to
    }

    /// Convert the whole input, failing on the first malformed unit or the
    /// first code point the target cannot represent.
    ///
    /// A UTF-16 or UTF-32 input whose length is not a whole number of code
    /// units is rejected with [`Error::InvalidInput`].
    pub fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.check_unit_alignment(input)?;
        let outcome = self.transcode(input, Mode::Strict);
        match outcome.error {
            None => Ok(outcome.output),
            Some(err) => {
                tracing::debug!(
                    message = "Conversion failed",
                    from = %self.from,
                    to = %self.to,
                    kind = %err.kind,
                    position = err.position
                );
                Err(Error::Transcode(err))
            }
        }
    }

    /// Convert the whole input, replacing every malformed unit and every
    /// unrepresentable code point.
    ///
    /// The replacement is U+FFFD, or `?` when the target is Latin-1. A
    /// malformed unit is skipped on its own; an unrepresentable code point
    /// is skipped whole. A trailing partial code unit becomes one more
    /// replacement.
    pub fn convert_lossy(&self, input: &[u8]) -> Vec<u8> {
        let whole = whole_units_len(input, self.from.unit_width());
        let mut outcome = self.transcode(&input[..whole], Mode::Lossy);
        if whole < input.len() {
            outcome.output.extend_from_slice(&self.replacement());
        }
        outcome.output
    }

    /// Check that the input is well formed in the source encoding
    pub fn validate(&self, input: &[u8]) -> Result<()> {
        self.check_unit_alignment(input)?;
        let result = match self.from {
            Encoding::UTF8 => validate_bytes::<Utf8Source>(input),
            Encoding::UTF16LE => validate_bytes::<Utf16Source<LittleEndian>>(input),
            Encoding::UTF16BE => validate_bytes::<Utf16Source<BigEndian>>(input),
            Encoding::UTF32 => validate_bytes::<Utf32Source>(input),
            Encoding::LATIN1 => Ok(()),
        };
        result.map_err(Error::Transcode)
    }

    fn check_unit_alignment(&self, input: &[u8]) -> Result<()> {
        let width = self.from.unit_width();
        if input.len() % width != 0 {
            return Err(Error::InvalidInput(format!(
                "{} data must have a length divisible by {}",
                self.from, width
            )));
        }
        Ok(())
    }

    fn replacement(&self) -> Vec<u8> {
        // Lossy conversion of a lone U+FFFD never fails
        let utf8 = Transcoder::new(Encoding::UTF8, self.to);
        utf8.transcode("\u{FFFD}".as_bytes(), Mode::Lossy).output
    }

    /// Run a pass over whole code units
    fn transcode(&self, input: &[u8], mode: Mode) -> Outcome {
        match self.from {
            Encoding::UTF8 => self.transcode_from::<Utf8Source>(input, mode),
            Encoding::UTF16LE => self.transcode_from::<Utf16Source<LittleEndian>>(input, mode),
            Encoding::UTF16BE => self.transcode_from::<Utf16Source<BigEndian>>(input, mode),
            Encoding::UTF32 => self.transcode_from::<Utf32Source>(input, mode),
            Encoding::LATIN1 => self.transcode_from::<Latin1Source>(input, mode),
        }
    }

    fn transcode_from<S: Source>(&self, input: &[u8], mode: Mode) -> Outcome {
        let units: Vec<S::Unit> = pack(input);
        let capacity = self.from.max_output_units(self.to, units.len());
        match self.to {
            Encoding::UTF8 => transcode_pair::<S, Utf8Sink>(&units, capacity, mode),
            Encoding::UTF16LE => {
                transcode_pair::<S, Utf16Sink<LittleEndian>>(&units, capacity, mode)
            }
            Encoding::UTF16BE => transcode_pair::<S, Utf16Sink<BigEndian>>(&units, capacity, mode),
            Encoding::UTF32 => transcode_pair::<S, Utf32Sink>(&units, capacity, mode),
            Encoding::LATIN1 => transcode_pair::<S, Latin1Sink>(&units, capacity, mode),
        }
    }
}

fn validate_bytes<S: Source>(input: &[u8]) -> std::result::Result<(), TranscodeError> {
    let units: Vec<S::Unit> = pack(input);
    pipeline::validate::<S>(&units).map_err(|err| TranscodeError {
        position: err.position * S::Unit::WIDTH,
        ..err
    })
}

fn transcode_pair<S: Source, D: Sink>(units: &[S::Unit], capacity: usize, mode: Mode) -> Outcome {
    let mut out = vec![D::Unit::default(); capacity];
    let mut read = 0;
    let mut written = 0;
    let mut replaced = 0usize;
    let error = loop {
        let err = match BlockPipeline::<S, D>::new(&units[read..], &mut out[written..]).run() {
            Ok(converted) => {
                written += converted.written;
                break None;
            }
            Err(err) => err,
        };
        written += err.written;
        let at = read + err.position;
        if err.kind == ErrorKind::OutputBufferTooSmall {
            // Replacements may outgrow the estimate
            out.resize(max(out.len() * 2, out.len() + 4), D::Unit::default());
            read = at;
            continue;
        }
        if mode == Mode::Strict {
            break Some(TranscodeError {
                position: at * S::Unit::WIDTH,
                written: written * D::Unit::WIDTH,
                ..err
            });
        }
        if out.len() < written + 4 {
            out.resize(out.len() + 4, D::Unit::default());
        }
        written += encode_replacement::<D>(&mut out[written..]);
        read = at + skip_len::<S>(units, at);
        replaced += 1;
    };
    if replaced > 0 {
        tracing::debug!(message = "Replaced malformed input", count = replaced);
    }
    out.truncate(written);
    Outcome {
        output: unpack(&out),
        error,
    }
}

fn encode_replacement<D: Sink>(out: &mut [D::Unit]) -> usize {
    D::encode(0xFFFD, out)
        .or_else(|_| D::encode(u32::from(b'?'), out))
        .unwrap_or(0)
}

/// Units to skip past a failure at `at`: a whole code point that the target
/// could not represent, or the single unit that broke the source.
fn skip_len<S: Source>(units: &[S::Unit], at: usize) -> usize {
    let (_, len) = S::decode(units, at);
    match units.get(at..at + len) {
        Some(sequence) if pipeline::validate::<S>(sequence).is_ok() => len,
        _ => 1,
    }
}

/// Converts a stream delivered in arbitrary chunks.
///
/// A code point split across two chunks is held back and completed by the
/// next call; [`StreamingTranscoder::finish`] reports anything still held.
#[derive(Debug)]
pub struct StreamingTranscoder {
    transcoder: Transcoder,
    pending: Vec<u8>,
    buffer_size: usize,
    stream_offset: usize,
}

impl StreamingTranscoder {
    /// Create a streaming transcoder converting at most `buffer_size` input
    /// bytes per pass. Sizes below 4 are raised to 4.
    pub fn new(from: Encoding, to: Encoding, buffer_size: usize) -> Self {
        Self {
            transcoder: Transcoder::new(from, to),
            pending: Vec::new(),
            buffer_size: max(buffer_size, MIN_BUFFER_SIZE),
            stream_offset: 0,
        }
    }

    /// Create a streaming transcoder with a 64 KiB buffer
    pub fn with_default_buffer(from: Encoding, to: Encoding) -> Self {
        Self::new(from, to, DEFAULT_BUFFER_SIZE)
    }

    /// The underlying one-shot transcoder
    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    /// Bytes held back from earlier chunks
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Convert the next chunk of the stream.
    ///
    /// Error positions are byte offsets from the start of the stream, and
    /// `written` counts the bytes this call had produced before the failure.
    pub fn process_chunk(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(input);

        let width = self.transcoder.from.unit_width();
        let mut output = Vec::with_capacity(data.len());
        let mut start = 0;
        loop {
            let end = (start + self.buffer_size).min(data.len());
            let piece = &data[start..end];
            let whole = whole_units_len(piece, width);
            let outcome = self.transcoder.transcode(&piece[..whole], Mode::Strict);
            output.extend_from_slice(&outcome.output);
            start += match outcome.error {
                None => whole,
                Some(err) if err.incomplete => err.position,
                Some(err) => {
                    let err = TranscodeError {
                        position: self.stream_offset + start + err.position,
                        written: output.len(),
                        ..err
                    };
                    tracing::debug!(
                        message = "Stream conversion failed",
                        kind = %err.kind,
                        position = err.position
                    );
                    self.stream_offset += data.len();
                    return Err(Error::Transcode(err));
                }
            };
            if end == data.len() {
                break;
            }
        }

        self.stream_offset += start;
        self.pending = data.split_off(start);
        if !self.pending.is_empty() {
            tracing::debug!(
                message = "Carrying incomplete input",
                bytes = self.pending.len()
            );
        }
        Ok(output)
    }

    /// End the stream, failing if an incomplete code point is still held
    pub fn finish(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let err = TranscodeError {
            kind: ErrorKind::TooShort,
            position: self.stream_offset,
            written: 0,
            incomplete: true,
        };
        tracing::debug!(
            message = "Stream ended inside a code point",
            bytes = self.pending.len()
        );
        self.stream_offset += self.pending.len();
        self.pending.clear();
        Err(Error::Transcode(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    const TEXT: &str = "Hello, wörld! € 中文 😀";

    fn encode(text: &str, encoding: Encoding) -> Vec<u8> {
        match encoding {
            Encoding::UTF8 => text.as_bytes().to_vec(),
            Encoding::UTF16LE => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::UTF16BE => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Encoding::UTF32 => text
                .chars()
                .flat_map(|c| u32::from(c).to_le_bytes())
                .collect(),
            Encoding::LATIN1 => text.chars().map(|c| c as u8).collect(),
        }
    }

    #[test]
    fn test_every_unicode_pair_round_trips() {
        let unicode = [
            Encoding::UTF8,
            Encoding::UTF16LE,
            Encoding::UTF16BE,
            Encoding::UTF32,
        ];
        for from in unicode {
            for to in unicode {
                let transcoder = Transcoder::new(from, to);
                let output = transcoder.convert(&encode(TEXT, from)).unwrap();
                assert_eq!(output, encode(TEXT, to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_latin1_pairs() {
        let text = "café ÿ";
        for other in Encoding::ALL {
            let forward = Transcoder::new(Encoding::LATIN1, other);
            let output = forward.convert(&encode(text, Encoding::LATIN1)).unwrap();
            assert_eq!(output, encode(text, other), "Latin-1 -> {}", other);

            let backward = Transcoder::new(other, Encoding::LATIN1);
            let latin1 = backward.convert(&output).unwrap();
            assert_eq!(latin1, encode(text, Encoding::LATIN1));
        }
    }

    #[test]
    fn test_utf16_endianness_conversion() {
        let le_to_be = Transcoder::new(Encoding::UTF16LE, Encoding::UTF16BE);
        let be_output = le_to_be.convert(&[0x48, 0x00, 0x69, 0x00]).unwrap();
        assert_eq!(be_output, [0x00, 0x48, 0x00, 0x69]);
    }

    #[test]
    fn test_error_positions_are_in_bytes() {
        let transcoder = Transcoder::new(Encoding::UTF16LE, Encoding::UTF8);
        // "ab" then a lone low surrogate
        let input = [0x61, 0x00, 0x62, 0x00, 0x00, 0xDC];
        let err = transcoder.convert(&input).unwrap_err();
        assert_eq!(
            err,
            Error::Transcode(TranscodeError {
                kind: ErrorKind::Surrogate,
                position: 4,
                written: 2,
                incomplete: false,
            })
        );

        let transcoder = Transcoder::new(Encoding::UTF8, Encoding::UTF32);
        let Error::Transcode(err) = transcoder.convert(b"ab\xC3").unwrap_err() else {
            panic!("expected a transcode error");
        };
        assert_eq!((err.position, err.written, err.incomplete), (2, 8, true));
    }

    #[test_case(Encoding::UTF16LE, &[0x61, 0x00, 0x62])]
    #[test_case(Encoding::UTF32, &[0x61, 0x00, 0x00])]
    fn test_partial_units_are_invalid_input(from: Encoding, input: &[u8]) {
        let transcoder = Transcoder::new(from, Encoding::UTF8);
        let converted = transcoder.convert(input);
        assert!(matches!(converted, Err(Error::InvalidInput(_))));
        let validated = transcoder.validate(input);
        assert!(matches!(validated, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unrepresentable_in_latin1() {
        let transcoder = Transcoder::new(Encoding::UTF8, Encoding::LATIN1);
        let Error::Transcode(err) = transcoder.convert("a€b".as_bytes()).unwrap_err() else {
            panic!("expected a transcode error");
        };
        assert_eq!(
            (err.kind, err.position, err.written),
            (ErrorKind::TooLarge, 1, 1)
        );
        assert_eq!(transcoder.convert_lossy("a€b".as_bytes()), b"a?b");
    }

    #[test]
    fn test_lossy_replaces_each_bad_unit() {
        let transcoder = Transcoder::new(Encoding::UTF8, Encoding::UTF8);
        assert_eq!(
            transcoder.convert_lossy(b"a\x80b\xED\xA0\x80c\xF0\x9F"),
            "a\u{FFFD}b\u{FFFD}\u{FFFD}\u{FFFD}c\u{FFFD}\u{FFFD}".as_bytes()
        );

        let transcoder = Transcoder::new(Encoding::UTF16LE, Encoding::UTF16LE);
        let output = transcoder.convert_lossy(&[0x00, 0xD8, 0x41, 0x00, 0x42]);
        assert_eq!(output, [0xFD, 0xFF, 0x41, 0x00, 0xFD, 0xFF]);
    }

    #[test]
    fn test_lossy_grows_past_the_estimate() {
        let transcoder = Transcoder::new(Encoding::UTF8, Encoding::UTF8);
        let input = vec![0x80u8; 300];
        let output = transcoder.convert_lossy(&input);
        assert_eq!(output, "\u{FFFD}".repeat(300).as_bytes());
    }

    #[test]
    fn test_validate() {
        let utf8 = Transcoder::new(Encoding::UTF8, Encoding::UTF16LE);
        assert!(utf8.validate(TEXT.as_bytes()).is_ok());
        let latin1 = Transcoder::new(Encoding::LATIN1, Encoding::UTF8);
        assert!(latin1.validate(&[0xFF, 0x80]).is_ok());
        let err = Transcoder::new(Encoding::UTF32, Encoding::UTF8)
            .validate(&[0x41, 0, 0, 0, 0x00, 0xD8, 0, 0])
            .unwrap_err();
        assert_eq!(
            err,
            Error::Transcode(TranscodeError {
                kind: ErrorKind::Surrogate,
                position: 4,
                written: 0,
                incomplete: false,
            })
        );
    }

    #[test]
    fn test_streaming_carries_split_code_points() {
        let input = encode(TEXT, Encoding::UTF8);
        for split in 0..=input.len() {
            let mut stream = StreamingTranscoder::new(Encoding::UTF8, Encoding::UTF16BE, 64);
            let mut output = stream.process_chunk(&input[..split]).unwrap();
            output.extend(stream.process_chunk(&input[split..]).unwrap());
            stream.finish().unwrap();
            let expected = encode(TEXT, Encoding::UTF16BE);
            assert_eq!(output, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_streaming_odd_utf16_bytes() {
        let input = encode(TEXT, Encoding::UTF16LE);
        let mut stream = StreamingTranscoder::new(Encoding::UTF16LE, Encoding::UTF8, 5);
        let mut output = Vec::new();
        for chunk in input.chunks(3) {
            output.extend(stream.process_chunk(chunk).unwrap());
        }
        stream.finish().unwrap();
        assert_eq!(output, TEXT.as_bytes());
    }

    #[test]
    fn test_streaming_small_buffer() {
        let input = "😀😀😀 ascii".repeat(10);
        let mut stream = StreamingTranscoder::new(Encoding::UTF8, Encoding::UTF32, 1);
        let output = stream.process_chunk(input.as_bytes()).unwrap();
        assert_eq!(output, encode(&input, Encoding::UTF32));
        assert!(stream.pending().is_empty());
    }

    #[test]
    fn test_streaming_finish_reports_leftovers() {
        let mut stream =
            StreamingTranscoder::with_default_buffer(Encoding::UTF8, Encoding::UTF16LE);
        let output = stream.process_chunk(b"ok\xE2\x82").unwrap();
        assert_eq!(output, [0x6F, 0x00, 0x6B, 0x00]);
        assert_eq!(stream.pending(), b"\xE2\x82");
        let err = stream.finish().unwrap_err();
        assert_eq!(
            err,
            Error::Transcode(TranscodeError {
                kind: ErrorKind::TooShort,
                position: 2,
                written: 0,
                incomplete: true,
            })
        );
        assert!(stream.finish().is_ok());
    }

    #[test]
    fn test_streaming_error_position_is_absolute() {
        let mut stream = StreamingTranscoder::with_default_buffer(Encoding::UTF8, Encoding::UTF8);
        stream.process_chunk(b"0123456789").unwrap();
        let err = stream.process_chunk(b"ab\xFF").unwrap_err();
        let Error::Transcode(err) = err else {
            panic!("expected a transcode error");
        };
        assert_eq!(
            (err.kind, err.position, err.written),
            (ErrorKind::HeaderBits, 12, 2)
        );
    }
}
