//! Slice conversion and validation entry points
//!
//! Every supported pair gets three functions. `convert_*` answers with the
//! number of units written and 0 on failure, `convert_*_with_errors` also
//! says where and why it failed, and `convert_valid_*` trusts its input and
//! never runs the validator.
//!
//! UTF-16 slices hold units in the byte order named by the function: a
//! `&[u16]` passed to a `utf16be` function is expected to hold big-endian
//! units in memory, as produced by reinterpreting a UTF-16BE byte buffer.
//! The unsuffixed `utf16` functions read and write the host's byte order.

use crate::assemble::{Latin1Sink, Utf8Sink, Utf16Sink, Utf32Sink};
use crate::pipeline::{
    self, AsciiSource, BlockPipeline, Latin1Source, Utf8Source, Utf16Source, Utf32Source,
};
use crate::units::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use crate::{Converted, TranscodeError};

macro_rules! conversions {
    ($(
        $checked:ident, $with_errors:ident, $trusted:ident:
        $src:ty => $dst:ty, [$in:ty] => [$out:ty], $from_label:literal => $to_label:literal;
    )*) => {$(
        #[doc = concat!("Convert ", $from_label, " to ", $to_label, ".")]
        ///
        /// Returns the number of units written, or 0 if the input is not well
        /// formed, holds a code point the destination cannot represent, or
        /// does not fit in `output`.
        pub fn $checked(input: &[$in], output: &mut [$out]) -> usize {
            match $with_errors(input, output) {
                Ok(converted) => converted.written,
                Err(_) => 0,
            }
        }

        #[doc = concat!(
            "Convert ", $from_label, " to ", $to_label, ", reporting the first failure."
        )]
        ///
        /// On failure `output[..err.written]` holds the conversion of the
        /// input before `err.position`.
        pub fn $with_errors(
            input: &[$in],
            output: &mut [$out],
        ) -> Result<Converted, TranscodeError> {
            BlockPipeline::<$src, $dst>::new(input, output).run()
        }

        #[doc = concat!(
            "Convert ", $from_label, " already known to be valid to ", $to_label, "."
        )]
        ///
        /// The input is not validated; malformed input produces unspecified
        /// output.
        ///
        /// # Panics
        ///
        /// Panics if `output` is too short. Size it with
        /// [`Encoding::max_output_units`](crate::Encoding::max_output_units)
        /// or the matching `*_length_from_*` function.
        pub fn $trusted(input: &[$in], output: &mut [$out]) -> usize {
            pipeline::convert_valid::<$src, $dst>(input, output)
        }
    )*};
}

conversions! {
    convert_utf8_to_utf16, convert_utf8_to_utf16_with_errors, convert_valid_utf8_to_utf16:
        Utf8Source => Utf16Sink<NativeEndian>, [u8] => [u16], "UTF-8" => "native UTF-16";
    convert_utf8_to_utf16le, convert_utf8_to_utf16le_with_errors,
    convert_valid_utf8_to_utf16le:
        Utf8Source => Utf16Sink<LittleEndian>, [u8] => [u16], "UTF-8" => "UTF-16LE";
    convert_utf8_to_utf16be, convert_utf8_to_utf16be_with_errors,
    convert_valid_utf8_to_utf16be:
        Utf8Source => Utf16Sink<BigEndian>, [u8] => [u16], "UTF-8" => "UTF-16BE";
    convert_utf8_to_utf32, convert_utf8_to_utf32_with_errors, convert_valid_utf8_to_utf32:
        Utf8Source => Utf32Sink, [u8] => [u32], "UTF-8" => "UTF-32";
    convert_utf8_to_latin1, convert_utf8_to_latin1_with_errors, convert_valid_utf8_to_latin1:
        Utf8Source => Latin1Sink, [u8] => [u8], "UTF-8" => "Latin-1";

    convert_utf16_to_utf8, convert_utf16_to_utf8_with_errors, convert_valid_utf16_to_utf8:
        Utf16Source<NativeEndian> => Utf8Sink, [u16] => [u8], "native UTF-16" => "UTF-8";
    convert_utf16_to_utf32, convert_utf16_to_utf32_with_errors, convert_valid_utf16_to_utf32:
        Utf16Source<NativeEndian> => Utf32Sink, [u16] => [u32], "native UTF-16" => "UTF-32";
    convert_utf16_to_latin1, convert_utf16_to_latin1_with_errors,
    convert_valid_utf16_to_latin1:
        Utf16Source<NativeEndian> => Latin1Sink, [u16] => [u8], "native UTF-16" => "Latin-1";

    convert_utf16le_to_utf8, convert_utf16le_to_utf8_with_errors,
    convert_valid_utf16le_to_utf8:
        Utf16Source<LittleEndian> => Utf8Sink, [u16] => [u8], "UTF-16LE" => "UTF-8";
    convert_utf16le_to_utf32, convert_utf16le_to_utf32_with_errors,
    convert_valid_utf16le_to_utf32:
        Utf16Source<LittleEndian> => Utf32Sink, [u16] => [u32], "UTF-16LE" => "UTF-32";
    convert_utf16le_to_latin1, convert_utf16le_to_latin1_with_errors,
    convert_valid_utf16le_to_latin1:
        Utf16Source<LittleEndian> => Latin1Sink, [u16] => [u8], "UTF-16LE" => "Latin-1";

    convert_utf16be_to_utf8, convert_utf16be_to_utf8_with_errors,
    convert_valid_utf16be_to_utf8:
        Utf16Source<BigEndian> => Utf8Sink, [u16] => [u8], "UTF-16BE" => "UTF-8";
    convert_utf16be_to_utf32, convert_utf16be_to_utf32_with_errors,
    convert_valid_utf16be_to_utf32:
        Utf16Source<BigEndian> => Utf32Sink, [u16] => [u32], "UTF-16BE" => "UTF-32";
    convert_utf16be_to_latin1, convert_utf16be_to_latin1_with_errors,
    convert_valid_utf16be_to_latin1:
        Utf16Source<BigEndian> => Latin1Sink, [u16] => [u8], "UTF-16BE" => "Latin-1";

    convert_utf32_to_utf8, convert_utf32_to_utf8_with_errors, convert_valid_utf32_to_utf8:
        Utf32Source => Utf8Sink, [u32] => [u8], "UTF-32" => "UTF-8";
    convert_utf32_to_utf16, convert_utf32_to_utf16_with_errors, convert_valid_utf32_to_utf16:
        Utf32Source => Utf16Sink<NativeEndian>, [u32] => [u16], "UTF-32" => "native UTF-16";
    convert_utf32_to_utf16le, convert_utf32_to_utf16le_with_errors,
    convert_valid_utf32_to_utf16le:
        Utf32Source => Utf16Sink<LittleEndian>, [u32] => [u16], "UTF-32" => "UTF-16LE";
    convert_utf32_to_utf16be, convert_utf32_to_utf16be_with_errors,
    convert_valid_utf32_to_utf16be:
        Utf32Source => Utf16Sink<BigEndian>, [u32] => [u16], "UTF-32" => "UTF-16BE";
    convert_utf32_to_latin1, convert_utf32_to_latin1_with_errors, convert_valid_utf32_to_latin1:
        Utf32Source => Latin1Sink, [u32] => [u8], "UTF-32" => "Latin-1";

    convert_latin1_to_utf8, convert_latin1_to_utf8_with_errors, convert_valid_latin1_to_utf8:
        Latin1Source => Utf8Sink, [u8] => [u8], "Latin-1" => "UTF-8";
    convert_latin1_to_utf16, convert_latin1_to_utf16_with_errors,
    convert_valid_latin1_to_utf16:
        Latin1Source => Utf16Sink<NativeEndian>, [u8] => [u16], "Latin-1" => "native UTF-16";
    convert_latin1_to_utf16le, convert_latin1_to_utf16le_with_errors,
    convert_valid_latin1_to_utf16le:
        Latin1Source => Utf16Sink<LittleEndian>, [u8] => [u16], "Latin-1" => "UTF-16LE";
    convert_latin1_to_utf16be, convert_latin1_to_utf16be_with_errors,
    convert_valid_latin1_to_utf16be:
        Latin1Source => Utf16Sink<BigEndian>, [u8] => [u16], "Latin-1" => "UTF-16BE";
    convert_latin1_to_utf32, convert_latin1_to_utf32_with_errors, convert_valid_latin1_to_utf32:
        Latin1Source => Utf32Sink, [u8] => [u32], "Latin-1" => "UTF-32";
}

macro_rules! validations {
    ($($check:ident, $with_errors:ident: $src:ty, [$in:ty], $label:literal;)*) => {$(
        #[doc = concat!("Whether the input is well-formed ", $label, ".")]
        pub fn $check(input: &[$in]) -> bool {
            pipeline::validate::<$src>(input).is_ok()
        }

        #[doc = concat!("Validate ", $label, ", reporting the first violation.")]
        ///
        /// `written` is always 0 in the returned error.
        pub fn $with_errors(input: &[$in]) -> Result<(), TranscodeError> {
            pipeline::validate::<$src>(input)
        }
    )*};
}

validations! {
    validate_utf8, validate_utf8_with_errors: Utf8Source, [u8], "UTF-8";
    validate_utf16, validate_utf16_with_errors: Utf16Source<NativeEndian>, [u16], "native UTF-16";
    validate_utf16le, validate_utf16le_with_errors: Utf16Source<LittleEndian>, [u16], "UTF-16LE";
    validate_utf16be, validate_utf16be_with_errors: Utf16Source<BigEndian>, [u16], "UTF-16BE";
    validate_utf32, validate_utf32_with_errors: Utf32Source, [u32], "UTF-32";
    validate_ascii, validate_ascii_with_errors: AsciiSource, [u8], "ASCII";
}

fn replace_lone_surrogates<E: ByteOrder>(input: &[u16], output: &mut [u16]) {
    assert!(output.len() >= input.len(), "output shorter than input");
    let output = &mut output[..input.len()];
    output.copy_from_slice(input);
    let mut offset = 0;
    while let Err(err) = pipeline::validate::<Utf16Source<E>>(&output[offset..]) {
        offset += err.position;
        output[offset] = E::write(0xFFFD);
        offset += 1;
    }
}

/// Copy native UTF-16 replacing every lone surrogate with U+FFFD.
///
/// # Panics
///
/// Panics if `output` is shorter than `input`.
pub fn to_well_formed_utf16(input: &[u16], output: &mut [u16]) {
    replace_lone_surrogates::<NativeEndian>(input, output)
}

/// Copy UTF-16LE replacing every lone surrogate with U+FFFD.
///
/// # Panics
///
/// Panics if `output` is shorter than `input`.
pub fn to_well_formed_utf16le(input: &[u16], output: &mut [u16]) {
    replace_lone_surrogates::<LittleEndian>(input, output)
}

/// Copy UTF-16BE replacing every lone surrogate with U+FFFD.
///
/// # Panics
///
/// Panics if `output` is shorter than `input`.
pub fn to_well_formed_utf16be(input: &[u16], output: &mut [u16]) {
    replace_lone_surrogates::<BigEndian>(input, output)
}
