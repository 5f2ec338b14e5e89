//! Code unit representation
//!
//! UTF-16 slices handed to the engine keep the byte order of the wire format:
//! a `u16` read from a UTF-16BE buffer still holds its bytes big-endian in
//! memory, and the [`ByteOrder`] marker of the source or sink decides how the
//! value is recovered. UTF-32 slices hold native values, and UTF-32 byte
//! streams handled by the [`Transcoder`](crate::Transcoder) are little-endian.

/// Byte order of UTF-16 code units as stored in a `u16` slice
pub(crate) trait ByteOrder {
    /// Recover the numeric value of a stored unit
    fn read(unit: u16) -> u16;
    /// Store a numeric value in this byte order
    fn write(value: u16) -> u16;
}

/// UTF-16LE storage
#[derive(Debug, Clone, Copy)]
pub(crate) struct LittleEndian;

/// UTF-16BE storage
#[derive(Debug, Clone, Copy)]
pub(crate) struct BigEndian;

impl ByteOrder for LittleEndian {
    #[inline]
    fn read(unit: u16) -> u16 {
        u16::from_le(unit)
    }

    #[inline]
    fn write(value: u16) -> u16 {
        value.to_le()
    }
}

impl ByteOrder for BigEndian {
    #[inline]
    fn read(unit: u16) -> u16 {
        u16::from_be(unit)
    }

    #[inline]
    fn write(value: u16) -> u16 {
        value.to_be()
    }
}

/// Byte order of the host
#[cfg(target_endian = "little")]
pub(crate) type NativeEndian = LittleEndian;

/// Byte order of the host
#[cfg(target_endian = "big")]
pub(crate) type NativeEndian = BigEndian;

/// A storage element of some encoding, packable from and to raw bytes
pub(crate) trait CodeUnit: Copy + Default {
    /// Width in bytes
    const WIDTH: usize;

    /// Build a unit from exactly `WIDTH` bytes
    fn from_bytes(bytes: &[u8]) -> Self;

    /// Append the `WIDTH` bytes of this unit
    fn write_bytes(self, out: &mut Vec<u8>);
}

impl CodeUnit for u8 {
    const WIDTH: usize = 1;

    #[inline]
    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }

    #[inline]
    fn write_bytes(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

// Memory layout is kept as-is; the ByteOrder marker interprets it.
impl CodeUnit for u16 {
    const WIDTH: usize = 2;

    #[inline]
    fn from_bytes(bytes: &[u8]) -> Self {
        u16::from_ne_bytes([bytes[0], bytes[1]])
    }

    #[inline]
    fn write_bytes(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }
}

impl CodeUnit for u32 {
    const WIDTH: usize = 4;

    #[inline]
    fn from_bytes(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[inline]
    fn write_bytes(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// Number of bytes at the front of `bytes` that form whole units of `width`
#[inline]
pub(crate) fn whole_units_len(bytes: &[u8], width: usize) -> usize {
    bytes.len() - bytes.len() % width
}

/// Pack whole units from a byte buffer; a trailing partial unit is ignored.
pub(crate) fn pack<U: CodeUnit>(bytes: &[u8]) -> Vec<U> {
    bytes.chunks_exact(U::WIDTH).map(U::from_bytes).collect()
}

/// Unpack units into their byte representation
pub(crate) fn unpack<U: CodeUnit>(units: &[U]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len() * U::WIDTH);
    for &unit in units {
        unit.write_bytes(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_utf16_storage_keeps_wire_order() {
        let le_bytes = [0x3D, 0xD8, 0x00, 0xDE];
        let units: Vec<u16> = pack(&le_bytes);
        assert_eq!(LittleEndian::read(units[0]), 0xD83D);
        assert_eq!(LittleEndian::read(units[1]), 0xDE00);
        assert_eq!(unpack(&units), le_bytes.to_vec());

        let be_bytes = [0xD8, 0x3D, 0xDE, 0x00];
        let units: Vec<u16> = pack(&be_bytes);
        assert_eq!(BigEndian::read(units[0]), 0xD83D);
        assert_eq!(BigEndian::write(0xDE00), units[1]);
    }

    #[test]
    fn test_native_order_reads_host_values() {
        assert_eq!(NativeEndian::read(0xD83D), 0xD83D);
        assert_eq!(NativeEndian::write(0x20AC), 0x20AC);
    }

    #[test]
    fn test_utf32_is_little_endian() {
        let units: Vec<u32> = pack(&[0x00, 0xF6, 0x01, 0x00]);
        assert_eq!(units, vec![0x1F600]);
        assert_eq!(unpack(&units), vec![0x00, 0xF6, 0x01, 0x00]);
    }

    #[test]
    fn test_partial_units_are_left_out() {
        assert_eq!(whole_units_len(&[1, 2, 3], 2), 2);
        assert_eq!(whole_units_len(&[1, 2, 3], 4), 0);
        let units: Vec<u16> = pack(&[1, 0, 2]);
        assert_eq!(units.len(), 1);
    }
}
