// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Variable-length quantities.
//!
//! Seven bits per byte, most significant group first, with the
//! continuation bit (0x80) set on every byte except the last.

use std::io::{self, Read, Write};

use crate::error::MalformedKind;

/// Largest value representable in four groups
pub const MAX_VALUE: u32 = 0x0FFF_FFFF;

/// Longest legal encoding
pub const MAX_BYTES: usize = 4;

/// Encode `value` as its minimal byte sequence
pub fn encode(mut value: u32) -> Vec<u8> {
    debug_assert!(value <= MAX_VALUE);
    let mut bytes = Vec::with_capacity(MAX_BYTES);

    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    bytes
}

/// Write `value` to `writer`, returning the number of bytes written
pub fn write<W: Write>(writer: &mut W, value: u32) -> io::Result<usize> {
    let bytes = encode(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Read a quantity from `source`.
///
/// Returns 0 if the source runs out before the terminating byte, or if
/// the encoding is longer than four bytes.
pub fn decode<R: Read>(source: &mut R) -> u32 {
    try_decode(source).unwrap_or(0)
}

/// Read a quantity from `source`, reporting truncated or overlong input
pub fn try_decode<R: Read>(source: &mut R) -> Result<u32, MalformedKind> {
    let mut decoder = Decoder::new();
    let mut byte = [0u8; 1];
    loop {
        source
            .read_exact(&mut byte)
            .map_err(|_| MalformedKind::UnexpectedEnd)?;
        if let Some(value) = decoder.push(byte[0])? {
            return Ok(value);
        }
    }
}

/// Incremental decoder, fed one byte at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    value: u32,
    groups: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Yields the value once the final group arrives.
    pub fn push(&mut self, byte: u8) -> Result<Option<u32>, MalformedKind> {
        if self.groups == MAX_BYTES {
            return Err(MalformedKind::VarLenOverflow);
        }
        self.value = (self.value << 7) | (byte & 0x7F) as u32;
        self.groups += 1;

        if byte & 0x80 != 0 {
            if self.groups == MAX_BYTES {
                return Err(MalformedKind::VarLenOverflow);
            }
            Ok(None)
        } else {
            Ok(Some(self.value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(value: u32) -> u32 {
        decode(&mut Cursor::new(encode(value)))
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(127), vec![0x7F]);
        assert_eq!(encode(128), vec![0x81, 0x00]);
        assert_eq!(encode(16383), vec![0xFF, 0x7F]);
        assert_eq!(encode(16384), vec![0x81, 0x80, 0x00]);
        assert_eq!(encode(MAX_VALUE), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_round_trip_group_boundaries() {
        for bits in [7u32, 14, 21, 28] {
            let edge = (1u32 << bits) - 1;
            assert_eq!(round_trip(edge), edge);
            assert_eq!(round_trip(edge / 2), edge / 2);
            if bits < 28 {
                assert_eq!(round_trip(edge + 1), edge + 1);
            }
        }
    }

    #[test]
    fn test_round_trip_across_range() {
        // Stride through the whole 28-bit range with an odd step.
        let mut value = 0u32;
        while value <= MAX_VALUE {
            assert_eq!(round_trip(value), value, "value {}", value);
            value += 9_973;
        }
    }

    #[test]
    fn test_encoding_is_minimal() {
        assert_eq!(encode(0x7F).len(), 1);
        assert_eq!(encode(0x3FFF).len(), 2);
        assert_eq!(encode(0x1F_FFFF).len(), 3);
        assert_eq!(encode(0x20_0000).len(), 4);
    }

    #[test]
    fn test_truncated_input_decodes_to_zero() {
        assert_eq!(decode(&mut Cursor::new(vec![0x81])), 0);
        assert_eq!(decode(&mut Cursor::new(Vec::<u8>::new())), 0);
    }

    #[test]
    fn test_overlong_input() {
        let mut decoder = Decoder::new();
        for byte in [0x81, 0x80, 0x80] {
            assert_eq!(decoder.push(byte), Ok(None));
        }
        assert_eq!(decoder.push(0x80), Err(MalformedKind::VarLenOverflow));
        assert_eq!(decode(&mut Cursor::new(vec![0x81, 0x80, 0x80, 0x80, 0x00])), 0);
    }

    #[test]
    fn test_try_decode_reports_errors() {
        assert_eq!(try_decode(&mut Cursor::new(vec![0x83, 0x60])), Ok(480));
        assert_eq!(
            try_decode(&mut Cursor::new(vec![0x81, 0x80])),
            Err(MalformedKind::UnexpectedEnd)
        );
        assert_eq!(
            try_decode(&mut Cursor::new(Vec::<u8>::new())),
            Err(MalformedKind::UnexpectedEnd)
        );
        assert_eq!(
            try_decode(&mut Cursor::new(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x7F])),
            Err(MalformedKind::VarLenOverflow)
        );
        // Zero is a legal value, unlike the sentinel from `decode`.
        assert_eq!(try_decode(&mut Cursor::new(vec![0x00])), Ok(0));
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        let mut cursor = Cursor::new(vec![0x83, 0x60, 0x90]);
        assert_eq!(decode(&mut cursor), 480);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_write_reports_length() {
        let mut buffer = Vec::new();
        assert_eq!(write(&mut buffer, 480).unwrap(), 2);
        assert_eq!(buffer, vec![0x83, 0x60]);
    }
}
