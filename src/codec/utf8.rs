//! UTF-8 decoding for the push decoder
//!
//! Decodes as many complete characters as the input holds. A truncated
//! sequence at the end of the input is left unconsumed so it can be completed
//! by bytes that arrive later; malformed sequences become U+FFFD.

use super::FifoCharBuffer;

/// Replacement character emitted for malformed input
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Outcome of looking at the sequence starting at some offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// A character and the number of bytes it used
    Char(char, usize),
    /// Malformed input spanning this many bytes
    Invalid(usize),
    /// Valid so far but more bytes are needed
    Incomplete,
}

/// Decode `input` into `out`, returning how many bytes were consumed
pub fn decode(input: &[u8], out: &mut FifoCharBuffer) -> usize {
    let mut pos = 0;
    while pos < input.len() {
        match step(&input[pos..]) {
            Step::Char(c, len) => {
                out.write(c);
                pos += len;
            }
            Step::Invalid(len) => {
                out.write(REPLACEMENT_CHAR);
                pos += len;
            }
            Step::Incomplete => break,
        }
    }
    pos
}

/// Expected sequence length for a lead byte, or `None` if it cannot start one
fn sequence_len(lead: u8) -> Option<usize> {
    if lead < 0x80 {
        Some(1)
    } else if lead & 0b1110_0000 == 0b1100_0000 {
        Some(2)
    } else if lead & 0b1111_0000 == 0b1110_0000 {
        Some(3)
    } else if lead & 0b1111_1000 == 0b1111_0000 {
        Some(4)
    } else {
        None
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}

fn step(bytes: &[u8]) -> Step {
    let lead = bytes[0];

    // ASCII fast path
    if lead < 0x80 {
        return Step::Char(lead as char, 1);
    }

    let Some(expected) = sequence_len(lead) else {
        return Step::Invalid(1);
    };

    // A broken continuation only swallows the bytes before it; the offending
    // byte gets another chance as a lead byte.
    let available = bytes.len().min(expected);
    for (i, &byte) in bytes[1..available].iter().enumerate() {
        if !is_continuation(byte) {
            return Step::Invalid(i + 1);
        }
    }
    if available < expected {
        return Step::Incomplete;
    }

    let cp = match expected {
        2 => ((lead & 0x1F) as u32) << 6 | (bytes[1] & 0x3F) as u32,
        3 => {
            ((lead & 0x0F) as u32) << 12
                | ((bytes[1] & 0x3F) as u32) << 6
                | (bytes[2] & 0x3F) as u32
        }
        _ => {
            ((lead & 0x07) as u32) << 18
                | ((bytes[1] & 0x3F) as u32) << 12
                | ((bytes[2] & 0x3F) as u32) << 6
                | (bytes[3] & 0x3F) as u32
        }
    };

    // Overlong encodings, surrogates and out of range values
    let min = match expected {
        2 => 0x80,
        3 => 0x800,
        _ => 0x10000,
    };
    if cp < min {
        return Step::Invalid(expected);
    }
    match char::from_u32(cp) {
        Some(c) => Step::Char(c, expected),
        None => Step::Invalid(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> (String, usize) {
        let mut out = FifoCharBuffer::new(16);
        let used = decode(input, &mut out);
        let mut s = String::new();
        while let Some(c) = out.read() {
            s.push(c);
        }
        (s, used)
    }

    #[test]
    fn test_ascii() {
        assert_eq!(decode_all(b"Az0"), ("Az0".to_string(), 3));
    }

    #[test]
    fn test_two_byte() {
        // 'é' = U+00E9 = 0xC3 0xA9
        assert_eq!(decode_all(&[0xC3, 0xA9]), ("é".to_string(), 2));
    }

    #[test]
    fn test_three_byte() {
        // '中' = U+4E2D = 0xE4 0xB8 0xAD
        assert_eq!(decode_all(&[0xE4, 0xB8, 0xAD]), ("中".to_string(), 3));
    }

    #[test]
    fn test_four_byte() {
        // '😀' = U+1F600 = 0xF0 0x9F 0x98 0x80
        assert_eq!(decode_all(&[0xF0, 0x9F, 0x98, 0x80]), ("😀".to_string(), 4));
    }

    #[test]
    fn test_incomplete_tail_is_left() {
        assert_eq!(decode_all(&[b'a', 0xE2, 0x99]), ("a".to_string(), 1));
        assert_eq!(decode_all(&[0xF0]), (String::new(), 0));
    }

    #[test]
    fn test_invalid_start() {
        // 0xFF is never valid in UTF-8
        assert_eq!(decode_all(&[0xFF, b'x']), ("\u{FFFD}x".to_string(), 2));
    }

    #[test]
    fn test_invalid_continuation_keeps_next_byte() {
        // Start a 2-byte sequence but give an ASCII byte instead
        assert_eq!(decode_all(&[0xC3, b'A']), ("\u{FFFD}A".to_string(), 2));
    }

    #[test]
    fn test_overlong_encoding() {
        // Overlong encoding of 'A' (should be 0x41, not 0xC1 0x81)
        assert_eq!(decode_all(&[0xC1, 0x81]), ("\u{FFFD}".to_string(), 2));
    }

    #[test]
    fn test_surrogate_rejected() {
        // U+D800 encoded directly
        assert_eq!(decode_all(&[0xED, 0xA0, 0x80]), ("\u{FFFD}".to_string(), 3));
    }

    #[test]
    fn test_out_of_range_rejected() {
        // 0x110000 is past the last code point
        assert_eq!(decode_all(&[0xF4, 0x90, 0x80, 0x80]), ("\u{FFFD}".to_string(), 4));
    }
}
