//! Push decoder
//!
//! Bytes are pushed in one at a time as they arrive from the transport.
//! Once enough of them form at least one character, [`PushDecoder::has_output`]
//! turns true and [`PushDecoder::read`] hands the characters out in order.

use serde::{Deserialize, Serialize};

use super::fifo::{FifoByteBuffer, FifoCharBuffer};
use super::utf8;

/// Default size of both internal buffers
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Character encodings a session can negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// UTF-8, the default
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// ISO-8859-1, every byte is one character
    #[serde(rename = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    /// Decode complete characters from `input` into `out`
    ///
    /// Returns the number of bytes consumed. Bytes of a character that is not
    /// complete yet stay unconsumed.
    pub fn decode(self, input: &[u8], out: &mut FifoCharBuffer) -> usize {
        match self {
            Encoding::Utf8 => utf8::decode(input, out),
            Encoding::Latin1 => {
                for &byte in input {
                    out.write(byte as char);
                }
                input.len()
            }
        }
    }

    /// Encode `text` for output
    ///
    /// Latin-1 has no representation for characters above U+00FF, they are
    /// sent as `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }

    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
        }
    }
}

/// Error type for the push decoder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecoderError {
    #[error("No complete character available")]
    NoOutput,
}

/// Decoder that accumulates bytes until they form characters
#[derive(Debug, Clone)]
pub struct PushDecoder {
    encoding: Encoding,
    input: FifoByteBuffer,
    output: FifoCharBuffer,
}

impl PushDecoder {
    /// Create a decoder with the default buffer size
    pub fn new(encoding: Encoding) -> Self {
        Self::with_buffer_size(encoding, DEFAULT_BUFFER_SIZE)
    }

    /// Create a decoder with the given size for its internal buffers
    ///
    /// Writing more bytes than this without reading characters back
    /// makes the buffers grow.
    pub fn with_buffer_size(encoding: Encoding, buffer_size: usize) -> Self {
        Self {
            encoding,
            input: FifoByteBuffer::new(buffer_size),
            output: FifoCharBuffer::new(buffer_size),
        }
    }

    /// The active encoding
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Push one byte
    pub fn write(&mut self, byte: u8) {
        self.input.write(byte);
    }

    /// Check whether a character can be read without more input
    pub fn has_output(&mut self) -> bool {
        if !self.output.is_empty() {
            return true;
        }
        self.decode_more();
        !self.output.is_empty()
    }

    /// Take the next character
    ///
    /// Fails if no character is buffered and the accumulated bytes do not
    /// complete one either; guard with [`has_output`](Self::has_output).
    pub fn read(&mut self) -> Result<char, DecoderError> {
        if let Some(c) = self.output.read() {
            return Ok(c);
        }
        self.decode_more();
        self.output.read().ok_or(DecoderError::NoOutput)
    }

    /// Number of bytes waiting for the rest of their character
    pub fn pending_bytes(&self) -> usize {
        self.input.available()
    }

    /// Drop all buffered state
    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
    }

    fn decode_more(&mut self) {
        let used = self.encoding.decode(self.input.as_slice(), &mut self.output);
        self.input.discard_first(used);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functionality() {
        let mut decoder = PushDecoder::new(Encoding::Utf8);

        assert!(!decoder.has_output());
        decoder.write(b'A');
        assert!(decoder.has_output());
        assert_eq!(decoder.read(), Ok('A'));
        assert!(!decoder.has_output());

        decoder.write(0xE2);
        decoder.write(0x99);
        decoder.write(0xA5);
        assert_eq!(decoder.read(), Ok('♥'));
    }

    #[test]
    fn test_output_only_after_last_byte() {
        let mut decoder = PushDecoder::new(Encoding::Utf8);
        decoder.write(0xE2);
        assert!(!decoder.has_output());
        decoder.write(0x99);
        assert!(!decoder.has_output());
        assert_eq!(decoder.pending_bytes(), 2);
        decoder.write(0xA5);
        assert!(decoder.has_output());
        assert_eq!(decoder.read(), Ok('♥'));
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_read_without_output_fails() {
        let mut decoder = PushDecoder::new(Encoding::Utf8);
        assert_eq!(decoder.read(), Err(DecoderError::NoOutput));
        decoder.write(0xC3);
        assert_eq!(decoder.read(), Err(DecoderError::NoOutput));
        decoder.write(0xA9);
        assert_eq!(decoder.read(), Ok('é'));
    }

    #[test]
    fn test_malformed_input_is_replaced() {
        let mut decoder = PushDecoder::new(Encoding::Utf8);
        decoder.write(0xFF);
        assert_eq!(decoder.read(), Ok('\u{FFFD}'));
        decoder.write(b'k');
        assert_eq!(decoder.read(), Ok('k'));
    }

    #[test]
    fn test_latin1() {
        let mut decoder = PushDecoder::new(Encoding::Latin1);
        decoder.write(0xE9);
        assert!(decoder.has_output());
        assert_eq!(decoder.read(), Ok('é'));
    }

    #[test]
    fn test_all_bmp_code_points() {
        let mut decoder = PushDecoder::with_buffer_size(Encoding::Utf8, 16);
        let mut buf = [0u8; 4];
        for cp in (0u32..0x10000).filter(|cp| !(0xD800..=0xDFFF).contains(cp)) {
            let c = char::from_u32(cp).unwrap();
            for b in c.encode_utf8(&mut buf).bytes() {
                decoder.write(b);
            }
            assert!(decoder.has_output(), "code point {:#x}", cp);
            assert_eq!(decoder.read(), Ok(c), "code point {:#x}", cp);
        }
    }

    #[test]
    fn test_encode_output() {
        assert_eq!(Encoding::Utf8.encode("é♥"), "é♥".as_bytes());
        assert_eq!(Encoding::Latin1.encode("é♥"), vec![0xE9, b'?']);
    }

    #[test]
    fn test_encoding_serialization() {
        let json = serde_json::to_string(&Encoding::Latin1).unwrap();
        assert_eq!(json, "\"latin-1\"");
        let restored: Encoding = serde_json::from_str("\"utf8\"").unwrap();
        assert_eq!(restored, Encoding::Utf8);
    }
}
