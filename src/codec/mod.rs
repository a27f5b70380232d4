//! Incremental character decoding
//!
//! Turns bytes that arrive one at a time into complete characters of the
//! session's encoding:
//! - `fifo`: head/tail buffers with lazy compaction
//! - `utf8`: resumable UTF-8 decoding with replacement of malformed input
//! - `decoder`: the push decoder that ties both together

mod decoder;
mod fifo;
pub mod utf8;

pub use decoder::{DecoderError, Encoding, PushDecoder, DEFAULT_BUFFER_SIZE};
pub use fifo::{FifoBuffer, FifoByteBuffer, FifoCharBuffer};
