//! Append-only byte accumulator for received, not yet consumed data.
//!
//! Uses `bytes::BytesMut` so appends grow amortized and consumed prefixes
//! are released without shifting the remaining bytes. Frame payloads are
//! split off with [`StreamBuffer::take`] as frozen `Bytes` (no copy).

use bytes::{Buf, Bytes, BytesMut};

/// Initial capacity of a new buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Byte accumulator with strict arrival-order consumption.
#[derive(Debug)]
pub struct StreamBuffer {
    buffer: BytesMut,
}

impl StreamBuffer {
    /// Create a buffer with the default capacity (64KB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a buffer with a custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append received bytes at the end.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// The unconsumed span, without copying.
    #[inline]
    pub fn peek(&self) -> &[u8] {
        &self.buffer
    }

    /// Permanently discard the first `n` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n` is larger than [`len`](Self::len).
    pub fn consume(&mut self, n: usize) {
        self.buffer.advance(n);
    }

    /// Split off the first `n` bytes as an owned, immutable payload.
    ///
    /// # Panics
    ///
    /// Panics if `n` is larger than [`len`](Self::len).
    pub fn take(&mut self, n: usize) -> Bytes {
        self.buffer.split_to(n).freeze()
    }

    /// Number of unconsumed bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}
