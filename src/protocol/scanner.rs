//! Frame scanner for the mixed ASCII / binary stream.
//!
//! Accumulates bytes in a [`StreamBuffer`] and extracts every frame that is
//! complete. Implements a state machine keyed on the marker found at the
//! head of the unconsumed span:
//! - `Seeking`: no marker at offset 0; leading bytes are unclassified noise
//! - `AsciiOpen`: `$` at offset 0, waiting for `;` or for a binary frame that
//!   starts after the `$` and completes first
//! - `BinaryOpen`: `0xAA` at offset 0, waiting for the header, then the payload
//!
//! A decision is only taken once the bytes it depends on are buffered and is
//! never revised by bytes that arrive later, so the frames produced do not
//! depend on how the stream was chunked.
//!
//! Overlap rule: when a `$…;` span and a binary frame overlap, the one that
//! ends first wins; on a tie the text frame wins. Everything before the
//! winner's marker is dropped as noise.
//!
//! # Example
//!
//! ```
//! use frame_collector::protocol::{FrameScanner, ScanEvent};
//!
//! let mut scanner = FrameScanner::new();
//!
//! assert!(scanner.push(b"$Hel").is_empty());
//! let events = scanner.push(b"lo123;");
//! assert_eq!(events.len(), 1);
//! match &events[0] {
//!     ScanEvent::Frame(frame) => assert_eq!(frame.payload(), b"Hello123"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use super::frame::Frame;
use super::stream_buffer::StreamBuffer;
use super::wire_format::{
    decode_length, is_marker, ASCII_END, ASCII_START, BINARY_HEADER_SIZE, BINARY_MARKER,
};

/// Default ceiling on a declared binary length (1 GiB).
pub const DEFAULT_MAX_DECLARED_LEN: u64 = 1 << 30;

/// Outcome of one scanning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A complete frame was consumed from the buffer.
    Frame(Frame),
    /// A binary header declared more than the accepted ceiling. Only the
    /// marker byte was consumed; scanning resumed right after it.
    RejectedHeader { declared_len: u64 },
}

/// Diagnostic counters of a scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Bytes dropped without being part of any frame.
    pub discarded_bytes: u64,
    /// Binary headers rejected for an oversized declared length.
    pub rejected_headers: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Seeking,
    /// `;` is absent from `[1, searched)`.
    /// With `binary == None`, no acceptable binary header starts in
    /// `[1, scanned)`. With `binary == Some(b)`, the first one starts at `b`.
    AsciiOpen {
        searched: usize,
        scanned: usize,
        binary: Option<usize>,
    },
    /// With `dollar == None`, `$` is absent from `[1, searched)`.
    /// With `dollar == Some(d)`, `;` is absent from `[d + 1, searched)`.
    BinaryOpen {
        dollar: Option<usize>,
        searched: usize,
    },
}

/// Incremental decoder for both frame formats.
#[derive(Debug)]
pub struct FrameScanner {
    buffer: StreamBuffer,
    state: State,
    max_declared_len: u64,
    stats: ScanStats,
}

impl FrameScanner {
    /// Create a scanner with the default 1 GiB declared-length ceiling.
    pub fn new() -> Self {
        Self::with_max_declared_len(DEFAULT_MAX_DECLARED_LEN)
    }

    /// Create a scanner with a custom declared-length ceiling.
    pub fn with_max_declared_len(max_declared_len: u64) -> Self {
        Self {
            buffer: StreamBuffer::new(),
            state: State::Seeking,
            max_declared_len,
            stats: ScanStats::default(),
        }
    }

    /// Push received bytes and extract every frame they complete.
    ///
    /// Returns an empty vector while frames are still partial; the partial
    /// bytes stay buffered for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<ScanEvent> {
        self.buffer.append(data);

        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    /// Number of buffered, unconsumed bytes.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Accepted declared-length ceiling.
    pub fn max_declared_len(&self) -> u64 {
        self.max_declared_len
    }

    fn next_event(&mut self) -> Option<ScanEvent> {
        loop {
            match self.state {
                State::Seeking => {
                    let span = self.buffer.peek();
                    let Some(start) = span.iter().position(|&b| is_marker(b)) else {
                        let noise = span.len();
                        self.discard(noise);
                        return None;
                    };
                    let marker = span[start];
                    self.discard(start);
                    self.state = if marker == ASCII_START {
                        State::AsciiOpen {
                            searched: 1,
                            scanned: 1,
                            binary: None,
                        }
                    } else {
                        State::BinaryOpen {
                            dollar: None,
                            searched: 1,
                        }
                    };
                }

                State::AsciiOpen {
                    searched,
                    mut scanned,
                    mut binary,
                } => {
                    let span = self.buffer.peek();
                    let len = span.len();

                    // Extent of the first binary frame opening after the `$`.
                    let mut candidate = None;
                    loop {
                        let b = match binary {
                            Some(b) => b,
                            None => match find_byte(span, scanned, len, BINARY_MARKER) {
                                Some(b) => {
                                    binary = Some(b);
                                    b
                                }
                                None => {
                                    scanned = len.max(1);
                                    break;
                                }
                            },
                        };
                        if len < b + BINARY_HEADER_SIZE {
                            break;
                        }
                        match binary_extent(&span[b..], self.max_declared_len) {
                            Ok((declared, size)) => {
                                candidate = b.checked_add(size).map(|end| (b, declared, size, end));
                                break;
                            }
                            Err(_) => {
                                binary = None;
                                scanned = b + 1;
                            }
                        }
                    }

                    let limit = candidate.map_or(len, |(.., end)| end.min(len));
                    if let Some(end) = find_byte(span, searched, limit, ASCII_END) {
                        self.state = State::Seeking;
                        return Some(ScanEvent::Frame(self.take_ascii(end)));
                    }

                    if let Some((b, declared, size, end)) = candidate {
                        if len >= end {
                            // Binary frame completed before any `;`.
                            self.discard(b);
                            self.state = State::Seeking;
                            return Some(self.take_binary(declared, size));
                        }
                    }

                    self.state = State::AsciiOpen {
                        searched: limit.max(1),
                        scanned,
                        binary,
                    };
                    return None;
                }

                State::BinaryOpen { dollar, searched } => {
                    let span = self.buffer.peek();
                    if span.len() < BINARY_HEADER_SIZE {
                        return None;
                    }

                    let (declared, frame_end) = match binary_extent(span, self.max_declared_len) {
                        Ok(extent) => extent,
                        Err(declared) => {
                            self.discard(1);
                            self.stats.rejected_headers += 1;
                            self.state = State::Seeking;
                            return Some(ScanEvent::RejectedHeader {
                                declared_len: declared,
                            });
                        }
                    };

                    let limit = span.len().min(frame_end);
                    let (dollar, from) = match dollar {
                        Some(d) => (Some(d), searched),
                        None => match find_byte(span, searched, limit, ASCII_START) {
                            Some(d) => (Some(d), d + 1),
                            None => (None, limit),
                        },
                    };

                    if let Some(d) = dollar {
                        if let Some(end) = find_byte(span, from, limit, ASCII_END) {
                            // Text frame inside the binary span takes priority.
                            self.discard(d);
                            self.state = State::Seeking;
                            return Some(ScanEvent::Frame(self.take_ascii(end - d)));
                        }
                    }

                    if span.len() >= frame_end {
                        self.state = State::Seeking;
                        return Some(self.take_binary(declared, frame_end));
                    }

                    self.state = State::BinaryOpen {
                        dollar,
                        searched: limit,
                    };
                    return None;
                }
            }
        }
    }

    /// Consume `$ payload ;` where `;` sits at offset `end`.
    fn take_ascii(&mut self, end: usize) -> Frame {
        self.buffer.consume(1);
        let payload = self.buffer.take(end - 1);
        self.buffer.consume(1);
        Frame::Ascii { payload }
    }

    /// Consume a binary frame of `size` bytes (header included) at the head
    /// of the buffer.
    fn take_binary(&mut self, declared_len: u64, size: usize) -> ScanEvent {
        self.buffer.consume(BINARY_HEADER_SIZE);
        let payload = self.buffer.take(size - BINARY_HEADER_SIZE);
        ScanEvent::Frame(Frame::Binary {
            declared_len,
            payload,
        })
    }

    fn discard(&mut self, n: usize) {
        if n > 0 {
            self.buffer.consume(n);
            self.stats.discarded_bytes += n as u64;
        }
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::Seeking => "Seeking",
            State::AsciiOpen { .. } => "AsciiOpen",
            State::BinaryOpen { .. } => "BinaryOpen",
        }
    }
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared length and total frame size of the binary header at
/// `header[0]`. Fails with the declared length above `max_declared_len`.
fn binary_extent(header: &[u8], max_declared_len: u64) -> Result<(u64, usize), u64> {
    let declared = decode_length(&header[1..]).unwrap_or_default();
    (declared <= max_declared_len)
        .then(|| usize::try_from(declared).ok())
        .flatten()
        .and_then(|len| len.checked_add(BINARY_HEADER_SIZE))
        .map(|end| (declared, end))
        .ok_or(declared)
}

fn find_byte(span: &[u8], from: usize, to: usize, byte: u8) -> Option<usize> {
    if from >= to {
        return None;
    }
    span[from..to]
        .iter()
        .position(|&b| b == byte)
        .map(|i| from + i)
}
