//! Decoded frame with typed accessors.
//!
//! Payloads are `bytes::Bytes` split off the scanner buffer, so they move
//! through the persistence queue to the sink without copying.
//!
//! # Example
//!
//! ```
//! use frame_collector::protocol::{Frame, FrameKind};
//! use bytes::Bytes;
//!
//! let frame = Frame::binary(Bytes::from_static(b"\x01\x02"));
//! assert_eq!(frame.kind(), FrameKind::Binary);
//! assert_eq!(frame.declared_len(), Some(2));
//! ```

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// Format tag of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// `$…;` delimited text frame.
    Ascii,
    /// `0xAA` length-prefixed binary frame.
    Binary,
}

impl FrameKind {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Ascii => "ascii",
            FrameKind::Binary => "binary",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete frame extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame, payload excludes both markers.
    Ascii { payload: Bytes },
    /// Binary frame with the length declared in its header.
    Binary { declared_len: u64, payload: Bytes },
}

impl Frame {
    /// Create an ASCII frame.
    pub fn ascii(payload: Bytes) -> Self {
        Frame::Ascii { payload }
    }

    /// Create a binary frame whose declared length is the payload length.
    pub fn binary(payload: Bytes) -> Self {
        Frame::Binary {
            declared_len: payload.len() as u64,
            payload,
        }
    }

    /// Format tag.
    #[inline]
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Ascii { .. } => FrameKind::Ascii,
            Frame::Binary { .. } => FrameKind::Binary,
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Ascii { payload } | Frame::Binary { payload, .. } => payload,
        }
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload().len()
    }

    /// Declared length, binary frames only.
    #[inline]
    pub fn declared_len(&self) -> Option<u64> {
        match self {
            Frame::Ascii { .. } => None,
            Frame::Binary { declared_len, .. } => Some(*declared_len),
        }
    }

    #[inline]
    pub fn is_ascii(&self) -> bool {
        matches!(self, Frame::Ascii { .. })
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary { .. })
    }
}
