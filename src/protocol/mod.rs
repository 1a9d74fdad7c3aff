//! Protocol module - wire format, stream buffering and frame scanning.
//!
//! This module implements the inbound side of the data stream:
//! - ASCII (`$…;`) and binary (`0xAA` + 40-bit length) wire formats
//! - Stream buffer for accumulating partial reads
//! - Frame scanner that reassembles both formats from arbitrary chunks

mod frame;
mod scanner;
mod stream_buffer;
mod wire_format;

pub use frame::{Frame, FrameKind};
pub use scanner::{FrameScanner, ScanEvent, ScanStats, DEFAULT_MAX_DECLARED_LEN};
pub use stream_buffer::{StreamBuffer, DEFAULT_BUFFER_CAPACITY};
pub use wire_format::{
    build_ascii_frame, build_auth_message, build_binary_frame, decode_length, encode_length,
    is_marker, ASCII_END, ASCII_START, AUTH_COMMAND, BINARY_HEADER_SIZE, BINARY_MARKER,
    LENGTH_FIELD_SIZE, MAX_LENGTH_FIELD, STATUS_COMMAND,
};
