//! Wire format constants, length field codec and frame builders.
//!
//! Two frame formats share one byte stream:
//! ```text
//! ASCII:   ┌─────┬──────────────────────┬─────┐
//!          │ '$' │ payload (printable)  │ ';' │
//!          │ 0x24│                      │ 0x3B│
//!          └─────┴──────────────────────┴─────┘
//!
//! Binary:  ┌──────┬───────────────────┬─────────────┐
//!          │ 0xAA │ Length            │ payload     │
//!          │1 byte│ 5 bytes uint40 BE │ Length bytes│
//!          └──────┴───────────────────┴─────────────┘
//! ```

/// Start marker of an ASCII frame.
pub const ASCII_START: u8 = b'$';

/// End marker of an ASCII frame.
pub const ASCII_END: u8 = b';';

/// Start marker of a binary frame.
pub const BINARY_MARKER: u8 = 0xAA;

/// Width of the binary length field in bytes.
pub const LENGTH_FIELD_SIZE: usize = 5;

/// Binary header size: marker plus length field.
pub const BINARY_HEADER_SIZE: usize = 1 + LENGTH_FIELD_SIZE;

/// Largest value representable by the 40-bit length field.
pub const MAX_LENGTH_FIELD: u64 = (1 << 40) - 1;

/// Outbound authentication command prefix.
pub const AUTH_COMMAND: &str = "AUTH";

/// Outbound termination command.
pub const STATUS_COMMAND: &[u8] = b"STATUS";

/// Check whether a byte starts a frame of either format.
#[inline]
pub fn is_marker(byte: u8) -> bool {
    byte == ASCII_START || byte == BINARY_MARKER
}

/// Decode a 40-bit big-endian length.
///
/// Returns `None` if fewer than 5 bytes are given.
///
/// # Example
///
/// ```
/// use frame_collector::protocol::decode_length;
///
/// assert_eq!(decode_length(&[0, 0, 0, 1, 0]), Some(256));
/// assert_eq!(decode_length(&[0, 0, 1]), None);
/// ```
pub fn decode_length(buf: &[u8]) -> Option<u64> {
    if buf.len() < LENGTH_FIELD_SIZE {
        return None;
    }
    Some(
        buf[..LENGTH_FIELD_SIZE]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
    )
}

/// Encode a length as 40-bit big-endian.
///
/// # Panics
///
/// Panics if `len` exceeds [`MAX_LENGTH_FIELD`].
pub fn encode_length(len: u64) -> [u8; LENGTH_FIELD_SIZE] {
    assert!(len <= MAX_LENGTH_FIELD, "length {len} does not fit in 40 bits");
    let be = len.to_be_bytes();
    let mut out = [0u8; LENGTH_FIELD_SIZE];
    out.copy_from_slice(&be[8 - LENGTH_FIELD_SIZE..]);
    out
}

/// Build an ASCII frame: `$` + payload + `;`.
///
/// The payload is not checked; use this to produce invalid frames in tests too.
pub fn build_ascii_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 2);
    buf.push(ASCII_START);
    buf.extend_from_slice(payload);
    buf.push(ASCII_END);
    buf
}

/// Build a binary frame: marker + 40-bit length + payload.
///
/// # Example
///
/// ```
/// use frame_collector::protocol::build_binary_frame;
///
/// let bytes = build_binary_frame(b"hello");
/// assert_eq!(bytes, [0xAA, 0, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
/// ```
pub fn build_binary_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BINARY_HEADER_SIZE + payload.len());
    buf.push(BINARY_MARKER);
    buf.extend_from_slice(&encode_length(payload.len() as u64));
    buf.extend_from_slice(payload);
    buf
}

/// Build the authentication message sent once after connecting.
pub fn build_auth_message(token: &str) -> Vec<u8> {
    format!("{AUTH_COMMAND} {token}").into_bytes()
}
