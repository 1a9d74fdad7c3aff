//! Per-format payload validation.
//!
//! Pure functions over a payload, shared by the live decode path and the
//! offline report so both apply exactly the same rules.
//!
//! # Example
//!
//! ```
//! use frame_collector::validation::{validate_ascii, ValidationLimits};
//!
//! let limits = ValidationLimits::default();
//! assert!(validate_ascii(b"Hello123", &limits).is_valid());
//!
//! let verdict = validate_ascii(b"ab", &limits);
//! assert!(!verdict.is_valid());
//! assert!(verdict.errors[0].contains("too short"));
//! ```

use serde::Serialize;

use crate::protocol::{Frame, FrameKind, ASCII_END, ASCII_START};

/// Minimum ASCII payload length in characters.
pub const MIN_ASCII_LEN: usize = 5;

/// Minimum binary payload length in bytes.
pub const MIN_BINARY_LEN: u64 = 1;

/// Binary payloads above this size are valid but flagged (100 MiB).
pub const LARGE_BINARY_WARNING: u64 = 100 * 1024 * 1024;

/// Binary payloads above this size are rejected (1 GiB).
pub const MAX_BINARY_LEN: u64 = 1024 * 1024 * 1024;

/// Lowest printable character.
const PRINTABLE_MIN: u8 = 0x20;

/// Highest printable character.
const PRINTABLE_MAX: u8 = 0x7E;

/// Tunable validation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub min_ascii_len: usize,
    pub min_binary_len: u64,
    pub large_binary_warning: u64,
    pub max_binary_len: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_ascii_len: MIN_ASCII_LEN,
            min_binary_len: MIN_BINARY_LEN,
            large_binary_warning: LARGE_BINARY_WARNING,
            max_binary_len: MAX_BINARY_LEN,
        }
    }
}

/// Result of validating one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Rule violations. Any entry makes the payload invalid.
    pub errors: Vec<String>,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

impl Verdict {
    /// True when no rule was violated.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when at least one warning was raised.
    #[inline]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validate an ASCII payload (markers excluded).
///
/// Checks:
/// - at least `min_ascii_len` characters
/// - every character is printable ASCII (0x20..=0x7E)
/// - no `$` or `;`
///
/// Reports the first offending position for each character rule.
pub fn validate_ascii(payload: &[u8], limits: &ValidationLimits) -> Verdict {
    let mut verdict = Verdict::default();

    if payload.len() < limits.min_ascii_len {
        verdict.errors.push(format!(
            "ASCII payload too short: {} < {} characters",
            payload.len(),
            limits.min_ascii_len
        ));
    }

    if let Some((pos, byte)) = payload
        .iter()
        .enumerate()
        .find(|(_, &b)| !(PRINTABLE_MIN..=PRINTABLE_MAX).contains(&b))
    {
        verdict.errors.push(format!(
            "Non-printable character 0x{byte:02X} at position {pos}"
        ));
    }

    if let Some((pos, byte)) = payload
        .iter()
        .enumerate()
        .find(|(_, &b)| b == ASCII_START || b == ASCII_END)
    {
        verdict.errors.push(format!(
            "Reserved marker '{}' at position {pos}",
            char::from(*byte)
        ));
    }

    verdict
}

/// Validate a binary payload by its length.
///
/// Lengths above `large_binary_warning` stay valid but carry a warning.
pub fn validate_binary(len: u64, limits: &ValidationLimits) -> Verdict {
    let mut verdict = Verdict::default();

    if len < limits.min_binary_len {
        verdict.errors.push(format!(
            "Binary payload too short: {} < {} bytes",
            len, limits.min_binary_len
        ));
    }

    if len > limits.max_binary_len {
        verdict.errors.push(format!(
            "Binary payload size {} exceeds maximum {}",
            len, limits.max_binary_len
        ));
    } else if len > limits.large_binary_warning {
        verdict.warnings.push(format!(
            "Large binary payload: {} bytes exceeds {}",
            len, limits.large_binary_warning
        ));
    }

    verdict
}

/// Validate a payload with the rules of `kind`.
///
/// Both live frames and stored records go through here.
pub fn validate_payload(kind: FrameKind, payload: &[u8], limits: &ValidationLimits) -> Verdict {
    match kind {
        FrameKind::Ascii => validate_ascii(payload, limits),
        FrameKind::Binary => validate_binary(payload.len() as u64, limits),
    }
}

/// Validate a decoded frame with the rules of its format.
pub fn validate_frame(frame: &Frame, limits: &ValidationLimits) -> Verdict {
    validate_payload(frame.kind(), frame.payload(), limits)
}
