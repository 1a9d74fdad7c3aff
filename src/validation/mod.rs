//! Validation module - payload rules and offline reporting.
//!
//! - [`validate_ascii`] / [`validate_binary`] - pure per-format rules
//! - [`summarize`] / [`full_report`] - re-validation of stored records

mod report;
mod rules;

pub use report::{
    full_report, summarize, validate_records, FormatReport, FullReport, RecordSample, SizeStats,
    ValidationSummary, DEFAULT_SAMPLE_SIZE,
};
pub use rules::{
    validate_ascii, validate_binary, validate_frame, validate_payload, ValidationLimits, Verdict,
    LARGE_BINARY_WARNING, MAX_BINARY_LEN, MIN_ASCII_LEN, MIN_BINARY_LEN,
};
