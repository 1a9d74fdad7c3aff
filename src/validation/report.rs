//! Offline re-validation report over stored records.
//!
//! Applies the same rules as the live path (see [`super::rules`]) to records
//! already persisted by a sink and aggregates the outcome per format.
//!
//! # Example
//!
//! ```
//! use frame_collector::persist::StoredRecord;
//! use frame_collector::validation::{summarize, ValidationLimits};
//! use frame_collector::protocol::FrameKind;
//!
//! let records = vec![
//!     StoredRecord::new(FrameKind::Ascii, "Hello123"),
//!     StoredRecord::new(FrameKind::Binary, vec![1u8, 2, 3]),
//! ];
//! let summary = summarize(&records, &ValidationLimits::default());
//! assert!(summary.all_valid);
//! assert_eq!(summary.total_records, 2);
//! ```

use serde::Serialize;

use super::rules::{validate_payload, ValidationLimits, Verdict};
use crate::persist::StoredRecord;
use crate::protocol::FrameKind;

/// Default number of samples per format in a full report.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Maximum characters of a sample preview.
const PREVIEW_CHARS: usize = 32;

/// Validation outcome for every record of one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub total_count: u64,
    pub valid_count: u64,
    pub invalid_count: u64,
}

impl Default for FormatReport {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            total_count: 0,
            valid_count: 0,
            invalid_count: 0,
        }
    }
}

impl FormatReport {
    fn record(&mut self, index: usize, verdict: Verdict) {
        self.total_count += 1;
        if verdict.is_valid() {
            self.valid_count += 1;
        } else {
            self.invalid_count += 1;
            self.is_valid = false;
        }
        self.errors.extend(
            verdict
                .errors
                .into_iter()
                .map(|e| format!("record {index}: {e}")),
        );
        self.warnings.extend(
            verdict
                .warnings
                .into_iter()
                .map(|w| format!("record {index}: {w}")),
        );
    }
}

/// Aggregate of both formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub ascii: FormatReport,
    pub binary: FormatReport,
    pub total_records: u64,
    pub all_valid: bool,
}

/// Size statistics of binary records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeStats {
    pub count: u64,
    pub total_bytes: u64,
    pub average_bytes: f64,
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl SizeStats {
    /// Compute statistics over a set of sizes. All zero when empty.
    pub fn from_sizes(sizes: impl IntoIterator<Item = u64>) -> Self {
        let mut stats = SizeStats::default();
        for size in sizes {
            if stats.count == 0 {
                stats.min_bytes = size;
                stats.max_bytes = size;
            } else {
                stats.min_bytes = stats.min_bytes.min(size);
                stats.max_bytes = stats.max_bytes.max(size);
            }
            stats.count += 1;
            stats.total_bytes += size;
        }
        if stats.count > 0 {
            stats.average_bytes = stats.total_bytes as f64 / stats.count as f64;
        }
        stats
    }
}

/// Short description of one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSample {
    pub index: usize,
    pub kind: FrameKind,
    pub length: usize,
    pub is_valid: bool,
    pub preview: String,
}

/// Summary plus samples and binary size statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullReport {
    pub summary: ValidationSummary,
    pub samples: Vec<RecordSample>,
    pub binary_size_stats: SizeStats,
}

/// Validate every record of `kind`, ignoring records of the other format.
///
/// Record indexes in messages refer to positions in `records`.
pub fn validate_records(
    kind: FrameKind,
    records: &[StoredRecord],
    limits: &ValidationLimits,
) -> FormatReport {
    let mut report = FormatReport::default();
    for (index, record) in records.iter().enumerate() {
        if record.kind == kind {
            report.record(index, validate_payload(record.kind, &record.payload, limits));
        }
    }
    report
}

/// Validate both formats.
pub fn summarize(records: &[StoredRecord], limits: &ValidationLimits) -> ValidationSummary {
    let ascii = validate_records(FrameKind::Ascii, records, limits);
    let binary = validate_records(FrameKind::Binary, records, limits);
    ValidationSummary {
        total_records: ascii.total_count + binary.total_count,
        all_valid: ascii.is_valid && binary.is_valid,
        ascii,
        binary,
    }
}

/// Build the full report with up to `sample_size` samples per format.
pub fn full_report(
    records: &[StoredRecord],
    limits: &ValidationLimits,
    sample_size: usize,
) -> FullReport {
    let summary = summarize(records, limits);

    let mut samples = Vec::new();
    for kind in [FrameKind::Ascii, FrameKind::Binary] {
        samples.extend(
            records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.kind == kind)
                .take(sample_size)
                .map(|(index, r)| RecordSample {
                    index,
                    kind,
                    length: r.payload.len(),
                    is_valid: validate_payload(kind, &r.payload, limits).is_valid(),
                    preview: preview(kind, &r.payload),
                }),
        );
    }

    let binary_size_stats = SizeStats::from_sizes(
        records
            .iter()
            .filter(|r| r.kind == FrameKind::Binary)
            .map(|r| r.payload.len() as u64),
    );

    FullReport {
        summary,
        samples,
        binary_size_stats,
    }
}

fn preview(kind: FrameKind, payload: &[u8]) -> String {
    match kind {
        FrameKind::Ascii => String::from_utf8_lossy(payload)
            .chars()
            .take(PREVIEW_CHARS)
            .collect(),
        FrameKind::Binary => payload
            .iter()
            .take(PREVIEW_CHARS / 2)
            .map(|b| format!("{b:02x}"))
            .collect(),
    }
}
