//! Session status record and its shared cell.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Draining,
}

impl Phase {
    /// True while a session owns the controller.
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

/// Category of a recorded session error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Connect, read or write failure. Ends the session.
    Transport,
    /// A sink rejected a frame. The session continues.
    Persistence,
    /// A frame failed validation.
    Validation,
    /// The stream violated the framing rules.
    Protocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Validation => "validation",
            ErrorKind::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

/// One entry of the session error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Snapshot of a collection session.
///
/// `errors` keeps every entry in the order it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStatus {
    pub phase: Phase,
    pub running: bool,
    pub target_messages: u64,
    pub ascii_messages: u64,
    pub binary_messages: u64,
    pub total_messages: u64,
    /// ASCII frames dropped by the validator.
    pub invalid_ascii_dropped: u64,
    /// Binary frames persisted despite failing validation.
    pub binary_validation_failures: u64,
    pub large_binary_warnings: u64,
    /// Bytes dropped as unclassified noise.
    pub discarded_bytes: u64,
    pub rejected_binary_headers: u64,
    /// `total_messages` at the moment the session started draining.
    pub total_at_drain: Option<u64>,
    pub errors: Vec<ErrorRecord>,
}

impl CollectionStatus {
    /// Idle status with zeroed counters.
    pub fn idle(target_messages: u64) -> Self {
        Self {
            phase: Phase::Idle,
            running: false,
            target_messages,
            ascii_messages: 0,
            binary_messages: 0,
            total_messages: 0,
            invalid_ascii_dropped: 0,
            binary_validation_failures: 0,
            large_binary_warnings: 0,
            discarded_bytes: 0,
            rejected_binary_headers: 0,
            total_at_drain: None,
            errors: Vec::new(),
        }
    }

    /// Fresh status of a session that is starting.
    pub fn started(target_messages: u64) -> Self {
        let mut status = Self::idle(target_messages);
        status.set_phase(Phase::Running);
        status
    }

    /// Move to `phase`, keeping `running` consistent with it.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.running = phase.is_active();
    }

    /// Enter `Draining` and remember the total at that moment. Returns the
    /// recorded total; a second call keeps the first value.
    pub fn begin_drain(&mut self) -> u64 {
        self.set_phase(Phase::Draining);
        *self.total_at_drain.get_or_insert(self.total_messages)
    }

    /// True once the completion condition holds.
    #[inline]
    pub fn target_reached(&self) -> bool {
        self.total_messages >= self.target_messages
    }

    pub fn push_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(ErrorRecord::new(kind, message));
    }
}

/// Status shared between a controller and its session task.
#[derive(Debug)]
pub(crate) struct StatusCell {
    inner: Mutex<CollectionStatus>,
}

impl StatusCell {
    pub(crate) fn new(status: CollectionStatus) -> Self {
        Self {
            inner: Mutex::new(status),
        }
    }

    // The status is plain data, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, CollectionStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> CollectionStatus {
        self.lock().clone()
    }

    pub(crate) fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Apply `f` under the lock.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut CollectionStatus) -> R) -> R {
        f(&mut self.lock())
    }

    pub(crate) fn record_error(&self, kind: ErrorKind, message: impl Into<String>) {
        self.lock().push_error(kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_status() {
        let status = CollectionStatus::started(600);
        assert_eq!(status.phase, Phase::Running);
        assert!(status.running);
        assert_eq!(status.target_messages, 600);
        assert_eq!(status.total_messages, 0);
        assert!(!status.target_reached());
    }

    #[test]
    fn test_phase_drives_running_flag() {
        let mut status = CollectionStatus::idle(1);
        assert!(!status.running);

        status.set_phase(Phase::Draining);
        assert!(status.running);

        status.set_phase(Phase::Idle);
        assert!(!status.running);
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut status = CollectionStatus::started(3);
        status.ascii_messages = 1;
        status.total_messages = 1;
        status.push_error(ErrorKind::Persistence, "disk full");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "running");
        assert_eq!(json["targetMessages"], 3);
        assert_eq!(json["asciiMessages"], 1);
        assert_eq!(json["errors"][0]["kind"], "persistence");
        assert_eq!(json["errors"][0]["message"], "disk full");
        assert!(json["totalAtDrain"].is_null());
    }

    #[test]
    fn test_begin_drain_keeps_first_total() {
        let mut status = CollectionStatus::started(2);
        status.total_messages = 2;
        assert_eq!(status.begin_drain(), 2);
        assert_eq!(status.phase, Phase::Draining);

        status.total_messages = 5;
        assert_eq!(status.begin_drain(), 2);
        assert_eq!(status.total_at_drain, Some(2));
    }

    #[test]
    fn test_error_record_display() {
        let record = ErrorRecord::new(ErrorKind::Transport, "connection reset");
        assert_eq!(record.to_string(), "transport: connection reset");
    }

    #[test]
    fn test_cell_update_and_snapshot() {
        let cell = StatusCell::new(CollectionStatus::started(2));
        let reached = cell.update(|s| {
            s.total_messages = 2;
            s.target_reached()
        });
        assert!(reached);

        cell.record_error(ErrorKind::Protocol, "oversized header");
        let first = cell.snapshot();
        let second = cell.snapshot();
        assert_eq!(first, second);
        assert_eq!(first.errors.len(), 1);
    }

    #[test]
    fn test_cell_survives_poisoning() {
        let cell = std::sync::Arc::new(StatusCell::new(CollectionStatus::idle(1)));
        let poisoner = cell.clone();
        let _ = std::thread::spawn(move || {
            poisoner.update(|_| panic!("poison"));
        })
        .join();

        assert_eq!(cell.phase(), Phase::Idle);
    }
}
