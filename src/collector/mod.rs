//! Collector module - session lifecycle and status.
//!
//! [`CollectionController`] is the entry point. It spawns one session task
//! per `start()`; the session reads the stream, decodes frames, queues them
//! for persistence and drains once the target count is reached.

mod controller;
mod session;
mod status;

pub use controller::CollectionController;
pub use status::{CollectionStatus, ErrorKind, ErrorRecord, Phase};
