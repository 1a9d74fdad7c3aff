//! Persistence module - storage adapters and the persistence worker.
//!
//! Decoded frames flow from the session into a bounded queue; a worker task
//! hands them to a [`Sink`] one at a time. Sink failures are reported back to
//! the session and never interrupt the collection.

mod queue;
mod sink;

pub use queue::{spawn_persist_task, PersistHandle, PersistStats, DEFAULT_QUEUE_CAPACITY};
pub use sink::{BoxFuture, FileSink, MemorySink, Sink, StoredRecord};
