//! Persistence worker fed through a bounded channel.
//!
//! The decode loop never awaits the sink directly. Frames are queued and a
//! dedicated task stores them in arrival order:
//!
//! ```text
//! Session ─► mpsc::Sender<Frame> ─► Persist Task ─► Sink
//! ```
//!
//! A full queue suspends the submitter, so a slow sink slows the reads down
//! instead of growing memory without bound.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::sink::Sink;
use crate::error::{CollectorError, Result};
use crate::protocol::{Frame, FrameKind};

/// Default channel capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Totals reported by the worker when its queue closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub persisted: u64,
    pub failed: u64,
}

/// Handle for queueing frames to the persistence task.
#[derive(Clone)]
pub struct PersistHandle {
    tx: mpsc::Sender<Frame>,
    pending: Arc<AtomicUsize>,
}

impl PersistHandle {
    /// Queue a frame, waiting while the queue is full.
    pub async fn submit(&self, frame: Frame) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(frame).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            CollectorError::Persistence("persistence worker stopped".into())
        })
    }

    /// Frames queued but not yet handed back by the sink.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the persistence task.
///
/// `on_failure` runs on the worker for every frame the sink rejected. The
/// task ends once every [`PersistHandle`] is dropped and the queue is empty.
pub fn spawn_persist_task<F>(
    sink: Arc<dyn Sink>,
    capacity: usize,
    on_failure: F,
) -> (PersistHandle, JoinHandle<PersistStats>)
where
    F: FnMut(FrameKind, CollectorError) + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = PersistHandle {
        tx,
        pending: pending.clone(),
    };
    let task = tokio::spawn(persist_loop(rx, sink, pending, on_failure));

    (handle, task)
}

async fn persist_loop<F>(
    mut rx: mpsc::Receiver<Frame>,
    sink: Arc<dyn Sink>,
    pending: Arc<AtomicUsize>,
    mut on_failure: F,
) -> PersistStats
where
    F: FnMut(FrameKind, CollectorError),
{
    let mut stats = PersistStats::default();

    while let Some(frame) = rx.recv().await {
        let kind = frame.kind();
        let len = frame.payload_len();

        match sink.persist(frame).await {
            Ok(()) => {
                stats.persisted += 1;
                debug!(%kind, len, "frame persisted");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(%kind, len, error = %e, "failed to persist frame");
                on_failure(kind, e);
            }
        }

        pending.fetch_sub(1, Ordering::Release);
    }

    debug!(
        persisted = stats.persisted,
        failed = stats.failed,
        "persist queue closed"
    );
    stats
}
