//! Collection controller.
//!
//! Owns the session slot of one collector: at most one session runs at a
//! time, `start()` while a session is active fails fast, and status snapshots
//! are served from the shared status cell without waiting on the session.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──► Running ──target / force_stop()──► Draining ──► Idle
//!                      │                                   │
//!                      └──── transport error / close ──────┴──────► Idle
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use frame_collector::{CollectionController, CollectorConfig};
//! use frame_collector::persist::FileSink;
//!
//! let config = CollectorConfig::from_env()?;
//! let sink = Arc::new(FileSink::create("collected").await?);
//! let controller = CollectionController::new(config, sink);
//!
//! controller.start().await?;
//! controller.wait_until_idle().await;
//! println!("{:?}", controller.status());
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

use super::session::{run_session, SessionContext};
use super::status::{CollectionStatus, ErrorKind, Phase, StatusCell};
use crate::config::CollectorConfig;
use crate::control::send_auth;
use crate::error::{CollectorError, Result};
use crate::persist::Sink;
use crate::transport;

/// Handles of the current (or last) session.
struct Slot {
    status: Arc<StatusCell>,
    stop: Arc<Notify>,
    done: watch::Receiver<bool>,
}

impl Slot {
    fn idle(target_messages: u64) -> Self {
        let (_, done) = watch::channel(true);
        Self {
            status: Arc::new(StatusCell::new(CollectionStatus::idle(target_messages))),
            stop: Arc::new(Notify::new()),
            done,
        }
    }
}

/// Session handles reserved by a `start()` call that has not finished yet.
struct Reservation {
    status: Arc<StatusCell>,
    stop: Arc<Notify>,
    done: watch::Sender<bool>,
}

impl Reservation {
    /// Record a failed start and release the controller.
    fn abort(self, err: &CollectorError) {
        warn!(error = %err, "collection start failed");
        self.status.update(|s| {
            s.push_error(ErrorKind::Transport, err.to_string());
            s.set_phase(Phase::Idle);
        });
        let _ = self.done.send(true);
    }
}

struct Inner {
    config: Arc<CollectorConfig>,
    sink: Arc<dyn Sink>,
    slot: Mutex<Slot>,
}

/// Drives collection sessions against one sink.
///
/// Cheap to clone; clones share the same session slot.
#[derive(Clone)]
pub struct CollectionController {
    inner: Arc<Inner>,
}

impl CollectionController {
    pub fn new(config: CollectorConfig, sink: Arc<dyn Sink>) -> Self {
        let slot = Slot::idle(config.target_messages);
        Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                sink,
                slot: Mutex::new(slot),
            }),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.inner.config
    }

    /// Connect to the configured server and start a session.
    ///
    /// # Errors
    ///
    /// - [`CollectorError::AlreadyRunning`] if a session is active; nothing
    ///   changes in that case
    /// - a transport error if connecting or authenticating fails; the error
    ///   is also recorded in the status, which is `Idle` again
    pub async fn start(&self) -> Result<()> {
        let reservation = self.reserve()?;

        let addr = self.inner.config.address();
        info!(%addr, "connecting");
        match transport::connect(&addr, self.inner.config.connect_timeout).await {
            Ok(stream) => self.launch(stream, reservation).await,
            Err(e) => {
                reservation.abort(&e);
                Err(e)
            }
        }
    }

    /// Start a session over an already connected stream.
    ///
    /// Behaves like [`start`](Self::start) after the connect step.
    pub async fn start_with_stream<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let reservation = self.reserve()?;
        self.launch(stream, reservation).await
    }

    /// Snapshot of the current (or last) session.
    pub fn status(&self) -> CollectionStatus {
        self.lock_slot().status.snapshot()
    }

    /// Request an early drain. No effect unless the session is `Running`.
    pub fn force_stop(&self) {
        let slot = self.lock_slot();
        if slot.status.phase() == Phase::Running {
            info!("stop requested");
            slot.stop.notify_one();
        }
    }

    /// Wait until the current session has ended and its frames are flushed.
    ///
    /// Returns immediately when no session was started.
    pub async fn wait_until_idle(&self) {
        let mut done = self.lock_slot().done.clone();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                break;
            }
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for a new session. This is the only `Idle -> Running`
    /// transition, so concurrent callers cannot both pass it.
    fn reserve(&self) -> Result<Reservation> {
        let mut slot = self.lock_slot();
        if slot.status.phase().is_active() {
            return Err(CollectorError::AlreadyRunning);
        }

        let status = Arc::new(StatusCell::new(CollectionStatus::started(
            self.inner.config.target_messages,
        )));
        let stop = Arc::new(Notify::new());
        let (done_tx, done_rx) = watch::channel(false);

        *slot = Slot {
            status: status.clone(),
            stop: stop.clone(),
            done: done_rx,
        };

        Ok(Reservation {
            status,
            stop,
            done: done_tx,
        })
    }

    async fn launch<S>(&self, mut stream: S, reservation: Reservation) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        if let Err(e) = send_auth(&mut stream, &self.inner.config.token).await {
            reservation.abort(&e);
            return Err(e);
        }

        let Reservation { status, stop, done } = reservation;
        let ctx = SessionContext {
            config: self.inner.config.clone(),
            status,
            sink: self.inner.sink.clone(),
            stop,
        };

        tokio::spawn(async move {
            run_session(stream, ctx).await;
            let _ = done.send(true);
        });

        info!(
            target_messages = self.inner.config.target_messages,
            "collection started"
        );
        Ok(())
    }
}
