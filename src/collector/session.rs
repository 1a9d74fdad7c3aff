//! One collection session over a connected stream.
//!
//! Drives the read loop, feeds the scanner, hands frames to the persistence
//! worker and runs the drain sequence once the target is reached or a stop
//! is requested.
//!
//! # Architecture
//!
//! ```text
//! read ─► FrameScanner ─► validate ─► PersistHandle ─► Persist Task ─► Sink
//!                                         │
//!                                         └─► counters / completion check
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::status::{ErrorKind, Phase, StatusCell};
use crate::config::CollectorConfig;
use crate::control::send_status;
use crate::error::CollectorError;
use crate::persist::{spawn_persist_task, PersistHandle, Sink};
use crate::protocol::{Frame, FrameKind, FrameScanner, ScanEvent};
use crate::validation::validate_frame;

/// Everything a session task needs from its controller.
pub(crate) struct SessionContext {
    pub config: Arc<CollectorConfig>,
    pub status: Arc<StatusCell>,
    pub sink: Arc<dyn Sink>,
    pub stop: Arc<Notify>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainReason {
    TargetReached,
    Stopped,
}

#[derive(Debug)]
enum SessionEnd {
    /// Remote closed the stream while collecting.
    Closed,
    /// Remote closed the stream during the drain.
    Drained,
    DrainTimeout,
    Failed(CollectorError),
}

struct Session<S> {
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    scanner: FrameScanner,
    persist: PersistHandle,
    read_buf: Vec<u8>,
    config: Arc<CollectorConfig>,
    status: Arc<StatusCell>,
    stop: Arc<Notify>,
}

/// Run a session to completion. The status is `Idle` and every queued frame
/// has reached the sink when this returns.
pub(crate) async fn run_session<S>(stream: S, ctx: SessionContext)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (reader, writer) = tokio::io::split(stream);

    let failures = ctx.status.clone();
    let (persist, persist_task) = spawn_persist_task(
        ctx.sink,
        ctx.config.persist_queue_capacity,
        move |kind, err| {
            failures.record_error(
                ErrorKind::Persistence,
                format!("failed to persist {kind} frame: {err}"),
            );
        },
    );

    let mut session = Session {
        reader,
        writer,
        scanner: FrameScanner::with_max_declared_len(ctx.config.limits.max_binary_len),
        persist,
        read_buf: vec![0u8; ctx.config.read_buffer_size.max(1)],
        config: ctx.config,
        status: ctx.status,
        stop: ctx.stop,
    };

    let end = session.run().await;
    let Session {
        mut writer,
        persist,
        status,
        scanner,
        ..
    } = session;

    match &end {
        SessionEnd::Failed(e) => {
            error!(error = %e, "transport failure, aborting session");
            status.record_error(ErrorKind::Transport, e.to_string());
        }
        other => {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "shutdown of write half failed");
            }
            info!(end = ?other, "session closed");
        }
    }
    drop(writer);

    status.update(|s| s.set_phase(Phase::Idle));
    if scanner.pending_len() > 0 {
        debug!(
            pending = scanner.pending_len(),
            "incomplete frame discarded at session end"
        );
    }

    debug!(pending = persist.pending_count(), "flushing persistence");
    drop(persist);
    match persist_task.await {
        Ok(stats) => info!(
            persisted = stats.persisted,
            failed = stats.failed,
            "persistence flushed"
        ),
        Err(e) => warn!(error = %e, "persistence worker did not finish"),
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn run(&mut self) -> SessionEnd {
        let reason = loop {
            tokio::select! {
                biased;
                _ = self.stop.notified() => break DrainReason::Stopped,
                read = self.reader.read(&mut self.read_buf) => match read {
                    Ok(0) => return SessionEnd::Closed,
                    Ok(n) => {
                        if self.ingest(n).await {
                            break DrainReason::TargetReached;
                        }
                    }
                    Err(e) => return SessionEnd::Failed(e.into()),
                },
            }
        };

        self.drain(reason).await
    }

    /// Decode `read_buf[..n]`. Returns true when this chunk moved the
    /// session from `Running` to `Draining`.
    async fn ingest(&mut self, n: usize) -> bool {
        let events = self.scanner.push(&self.read_buf[..n]);
        let mut reached = false;

        for event in events {
            match event {
                ScanEvent::Frame(frame) => {
                    reached |= self.handle_frame(frame).await;
                }
                ScanEvent::RejectedHeader { declared_len } => {
                    let limit = self.scanner.max_declared_len();
                    warn!(declared_len, limit, "binary header rejected");
                    self.status.record_error(
                        ErrorKind::Protocol,
                        format!("binary header declares {declared_len} bytes, limit is {limit}"),
                    );
                }
            }
        }

        let stats = self.scanner.stats();
        self.status.update(|s| {
            s.discarded_bytes = stats.discarded_bytes;
            s.rejected_binary_headers = stats.rejected_headers;
        });

        reached
    }

    async fn handle_frame(&mut self, frame: Frame) -> bool {
        let kind = frame.kind();
        let len = frame.payload_len();
        let verdict = validate_frame(&frame, &self.config.limits);

        match kind {
            FrameKind::Ascii if !verdict.is_valid() => {
                let reason = verdict.errors.join("; ");
                warn!(len, %reason, "invalid ascii frame dropped");
                let report = self.config.report_invalid_ascii;
                self.status.update(|s| {
                    s.invalid_ascii_dropped += 1;
                    if report {
                        s.push_error(
                            ErrorKind::Validation,
                            format!("ascii frame dropped: {reason}"),
                        );
                    }
                });
                return false;
            }
            FrameKind::Ascii => {}
            FrameKind::Binary => {
                if !verdict.is_valid() {
                    warn!(len, reason = %verdict.errors.join("; "), "invalid binary frame");
                }
                if verdict.has_warnings() {
                    warn!(len, "large binary frame");
                }
                self.status.update(|s| {
                    if !verdict.is_valid() {
                        s.binary_validation_failures += 1;
                    }
                    if verdict.has_warnings() {
                        s.large_binary_warnings += 1;
                    }
                });
            }
        }

        if let Err(e) = self.persist.submit(frame).await {
            warn!(%kind, error = %e, "frame not queued");
            self.status
                .record_error(ErrorKind::Persistence, format!("{kind} frame not queued: {e}"));
            return false;
        }
        debug!(%kind, len, "frame queued");

        self.status.update(|s| {
            match kind {
                FrameKind::Ascii => s.ascii_messages += 1,
                FrameKind::Binary => s.binary_messages += 1,
            }
            s.total_messages += 1;

            if s.phase == Phase::Running && s.target_reached() {
                s.begin_drain();
                true
            } else {
                false
            }
        })
    }

    async fn drain(&mut self, reason: DrainReason) -> SessionEnd {
        let total = self.status.update(|s| s.begin_drain());
        info!(?reason, total, "draining session");

        if let Err(e) = send_status(&mut self.writer).await {
            return SessionEnd::Failed(e);
        }

        let timeout: Duration = self.config.drain_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            // Only the wait for data is bounded; a chunk already read is
            // always decoded and queued in full.
            let next = tokio::time::timeout_at(deadline, self.reader.read(&mut self.read_buf));
            let read = match next.await {
                Ok(read) => read,
                Err(_) => {
                    info!(?timeout, "drain timeout elapsed");
                    return SessionEnd::DrainTimeout;
                }
            };
            match read {
                Ok(0) => return SessionEnd::Drained,
                Ok(n) => {
                    self.ingest(n).await;
                }
                Err(e) => return SessionEnd::Failed(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::status::CollectionStatus;
    use crate::persist::{BoxFuture, MemorySink};
    use crate::protocol::{build_ascii_frame, build_binary_frame};
    use tokio::io::duplex;
    use tokio::sync::Semaphore;

    /// Sink that holds every frame until the test opens the gate.
    struct GatedSink {
        gate: Semaphore,
        inner: MemorySink,
    }

    impl GatedSink {
        fn closed() -> Self {
            Self {
                gate: Semaphore::new(0),
                inner: MemorySink::new(),
            }
        }
    }

    impl Sink for GatedSink {
        fn persist(&self, frame: Frame) -> BoxFuture<'_, crate::Result<()>> {
            Box::pin(async move {
                self.gate
                    .acquire()
                    .await
                    .map_err(|e| CollectorError::Persistence(e.to_string()))?
                    .forget();
                self.inner.persist(frame).await
            })
        }
    }

    struct Harness {
        status: Arc<StatusCell>,
        sink: Arc<MemorySink>,
        stop: Arc<Notify>,
    }

    fn spawn(
        config: CollectorConfig,
        stream: tokio::io::DuplexStream,
    ) -> (Harness, tokio::task::JoinHandle<()>) {
        let sink = Arc::new(MemorySink::new());
        let (status, stop, task) = spawn_with_sink(config, stream, sink.clone());
        (Harness { status, sink, stop }, task)
    }

    fn spawn_with_sink(
        config: CollectorConfig,
        stream: tokio::io::DuplexStream,
        sink: Arc<dyn Sink>,
    ) -> (Arc<StatusCell>, Arc<Notify>, tokio::task::JoinHandle<()>) {
        let status = Arc::new(StatusCell::new(CollectionStatus::started(
            config.target_messages,
        )));
        let stop = Arc::new(Notify::new());
        let ctx = SessionContext {
            config: Arc::new(config),
            status: status.clone(),
            sink,
            stop: stop.clone(),
        };
        let task = tokio::spawn(run_session(stream, ctx));
        (status, stop, task)
    }

    #[tokio::test]
    async fn test_remote_close_ends_session() {
        let (client, mut server) = duplex(1024);
        let (h, task) = spawn(CollectorConfig::default(), client);

        server.write_all(b"$Hello123;").await.unwrap();
        server.write_all(&build_binary_frame(b"abcde")).await.unwrap();
        drop(server);
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.phase, Phase::Idle);
        assert!(!status.running);
        assert_eq!(status.ascii_messages, 1);
        assert_eq!(status.binary_messages, 1);
        assert_eq!(status.total_messages, 2);
        assert!(status.errors.is_empty());
        assert_eq!(h.sink.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_ascii_reported_when_enabled() {
        let (client, mut server) = duplex(1024);
        let config = CollectorConfig::default().with_report_invalid_ascii(true);
        let (h, task) = spawn(config, client);

        server.write_all(b"$ab;").await.unwrap();
        drop(server);
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.total_messages, 0);
        assert_eq!(status.invalid_ascii_dropped, 1);
        assert_eq!(status.errors.len(), 1);
        assert_eq!(status.errors[0].kind, ErrorKind::Validation);
        assert!(h.sink.is_empty());
    }

    #[tokio::test]
    async fn test_empty_binary_persisted_and_counted_invalid() {
        let (client, mut server) = duplex(1024);
        let (h, task) = spawn(CollectorConfig::default(), client);

        server.write_all(&build_binary_frame(b"")).await.unwrap();
        drop(server);
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.binary_messages, 1);
        assert_eq!(status.binary_validation_failures, 1);
        assert_eq!(h.sink.len(), 1);
    }

    #[tokio::test]
    async fn test_large_binary_warning_counted() {
        let (client, mut server) = duplex(1024);
        let mut config = CollectorConfig::default();
        config.limits.large_binary_warning = 4;
        let (h, task) = spawn(config, client);

        server.write_all(&build_binary_frame(b"abcdefgh")).await.unwrap();
        drop(server);
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.large_binary_warnings, 1);
        assert_eq!(status.binary_validation_failures, 0);
    }

    #[tokio::test]
    async fn test_oversized_header_is_protocol_error() {
        let (client, mut server) = duplex(1024);
        let mut config = CollectorConfig::default();
        config.limits.max_binary_len = 16;
        let (h, task) = spawn(config, client);

        server
            .write_all(&[0xAA, 0, 0, 0, 1, 0])
            .await
            .unwrap();
        server.write_all(b"$Hello;").await.unwrap();
        drop(server);
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.rejected_binary_headers, 1);
        assert_eq!(status.errors[0].kind, ErrorKind::Protocol);
        assert_eq!(status.ascii_messages, 1);
    }

    #[tokio::test]
    async fn test_target_sends_status_and_drains() {
        let (client, mut server) = duplex(4096);
        let config = CollectorConfig::default().with_target_messages(2);
        let (h, task) = spawn(config, client);

        let mut input = build_ascii_frame(b"first");
        input.extend_from_slice(&build_ascii_frame(b"second"));
        server.write_all(&input).await.unwrap();

        let mut command = [0u8; 6];
        server.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"STATUS");
        assert_eq!(h.status.phase(), Phase::Draining);

        // Frames after the termination command are still collected.
        server.write_all(b"$trailing;").await.unwrap();
        drop(server);
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.total_messages, 3);
        assert_eq!(h.sink.len(), 3);
    }

    #[tokio::test]
    async fn test_stop_request_drains() {
        let (client, mut server) = duplex(1024);
        let (h, task) = spawn(CollectorConfig::default(), client);

        h.stop.notify_one();

        let mut command = [0u8; 6];
        server.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"STATUS");

        drop(server);
        task.await.unwrap();
        assert_eq!(h.status.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout() {
        let (client, mut server) = duplex(1024);
        let config = CollectorConfig::default()
            .with_target_messages(1)
            .with_drain_timeout(Duration::from_secs(5));
        let (h, task) = spawn(config, client);

        server.write_all(b"$Hello;").await.unwrap();
        let mut command = [0u8; 6];
        server.read_exact(&mut command).await.unwrap();

        // Server stays silent and keeps the connection open.
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.phase, Phase::Idle);
        assert!(status.errors.is_empty());
        drop(server);
    }

    #[tokio::test]
    async fn test_drain_starts_exactly_at_target() {
        let (client, mut server) = duplex(4096);
        let config = CollectorConfig::default().with_target_messages(10);
        let (h, task) = spawn(config, client);

        let mut input = Vec::new();
        for i in 0..12 {
            input.extend(build_ascii_frame(format!("frame-{i:02}").as_bytes()));
        }
        server.write_all(&input).await.unwrap();

        let mut command = [0u8; 6];
        server.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"STATUS");
        drop(server);
        task.await.unwrap();

        let status = h.status.snapshot();
        assert_eq!(status.total_at_drain, Some(10));
        assert_eq!(status.total_messages, 12);
        assert_eq!(h.sink.len(), 12);
    }

    #[tokio::test]
    async fn test_stop_records_total_at_drain() {
        let (client, mut server) = duplex(1024);
        let (h, task) = spawn(CollectorConfig::default(), client);

        h.stop.notify_one();
        let mut command = [0u8; 6];
        server.read_exact(&mut command).await.unwrap();
        drop(server);
        task.await.unwrap();

        assert_eq!(h.status.snapshot().total_at_drain, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_keeps_frames_already_read() {
        let (client, mut server) = duplex(4096);
        let config = CollectorConfig::default()
            .with_target_messages(1)
            .with_persist_queue_capacity(1)
            .with_drain_timeout(Duration::from_millis(100));
        let sink = Arc::new(GatedSink::closed());
        let (status, _stop, task) = spawn_with_sink(config, client, sink.clone());

        server.write_all(b"$Hello;").await.unwrap();
        let mut command = [0u8; 6];
        server.read_exact(&mut command).await.unwrap();

        // Five frames in one chunk; the queue fills while they are handed over.
        let mut burst = Vec::new();
        for i in 0..5 {
            burst.extend(build_ascii_frame(format!("late-{i}").as_bytes()));
        }
        server.write_all(&burst).await.unwrap();

        // Let the drain deadline pass while the sink is still blocked.
        tokio::time::sleep(Duration::from_millis(500)).await;
        sink.gate.add_permits(16);
        task.await.unwrap();

        let status = status.snapshot();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.total_messages, 6);
        assert!(status.errors.is_empty());
        assert_eq!(sink.inner.len(), 6);
        drop(server);
    }
}
