//! Storage adapters for decoded frames.
//!
//! The [`Sink`] trait is the seam to durable storage. Two adapters ship with
//! the crate:
//! - [`MemorySink`] keeps records in process (tests, embedding callers)
//! - [`FileSink`] writes one file per record into a directory
//!
//! # Example
//!
//! ```ignore
//! use frame_collector::persist::{FileSink, Sink};
//!
//! let sink = FileSink::create("collected").await?;
//! sink.persist(frame).await?;
//!
//! let records = FileSink::load_records("collected").await?;
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;

use crate::error::{CollectorError, Result};
use crate::protocol::{Frame, FrameKind};

/// Boxed future returned by sinks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable destination for decoded frames.
pub trait Sink: Send + Sync + 'static {
    /// Store one frame. An error is recorded by the caller; it never stops
    /// the collection.
    fn persist(&self, frame: Frame) -> BoxFuture<'_, Result<()>>;
}

/// A frame as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl StoredRecord {
    /// Create a record from a format tag and payload.
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

impl From<Frame> for StoredRecord {
    fn from(frame: Frame) -> Self {
        let kind = frame.kind();
        match frame {
            Frame::Ascii { payload } | Frame::Binary { payload, .. } => Self { kind, payload },
        }
    }
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record, in persistence order.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for MemorySink {
    fn persist(&self, frame: Frame) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(StoredRecord::from(frame));
            Ok(())
        })
    }
}

/// File extension of ASCII records.
const ASCII_EXT: &str = "ascii";

/// File extension of binary records.
const BINARY_EXT: &str = "bin";

/// Directory-backed sink.
///
/// Layout: `{dir}/{seq:08}.ascii` and `{dir}/{seq:08}.bin`, where `seq`
/// continues after the highest sequence already present.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    next_seq: AtomicU64,
}

impl FileSink {
    /// Open (and create if missing) a record directory.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let next_seq = list_record_files(&dir)
            .await?
            .last()
            .map_or(0, |(seq, _, _)| seq + 1);

        Ok(Self {
            dir,
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Record directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every record of a directory, in sequence order.
    ///
    /// Files that do not follow the record naming scheme are ignored.
    pub async fn load_records(dir: impl AsRef<Path>) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        for (_, kind, path) in list_record_files(dir.as_ref()).await? {
            let payload = tokio::fs::read(&path).await?;
            records.push(StoredRecord::new(kind, payload));
        }
        Ok(records)
    }
}

impl Sink for FileSink {
    fn persist(&self, frame: Frame) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
            let ext = match frame.kind() {
                FrameKind::Ascii => ASCII_EXT,
                FrameKind::Binary => BINARY_EXT,
            };
            let path = self.dir.join(format!("{seq:08}.{ext}"));
            tokio::fs::write(&path, frame.payload()).await.map_err(|e| {
                CollectorError::Persistence(format!("write {}: {}", path.display(), e))
            })
        })
    }
}

/// Record files of a directory sorted by sequence number.
async fn list_record_files(dir: &Path) -> Result<Vec<(u64, FrameKind, PathBuf)>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some(ASCII_EXT) => FrameKind::Ascii,
            Some(BINARY_EXT) => FrameKind::Binary,
            _ => continue,
        };
        let Some(seq) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
        else {
            continue;
        };
        files.push((seq, kind, path));
    }

    files.sort_by_key(|(seq, _, _)| *seq);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.persist(Frame::ascii(Bytes::from_static(b"first")))
            .await
            .unwrap();
        sink.persist(Frame::binary(Bytes::from_static(&[1, 2])))
            .await
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], StoredRecord::new(FrameKind::Ascii, "first"));
        assert_eq!(records[1].kind, FrameKind::Binary);
    }

    #[test]
    fn test_record_from_frame() {
        let record = StoredRecord::from(Frame::binary(Bytes::from_static(b"xyz")));
        assert_eq!(record.kind, FrameKind::Binary);
        assert_eq!(&record.payload[..], b"xyz");
    }

    #[tokio::test]
    async fn test_file_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::create(dir.path()).await.unwrap();

        sink.persist(Frame::ascii(Bytes::from_static(b"Hello123")))
            .await
            .unwrap();
        sink.persist(Frame::binary(Bytes::from_static(&[0, 0xFF])))
            .await
            .unwrap();

        assert!(dir.path().join("00000000.ascii").exists());
        assert!(dir.path().join("00000001.bin").exists());

        let records = FileSink::load_records(dir.path()).await.unwrap();
        assert_eq!(
            records,
            vec![
                StoredRecord::new(FrameKind::Ascii, "Hello123"),
                StoredRecord::new(FrameKind::Binary, vec![0u8, 0xFF]),
            ]
        );
    }

    #[tokio::test]
    async fn test_file_sink_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        {
            let sink = FileSink::create(dir.path()).await.unwrap();
            sink.persist(Frame::ascii(Bytes::from_static(b"one..")))
                .await
                .unwrap();
        }

        let sink = FileSink::create(dir.path()).await.unwrap();
        sink.persist(Frame::ascii(Bytes::from_static(b"two..")))
            .await
            .unwrap();

        assert!(dir.path().join("00000001.ascii").exists());
        assert_eq!(FileSink::load_records(dir.path()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.txt"), b"notes").unwrap();
        std::fs::write(dir.path().join("abc.bin"), b"x").unwrap();
        std::fs::write(dir.path().join("00000003.bin"), b"x").unwrap();

        let records = FileSink::load_records(dir.path()).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSink::load_records(dir.path().join("missing")).await;
        assert!(matches!(result, Err(CollectorError::Io(_))));
    }
}
