use std::fmt;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};

use crate::{Durability, Engine, EngineError, EngineResult, MetricsSnapshot, WriteBatch};

/// Name of the single partition all benchmark keys are written into.
const PARTITION: &str = "bench";

/// An [`Engine`] backed by a fjall keyspace in a local directory.
pub struct FjallEngine {
    path: PathBuf,
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallEngine {
    /// Opens or creates the keyspace at `path`.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let open_err = |cause| EngineError::Open {
            path: path.display().to_string(),
            cause,
        };

        let keyspace = Config::new(path).open().map_err(open_err)?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .map_err(open_err)?;

        tracing::debug!(path = %path.display(), "opened fjall keyspace");
        Ok(Self {
            path: path.into(),
            keyspace,
            partition,
        })
    }

    /// The directory this engine persists into.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, durability: Durability) -> EngineResult<()> {
        if durability == Durability::Sync {
            self.keyspace.persist(PersistMode::SyncAll)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FjallEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FjallEngine")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Engine for FjallEngine {
    fn name(&self) -> &'static str {
        "fjall"
    }

    fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> EngineResult<()> {
        self.partition.insert(key, value)?;
        self.persist(durability)
    }

    fn apply(&self, batch: WriteBatch, durability: Durability) -> EngineResult<()> {
        let mut native = self.keyspace.batch();
        for (key, value) in batch {
            native.insert(&self.partition, key, value);
        }
        native.commit()?;
        self.persist(durability)
    }

    fn compact(&self, start: &[u8], end: &[u8], parallel: bool) -> EngineResult<()> {
        // fjall compacts whole partitions; the benchmark always asks for the full range.
        tracing::trace!(?start, ?end, parallel, "major compaction");
        self.partition.major_compact()?;
        Ok(())
    }

    fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::new(self.name())
            .field("disk_space", ByteSize::b(self.keyspace.disk_space()))
            .field("write_buffer", ByteSize::b(self.keyspace.write_buffer_size()))
            .field("journals", self.keyspace.journal_count())
            .field("partitions", self.keyspace.partition_count())
            .field("segments", self.partition.segment_count())
            .field("approximate_len", self.partition.approximate_len())
    }

    fn close(&self) -> EngineResult<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        tracing::debug!(path = %self.path.display(), "closed fjall keyspace");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FjallEngine::open(tempdir.path()).unwrap();

        engine.set(b"single", b"value", Durability::Sync).unwrap();

        let mut batch = WriteBatch::new();
        batch.set(b"a".to_vec(), b"1".to_vec());
        batch.set(b"b".to_vec(), b"2".to_vec());
        engine.apply(batch, Durability::NoSync).unwrap();

        assert_eq!(
            engine.partition.get(b"single").unwrap().as_deref(),
            Some(&b"value"[..])
        );
        assert_eq!(
            engine.partition.get(b"b").unwrap().as_deref(),
            Some(&b"2"[..])
        );
        engine.close().unwrap();
    }

    #[test]
    fn compacts_full_range() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FjallEngine::open(tempdir.path()).unwrap();

        for i in 0u64..100 {
            engine
                .set(&i.to_le_bytes(), b"value", Durability::NoSync)
                .unwrap();
        }
        engine.compact(b"", &[0xFF], true).unwrap();

        assert_eq!(
            engine.partition.get(42u64.to_le_bytes()).unwrap().as_deref(),
            Some(&b"value"[..])
        );
    }

    #[test]
    fn reports_metrics() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FjallEngine::open(tempdir.path()).unwrap();

        let snapshot = engine.metrics();
        assert!(snapshot.get("segments").is_some());
        assert!(snapshot.to_string().starts_with("engine: fjall\n"));
    }

    #[test]
    fn debug_shows_path() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FjallEngine::open(tempdir.path()).unwrap();

        assert_eq!(engine.path(), tempdir.path());
        let debug = format!("{engine:?}");
        assert!(debug.starts_with("FjallEngine { path: "));
        assert!(debug.contains(&format!("{:?}", tempdir.path())));
        assert!(debug.ends_with(", .. }"));
    }

    #[test]
    fn open_error_keeps_cause() {
        let tempdir = tempfile::tempdir().unwrap();
        let file = tempdir.path().join("not-a-directory");
        std::fs::write(&file, b"occupied").unwrap();

        let err = FjallEngine::open(&file).unwrap_err();

        let EngineError::Open { path, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(path, &file.display().to_string());
        assert!(std::error::Error::source(&err).is_some());
    }
}
