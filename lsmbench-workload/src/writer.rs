//! A single writer and its epoch loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lsmbench_engine::{Durability, SharedEngine, WriteBatch};
use tokio_util::sync::CancellationToken;

use crate::compaction::{COMPACT_END, COMPACT_START};
use crate::key::{Prefixes, make_key};
use crate::metrics::BenchMetrics;
use crate::payload::Payloads;
use crate::report::StatsReporter;
use crate::Result;
use crate::settings::{Submission, WorkloadSettings};

/// Outcome of the insert phase of one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochStats {
    /// Index of the writer.
    pub writer: usize,
    /// Zero-based epoch number of the writer.
    pub epoch: u64,
    /// The key prefix shared by all records of the epoch.
    pub prefix: u64,
    /// Number of records written.
    pub inserted: u64,
    /// Time spent writing the records.
    pub insert_time: Duration,
}

/// Writes epochs of synthetic records into the engine.
///
/// Every epoch writes `batch_size` records under a fresh prefix, records the elapsed time and the
/// number of records in [`BenchMetrics`], prints a report and, if this writer is the compacting
/// one, compacts the full key range.
#[derive(Debug)]
pub struct WriterWorker {
    index: usize,
    engine: SharedEngine,
    metrics: Arc<BenchMetrics>,
    batch_size: u64,
    submission: Submission,
    durability: Durability,
    compacts: bool,
    prefixes: Prefixes,
    payloads: Payloads,
    reporter: StatsReporter,
    epoch: u64,
}

impl WriterWorker {
    /// Creates the writer with index `index` for the given settings.
    pub fn new(
        index: usize,
        engine: SharedEngine,
        metrics: Arc<BenchMetrics>,
        settings: &WorkloadSettings,
    ) -> Result<Self> {
        Ok(Self {
            index,
            engine,
            metrics,
            batch_size: settings.batch_size,
            submission: settings.submission,
            durability: settings.durability(),
            compacts: settings.compaction_policy().compacts(index),
            prefixes: Prefixes::new(settings.prefixes, settings.writers, index),
            payloads: Payloads::new(settings.values)?,
            reporter: StatsReporter::new(settings.epoch_timings),
            epoch: 0,
        })
    }

    /// The index of this writer.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this writer compacts after each epoch.
    pub fn compacts(&self) -> bool {
        self.compacts
    }

    /// Runs epochs until `cancel` fires or `epochs` epochs have completed.
    ///
    /// The token is checked between epochs only; an epoch in progress always completes. Returns the
    /// number of completed epochs, or the first error, which ends the loop.
    pub fn run(mut self, cancel: &CancellationToken, epochs: Option<u64>) -> Result<u64> {
        tracing::debug!(writer = self.index, compacts = self.compacts, "writer started");

        let mut completed = 0;
        while !cancel.is_cancelled() && epochs.is_none_or(|max| completed < max) {
            self.run_epoch()?;
            completed += 1;
        }

        tracing::debug!(writer = self.index, epochs = completed, "writer stopped");
        Ok(completed)
    }

    /// Writes one epoch.
    pub fn run_epoch(&mut self) -> Result<EpochStats> {
        let prefix = self.prefixes.next_prefix();
        let insert_time = match self.submission {
            Submission::Batched => self.insert_batched(prefix)?,
            Submission::Individual => self.insert_individually(prefix)?,
        };

        let stats = EpochStats {
            writer: self.index,
            epoch: self.epoch,
            prefix,
            inserted: self.batch_size,
            insert_time,
        };
        self.epoch += 1;

        self.reporter.report(&stats, &self.engine.metrics());

        if self.compacts {
            let elapsed = self.compact()?;
            self.reporter.report_compaction(&stats, elapsed);
        }

        Ok(stats)
    }

    fn insert_batched(&mut self, prefix: u64) -> Result<Duration> {
        let start = Instant::now();

        let mut batch = WriteBatch::with_capacity(self.batch_size as usize);
        for sequence in 0..self.batch_size {
            batch.set(make_key(prefix, sequence), self.payloads.make_value()?);
        }
        self.engine.apply(batch, self.durability)?;

        let elapsed = start.elapsed();
        self.metrics.record_insert_time(elapsed);
        self.metrics.record_inserted(self.batch_size);
        Ok(elapsed)
    }

    fn insert_individually(&mut self, prefix: u64) -> Result<Duration> {
        let mut total = Duration::ZERO;

        for sequence in 0..self.batch_size {
            let key = make_key(prefix, sequence);
            let value = self.payloads.make_value()?;

            let start = Instant::now();
            self.engine.set(&key, &value, self.durability)?;
            let elapsed = start.elapsed();

            self.metrics.record_insert_time(elapsed);
            self.metrics.record_inserted(1);
            total += elapsed;
        }

        Ok(total)
    }

    fn compact(&self) -> Result<Duration> {
        let start = Instant::now();
        self.engine.compact(COMPACT_START, COMPACT_END, true)?;
        let elapsed = start.elapsed();

        self.metrics.record_compact_time(elapsed);
        Ok(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use lsmbench_engine::{EngineError, InMemoryEngine, Operation};

    use super::*;
    use crate::Error;
    use crate::key::{PrefixStrategy, split_key};
    use crate::payload::ValueMode;

    fn settings(batch_size: u64) -> WorkloadSettings {
        WorkloadSettings {
            batch_size,
            values: ValueMode::Constant,
            ..Default::default()
        }
    }

    fn worker(
        engine: &InMemoryEngine,
        settings: &WorkloadSettings,
    ) -> (WriterWorker, Arc<BenchMetrics>) {
        let metrics = Arc::new(BenchMetrics::new(settings.compaction));
        let engine = Arc::new(engine.clone());
        let worker = WriterWorker::new(0, engine, metrics.clone(), settings).unwrap();
        (worker, metrics)
    }

    #[test]
    fn two_batched_epochs() {
        let engine = InMemoryEngine::new();
        let (worker, metrics) = worker(&engine, &settings(10));

        let completed = worker.run(&CancellationToken::new(), Some(2)).unwrap();
        assert_eq!(completed, 2);

        let batches = engine.applied_batches();
        assert_eq!(batches.len(), 2);
        for batch in &batches {
            let distinct: HashSet<_> = batch.iter().collect();
            assert_eq!(distinct.len(), 10);
        }
        assert_eq!(engine.apply_durabilities(), vec![Durability::NoSync; 2]);
        assert_eq!(engine.set_calls(), 0);
        assert_eq!(engine.len(), 20);
        assert_eq!(metrics.inserted(), 20);
    }

    #[test]
    fn batch_keys_share_the_epoch_prefix() {
        let engine = InMemoryEngine::new();
        let (mut worker, _) = worker(&engine, &settings(5));

        let stats = worker.run_epoch().unwrap();
        let batch = &engine.applied_batches()[0];
        let decoded: Vec<_> = batch.iter().map(|key| split_key(key).unwrap()).collect();

        assert_eq!(
            decoded,
            (0..5).map(|sequence| (stats.prefix, sequence)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn individual_writes_count_every_record() {
        let engine = InMemoryEngine::new();
        let settings = WorkloadSettings {
            submission: Submission::Individual,
            ..settings(10)
        };
        let (mut worker, metrics) = worker(&engine, &settings);

        let stats = worker.run_epoch().unwrap();

        assert_eq!(stats.inserted, 10);
        assert_eq!(engine.set_calls(), 10);
        assert_eq!(engine.set_durabilities(), vec![Durability::Sync; 10]);
        assert!(engine.applied_batches().is_empty());
        assert_eq!(metrics.inserted(), 10);
        // Every call accounts at least one nanosecond.
        assert!(metrics.insert_time() >= Duration::from_nanos(10));
    }

    #[test]
    fn insert_time_strictly_increases() {
        let engine = InMemoryEngine::with_latency(Duration::from_millis(1));
        let (mut worker, metrics) = worker(&engine, &settings(3));

        let mut last = metrics.insert_time();
        for _ in 0..3 {
            worker.run_epoch().unwrap();
            let now = metrics.insert_time();
            assert!(now > last);
            last = now;
        }
        assert!(last >= Duration::from_millis(3));
    }

    #[test]
    fn compacts_after_every_epoch() {
        let engine = InMemoryEngine::new();
        let settings = WorkloadSettings {
            compaction: true,
            ..settings(4)
        };
        let (worker, metrics) = worker(&engine, &settings);
        assert!(worker.compacts());

        worker.run(&CancellationToken::new(), Some(3)).unwrap();

        assert_eq!(engine.compact_calls(), 3);
        assert!(metrics.compact_time() > Duration::ZERO);
    }

    #[test]
    fn never_compacts_when_disabled() {
        let engine = InMemoryEngine::new();
        let (worker, _) = worker(&engine, &settings(4));

        worker.run(&CancellationToken::new(), Some(5)).unwrap();

        assert_eq!(engine.applied_batches().len(), 5);
        assert_eq!(engine.compact_calls(), 0);
    }

    #[test]
    fn stops_at_epoch_boundary_when_cancelled() {
        let engine = InMemoryEngine::new();
        let (worker, _) = worker(&engine, &settings(4));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(worker.run(&cancel, None).unwrap(), 0);
        assert!(engine.is_empty());
    }

    #[test]
    fn engine_errors_end_the_loop() {
        let engine = InMemoryEngine::failing(Operation::Apply);
        let (worker, metrics) = worker(&engine, &settings(4));

        let err = worker.run(&CancellationToken::new(), None).unwrap_err();

        assert!(matches!(
            err,
            Error::Engine(EngineError::Injected(Operation::Apply))
        ));
        assert_eq!(metrics.inserted(), 0);
    }

    #[test]
    fn counter_prefixes_for_secondary_writer() {
        let engine = InMemoryEngine::new();
        let settings = WorkloadSettings {
            writers: 2,
            prefixes: PrefixStrategy::Auto,
            ..settings(2)
        };
        let metrics = Arc::new(BenchMetrics::new(false));
        let mut worker = WriterWorker::new(1, Arc::new(engine), metrics, &settings).unwrap();
        assert_eq!(worker.index(), 1);

        let first = worker.run_epoch().unwrap();
        let second = worker.run_epoch().unwrap();

        assert_eq!(first.prefix, 1 << 40);
        assert_eq!(second.prefix, (1 << 40) + 1);
        assert_eq!(second.epoch, 1);
    }
}
