//! Supervision of a full benchmark run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use lsmbench_engine::SharedEngine;
use tokio_util::sync::CancellationToken;

use crate::metrics::BenchMetrics;
use crate::settings::WorkloadSettings;
use crate::writer::WriterWorker;
use crate::{Error, Result};

/// Totals of a run that ended through cancellation or its epoch limit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Completed epochs per writer, by writer index.
    pub epochs: Vec<u64>,
    /// Total number of records written.
    pub inserted: u64,
    /// Cumulative time spent in insert and apply calls.
    pub insert_time: Duration,
    /// Cumulative time spent compacting.
    pub compact_time: Duration,
}

/// Runs `settings.writers` writers against `engine` until they stop.
///
/// Each writer runs on its own thread named `writer-<index>`. Writers stop at the next epoch
/// boundary once `cancel` fires, or after `settings.epochs` epochs.
///
/// The first writer error cancels the token and is returned immediately, without waiting for the
/// remaining writers. The caller decides how to terminate; the engine is not closed here.
pub fn run(
    engine: SharedEngine,
    metrics: Arc<BenchMetrics>,
    settings: &WorkloadSettings,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    settings.validate()?;

    tracing::info!(
        engine = engine.name(),
        writers = settings.writers,
        batch_size = settings.batch_size,
        submission = ?settings.submission,
        durability = ?settings.durability(),
        compaction = settings.compaction,
        "starting writers"
    );

    let (sender, receiver) = mpsc::channel();

    for index in 0..settings.writers {
        let worker = match WriterWorker::new(index, engine.clone(), metrics.clone(), settings) {
            Ok(worker) => worker,
            Err(error) => {
                cancel.cancel();
                return Err(error);
            }
        };

        let sender = sender.clone();
        let worker_cancel = cancel.clone();
        let epochs = settings.epochs;

        let spawned = thread::Builder::new()
            .name(format!("writer-{}", worker.index()))
            .spawn(move || {
                let work = || worker.run(&worker_cancel, epochs);
                let result = panic::catch_unwind(AssertUnwindSafe(work))
                    .unwrap_or(Err(Error::WorkerPanicked { index }));
                sender.send((index, result)).ok();
            });

        if let Err(error) = spawned {
            cancel.cancel();
            return Err(Error::Spawn(error));
        }
    }

    // Only the writers hold senders now.
    drop(sender);

    let mut epochs = vec![None; settings.writers];
    while epochs.iter().any(Option::is_none) {
        let Ok((index, result)) = receiver.recv() else {
            break;
        };

        match result {
            Ok(completed) => {
                tracing::debug!(writer = index, epochs = completed, "writer finished");
                epochs[index] = Some(completed);
            }
            Err(error @ Error::WorkerPanicked { .. }) => {
                tracing::error!(writer = index, "writer panicked");
                cancel.cancel();
                return Err(error);
            }
            Err(error) => {
                tracing::error!(
                    writer = index,
                    error = &error as &dyn std::error::Error,
                    "writer failed"
                );
                cancel.cancel();
                return Err(Error::Worker {
                    index,
                    source: Box::new(error),
                });
            }
        }
    }

    if let Some(index) = epochs.iter().position(Option::is_none) {
        cancel.cancel();
        return Err(Error::WorkerPanicked { index });
    }

    let summary = RunSummary {
        epochs: epochs.into_iter().flatten().collect(),
        inserted: metrics.inserted(),
        insert_time: metrics.insert_time(),
        compact_time: metrics.compact_time(),
    };

    tracing::info!(
        epochs = ?summary.epochs,
        inserted = summary.inserted,
        insert_time = ?summary.insert_time,
        compact_time = ?summary.compact_time,
        "writers stopped"
    );

    Ok(summary)
}
