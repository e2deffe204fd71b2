//! Lifecycle of a benchmark run.

use std::sync::Arc;

use anyhow::{Context, Result};
use lsmbench_engine::{FjallEngine, SharedEngine};
use lsmbench_workload::{BenchMetrics, RunSummary};
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::exporter::{self, Exporter};

/// Opens the engine at the configured path and runs the benchmark against it.
///
/// Returns once the writers stop, either after their configured epochs or after a termination
/// signal. Writer errors are returned without waiting for the remaining writers.
pub async fn bench(config: Config) -> Result<()> {
    let path = config.storage.path.clone();
    let engine = tokio::task::spawn_blocking(move || FjallEngine::open(&path))
        .await?
        .context("failed to open engine")?;

    tracing::info!(path = %engine.path().display(), "engine opened");
    run(Arc::new(engine), config).await.map(drop)
}

/// Runs the workload against `engine` and closes the engine when the writers have stopped.
pub async fn run(engine: SharedEngine, config: Config) -> Result<RunSummary> {
    let metrics = Arc::new(BenchMetrics::new(config.workload.compaction));
    let cancel = CancellationToken::new();

    let exporter = Exporter::new(metrics.clone(), &config.exporter);
    exporter::spawn(exporter, config.exporter.addr, cancel.child_token());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            elegant_departure::get_shutdown_guard().wait().await;
            tracing::info!("shutting down after the current epoch");
            cancel.cancel();
        }
    });

    let mut workers = tokio::task::spawn_blocking({
        let engine = engine.clone();
        let settings = config.workload.clone();
        let cancel = cancel.clone();
        move || lsmbench_workload::run(engine, metrics, &settings, cancel)
    });

    let departure = async {
        elegant_departure::tokio::depart()
            .on_termination()
            .on_sigint()
            .on_signal(SignalKind::hangup())
            .on_signal(SignalKind::quit())
            .await
    };

    let result = tokio::select! {
        result = &mut workers => result,
        _ = departure => workers.await,
    };

    let summary = result
        .context("writer supervisor panicked")?
        .context("benchmark aborted")?;

    // Stops the exporter if the writers ran out of epochs.
    cancel.cancel();

    tokio::task::spawn_blocking(move || engine.close())
        .await?
        .context("failed to close engine")?;

    tracing::info!("engine closed");
    Ok(summary)
}
