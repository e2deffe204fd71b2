//! This is the write workload that drives sustained pressure against a storage [`Engine`].
//!
//! A run consists of a fixed number of [`WriterWorker`]s, each on its own thread, repeatedly
//! writing *epochs*: a batch of synthetic keys sharing one unique prefix, followed by a console
//! report of the engine's internal metrics and, for at most one worker, a full-range compaction.
//!
//! Throughput and latency are accumulated into the shared [`BenchMetrics`], which the server
//! exposes for scraping.
//!
//! [`Engine`]: lsmbench_engine::Engine
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod compaction;
pub mod key;
pub mod metrics;
pub mod payload;
pub mod report;
pub mod run;
pub mod settings;
pub mod writer;

mod error;

pub use crate::error::{Error, Result};
pub use crate::metrics::BenchMetrics;
pub use crate::run::{RunSummary, run};
pub use crate::settings::{Submission, WorkloadSettings};
pub use crate::writer::{EpochStats, WriterWorker};
