//! The engine layer abstracts the ordered key-value store that the benchmark writes into.
//!
//! Writers only talk to the storage engine through the [`Engine`] trait. The production
//! implementation is [`FjallEngine`], an LSM-tree engine persisted to a local directory. Tests use
//! the [`InMemoryEngine`], which records every call so that the workload can be asserted on
//! without touching the filesystem.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod backend;
mod batch;
mod error;
mod snapshot;

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use backend::fjall::FjallEngine;
pub use backend::in_memory::{InMemoryEngine, Operation};
pub use batch::WriteBatch;
pub use error::{EngineError, EngineResult};
pub use snapshot::MetricsSnapshot;

/// A type-erased, shareable [`Engine`] instance.
pub type SharedEngine = Arc<dyn Engine>;

/// Durability requested for a write or a batch apply.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Return as soon as the write is buffered in the engine, without forcing an fsync.
    NoSync,
    /// Persist the write-ahead journal to disk before returning.
    #[default]
    Sync,
}

/// An ordered key-value storage engine under benchmark.
///
/// All operations are synchronous and block the calling thread until the engine completes them.
/// Implementations must be safe to call concurrently from many writer threads.
pub trait Engine: Debug + Send + Sync + 'static {
    /// The engine name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Writes a single key.
    fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> EngineResult<()>;

    /// Applies all pairs of the batch atomically.
    fn apply(&self, batch: WriteBatch, durability: Durability) -> EngineResult<()>;

    /// Compacts the key range `[start, end)`.
    ///
    /// Engines that cannot restrict compaction to a range compact everything.
    fn compact(&self, start: &[u8], end: &[u8], parallel: bool) -> EngineResult<()>;

    /// Takes a point-in-time snapshot of the engine's internal metrics.
    fn metrics(&self) -> MetricsSnapshot;

    /// Flushes outstanding state to disk. Called exactly once at shutdown.
    fn close(&self) -> EngineResult<()>;
}
