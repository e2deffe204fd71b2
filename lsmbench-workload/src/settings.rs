//! Workload parameters for a benchmark run.

use lsmbench_engine::Durability;
use serde::{Deserialize, Serialize};

use crate::compaction::CompactionPolicy;
use crate::key::{MAX_COUNTER_WRITERS, PrefixStrategy};
use crate::payload::ValueMode;
use crate::{Error, Result};

/// Default number of records written per epoch.
pub const DEFAULT_BATCH_SIZE: u64 = 100 * 1024;

/// How the records of an epoch are handed to the engine.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Submission {
    /// Accumulate the whole epoch into one batch and apply it atomically.
    #[default]
    Batched,
    /// Write and time every record with its own call.
    Individual,
}

impl Submission {
    /// The durability used when none is configured explicitly.
    pub fn default_durability(self) -> Durability {
        match self {
            Self::Batched => Durability::NoSync,
            Self::Individual => Durability::Sync,
        }
    }
}

/// Parameters shared by all writers of a run.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadSettings {
    /// Number of concurrent writer threads.
    pub writers: usize,
    /// Records written per epoch.
    pub batch_size: u64,
    /// Batched or individual writes.
    pub submission: Submission,
    /// Durability of writes; derived from `submission` if unset.
    pub durability: Option<Durability>,
    /// Source of value bytes.
    pub values: ValueMode,
    /// Prefix generation for epochs.
    pub prefixes: PrefixStrategy,
    /// Whether the first writer compacts after each epoch.
    pub compaction: bool,
    /// Stop each writer after this many epochs. Runs until interrupted if unset.
    pub epochs: Option<u64>,
    /// Print epoch numbers and phase durations along with the engine metrics.
    pub epoch_timings: bool,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            writers: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            submission: Submission::default(),
            durability: None,
            values: ValueMode::default(),
            prefixes: PrefixStrategy::default(),
            compaction: false,
            epochs: None,
            epoch_timings: false,
        }
    }
}

impl WorkloadSettings {
    /// The effective write durability.
    pub fn durability(&self) -> Durability {
        self.durability.unwrap_or_else(|| self.submission.default_durability())
    }

    /// The compaction policy of the run.
    pub fn compaction_policy(&self) -> CompactionPolicy {
        CompactionPolicy::new(self.compaction)
    }

    /// Checks that the settings describe a runnable workload.
    pub fn validate(&self) -> Result<()> {
        if self.writers == 0 {
            return Err(invalid("at least one writer is required"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch size must be positive"));
        }
        match self.prefixes.resolve(self.writers) {
            PrefixStrategy::Timestamp if self.writers > 1 => {
                return Err(invalid("timestamp prefixes require a single writer"));
            }
            PrefixStrategy::Counter if self.writers > MAX_COUNTER_WRITERS => {
                return Err(invalid(format!(
                    "counter prefixes support at most {MAX_COUNTER_WRITERS} writers"
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidSettings(message.into())
}
