use lsmbench_engine::EngineError;
use thiserror::Error;

/// Errors that abort a benchmark run.
#[derive(Debug, Error)]
pub enum Error {
    /// The storage engine failed a write, apply or compaction.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The operating system could not provide random bytes for payloads.
    #[error("random source unavailable")]
    Entropy(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The workload settings are inconsistent.
    #[error("invalid workload settings: {0}")]
    InvalidSettings(String),

    /// A writer thread could not be started.
    #[error("failed to spawn writer thread")]
    Spawn(#[source] std::io::Error),

    /// A writer failed and the run was aborted.
    #[error("writer {index} failed")]
    Worker {
        /// Index of the failed writer.
        index: usize,
        /// The error returned by the writer.
        #[source]
        source: Box<Error>,
    },

    /// A writer thread panicked.
    #[error("writer {index} panicked")]
    WorkerPanicked {
        /// Index of the panicked writer.
        index: usize,
    },
}

/// Result type for workload operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
