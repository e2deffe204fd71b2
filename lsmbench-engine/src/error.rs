use thiserror::Error;

use crate::backend::in_memory::Operation;

/// Errors returned by a storage [`Engine`](crate::Engine).
///
/// None of these are recoverable from the benchmark's point of view: once the engine failed, its
/// internal consistency is suspect and the run has to be aborted.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be opened at the given location.
    #[error("failed to open engine at {path}")]
    Open {
        /// The storage directory that was passed to the engine.
        path: String,
        /// The error reported by fjall while opening the keyspace or its partition.
        #[source]
        cause: fjall::Error,
    },

    /// Errors reported by the fjall storage engine.
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    /// IO errors related to the storage directory.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure injected into the in-memory test engine.
    #[error("injected failure in {0:?}")]
    Injected(Operation),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
