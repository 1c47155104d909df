//! Error types for daemon adapters.

use std::io;

use thiserror::Error;

/// Errors raised while an adapter launches or supervises the daemon.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The daemon binary was not found.
    #[error("daemon binary not found: {command}")]
    BinaryNotFound {
        /// The command that was not found.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Spawning the daemon failed for another reason.
    #[error("failed to spawn daemon process: {message}")]
    SpawnFailed {
        /// Description of the spawn failure.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Supervising the running daemon failed.
    #[error("I/O error while supervising daemon: {0}")]
    Io(#[from] io::Error),

    /// An in-process embedding rejected the invocation.
    #[error("daemon rejected invocation: {message}")]
    Rejected {
        /// Reason reported by the embedding.
        message: String,
    },
}
