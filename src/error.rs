// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for destinations.
//!
//! Errors never escape the [`Logger`](crate::Logger). They are returned from the explicit
//! managed-file operations (`rotate`, `prune`, `reindex`) and otherwise routed to an observer or
//! to the [diagnostic channel](crate::diagnostics).

use std::io;
use std::path::PathBuf;

/// Result type for logfan operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The managed directory could not be created
    #[error("failed to create log directory at {path}: {source}")]
    CreateDirectory { path: PathBuf, source: io::Error },

    /// The managed directory could not be listed
    #[error("failed to read log directory at {path}: {source}")]
    ReadDirectory { path: PathBuf, source: io::Error },

    /// A log file could not be created or opened
    #[error("failed to create or open log file at {path}: {source}")]
    OpenFile { path: PathBuf, source: io::Error },

    /// Appending to a log file failed
    #[error("failed to write to log file at {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    /// Flushing a log file to storage failed
    #[error("failed to flush log file at {path}: {source}")]
    Flush { path: PathBuf, source: io::Error },

    /// An archived log file could not be removed
    #[error("failed to remove log file at {path}: {source}")]
    RemoveFile { path: PathBuf, source: io::Error },

    /// The engine has no active file
    #[error("managed file destination is not ready")]
    NotReady,

    /// The engine was deinitialized
    #[error("managed file destination is closed")]
    Closed,

    /// The worker thread behind a queue has gone away
    #[error("queue {0} is no longer running")]
    QueueUnavailable(String),

    /// A level name was not recognized
    #[error("unknown log level {0:?}")]
    ParseLevel(String),
}
