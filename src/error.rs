//! Error taxonomy for the ingestion pipeline.
//!
//! Per-file backend failures are not represented here: the loader recovers
//! from them locally (logged, file skipped) and they never cross a public
//! API boundary. See [`crate::extract::ExtractError`] for that layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the repository and the indexing orchestrator.
///
/// Callers see either a success or one of these; there is no silent partial
/// success. Persistence failures are always preceded by a transaction
/// rollback, so no partially-committed state is externally visible.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Input path does not exist. Raised before any side effect.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Input is structurally invalid (not a regular file, illegal status
    /// transition, bad configuration value).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Extension has no registered loader backend.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The loader produced zero usable documents for a file that exists.
    #[error("no documents loaded from {}", .0.display())]
    EmptyResult(PathBuf),

    /// Storage-layer failure (connectivity, constraint, timeout).
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Filesystem failure outside the per-file backend recovery path
    /// (checksum read, serialized output write).
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
