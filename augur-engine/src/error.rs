//! Error types for the engine crate.

use thiserror::Error;

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    #[error("aggregation error: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("oracle error: {0}")]
    Oracle(#[from] augur_core::OracleError),
    #[error("configuration error: {0}")]
    Config(#[from] augur_core::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] augur_core::StoreError),
}

/// Errors from finding normalization.
///
/// Malformed records are recovered by skipping and counting; they never
/// fail a run.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("raw finding #{index} is malformed: {reason}")]
    MalformedInput { index: usize, reason: String },
    #[error("scanner document parse error: {message}")]
    Document { message: String },
}

/// Errors from the change-history log adapter.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("git error: {message}")]
    Git { message: String },
}

/// Errors from run aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Contract violation: the snapshot was already sealed. Fatal.
    #[error("snapshot is sealed; findings can no longer be recorded")]
    SnapshotSealed,
}
