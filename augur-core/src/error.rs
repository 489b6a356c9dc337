//! Error types for the augur core crate.

use thiserror::Error;

/// Top-level augur error.
#[derive(Debug, Error)]
pub enum AugurError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from the external judgment oracle.
///
/// All variants are recoverable at the pipeline level: the adjudication
/// gateway falls back to the neutral adjustment and counts the failure.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {message}")]
    Unavailable { message: String },
    #[error("oracle call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("oracle HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("oracle response parse error: {message}")]
    ResponseParse { message: String },
    #[error("oracle authentication failed: {message}")]
    AuthFailed { message: String },
}

/// Errors from configuration loading and validation.
///
/// Always fatal: they are surfaced at startup, before any processing begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scoring weights must sum to 1.0, got {sum:.4}")]
    InvalidWeights { sum: f64 },
    #[error("scoring weight '{name}' must be within [0, 1], got {value}")]
    WeightOutOfRange { name: &'static str, value: f64 },
    #[error("decision band [{low}, {high}] is invalid: bounds must satisfy 0 <= low < high <= 1")]
    InvalidBand { low: f64, high: f64 },
    #[error("history window must be at least one day")]
    EmptyWindow,
    #[error("severity map entry '{raw}' points to unknown severity '{value}'")]
    UnknownSeverity { raw: String, value: String },
    #[error("config load error: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Errors from snapshot and verdict-cache persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt state file '{path}': {message}")]
    Corrupt { path: String, message: String },
}
