//! # Augur Core
//!
//! Foundation for the augur bug-prediction engine.
//! Provides layered configuration, the error taxonomy, the external
//! judgment-oracle capability (trait + HTTP and mock implementations), and
//! atomic run-state persistence.
//!
//! The pipeline stages themselves (normalization, history profiling, risk
//! scoring, adjudication, aggregation) live in `augur-engine`.

pub mod config;
pub mod error;
pub mod oracle;
pub mod store;

// Re-export commonly used types at the crate root.
pub use config::{
    AugurConfig, DecisionBand, HistoryConfig, NormalizeConfig, OracleConfig, ScoringConfig,
    load_config,
};
pub use error::{AugurError, ConfigError, OracleError, StoreError};
pub use oracle::{HttpOracle, JudgmentOracle, JudgmentRequest, JudgmentResponse, MockOracle};
pub use store::{JsonStore, StateDir};
