//! # Augur Engine
//!
//! The bug-prediction pipeline: raw scanner output and a change-history log
//! go in; a prioritized, explainable, deduplicated set of likely defects
//! comes out, with run-over-run regression tracking.
//!
//! Stages, leaf first:
//! - [`normalize`]: canonical, deduplicated findings keyed by a stable
//!   content hash (line shifts and reformatting do not change identity)
//! - [`history`]: per-file and per-author risk profiles from the windowed
//!   change log ([`gitlog`] is the bundled git reader)
//! - [`score`]: severity + historical risk + oracle adjustment fused into
//!   one explainable score with a verdict
//! - [`adjudicate`]: bounded, cached oracle consultation for findings in
//!   the ambiguous band
//! - [`snapshot`]: sealed run snapshots and new/fixed/persisting deltas
//! - [`pipeline`]: the composition root

pub mod adjudicate;
pub mod error;
pub mod gitlog;
pub mod history;
pub mod normalize;
pub mod pipeline;
pub mod score;
pub mod snapshot;

// Re-export commonly used types at the crate root.
pub use adjudicate::{AdjudicationGateway, CachedVerdict, GatewayStats};
pub use error::{AggregateError, EngineError, HistoryError, NormalizeError};
pub use gitlog::CommitLogReader;
pub use history::{CommitRecord, DeveloperProfile, FileHistoryProfile, HistoryProfiler, HistoryProfiles};
pub use normalize::{Finding, NormalizeStats, Normalizer, RawFinding, Severity};
pub use pipeline::{Pipeline, RunOutcome, RunReport};
pub use score::{OracleOutcome, RiskScorer, ScoreBreakdown, ScoredFinding, Verdict};
pub use snapshot::{PersistingFinding, RegressionDelta, RunSnapshot, SnapshotMeta};
