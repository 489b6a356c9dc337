//! Run aggregation — sealed snapshots and run-over-run regression deltas.
//!
//! A snapshot is the immutable result set of one full pipeline execution.
//! Sealing is atomic: it yields the snapshot together with its delta against
//! the prior run, or nothing. Prior state is passed in explicitly; nothing
//! here reads ambient global state.

use crate::error::AggregateError;
use crate::score::ScoredFinding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Metadata identifying one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Version of the scanner rule set that produced the raw findings.
    pub ruleset_version: String,
    /// History window used by the profiler for this run.
    pub history_window_days: u32,
}

impl SnapshotMeta {
    pub fn new(ruleset_version: impl Into<String>, history_window_days: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            ruleset_version: ruleset_version.into(),
            history_window_days,
        }
    }
}

/// The ordered-by-creation result set of one pipeline run.
///
/// Findings can only be recorded while the snapshot is unsealed; `seal`
/// consumes the snapshot and returns the immutable result together with its
/// regression delta. Snapshots loaded from the store are always sealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub meta: SnapshotMeta,
    findings: Vec<ScoredFinding>,
    sealed: bool,
}

impl RunSnapshot {
    pub fn new(meta: SnapshotMeta) -> Self {
        Self {
            meta,
            findings: Vec::new(),
            sealed: false,
        }
    }

    /// Record a scored finding. Fails with `SnapshotSealed` once sealed.
    pub fn record(&mut self, finding: ScoredFinding) -> Result<(), AggregateError> {
        if self.sealed {
            return Err(AggregateError::SnapshotSealed);
        }
        self.findings.push(finding);
        Ok(())
    }

    /// Seal the snapshot and compute its delta against the prior run.
    ///
    /// Atomic: the sealed snapshot and the delta are produced together.
    pub fn seal(mut self, prior: Option<&RunSnapshot>) -> (RunSnapshot, RegressionDelta) {
        self.sealed = true;
        let delta = RegressionDelta::between(prior, &self);
        tracing::info!(
            run_id = %self.meta.run_id,
            findings = self.findings.len(),
            new = delta.new.len(),
            fixed = delta.fixed.len(),
            persisting = delta.persisting.len(),
            "sealed run snapshot"
        );
        (self, delta)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn findings(&self) -> &[ScoredFinding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    fn scores_by_identity(&self) -> HashMap<&str, f64> {
        self.findings
            .iter()
            .map(|f| (f.finding.identity.as_str(), f.score))
            .collect()
    }
}

/// A finding present in both snapshots, with its score movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistingFinding {
    pub identity: String,
    pub old_score: f64,
    pub new_score: f64,
    /// new_score - old_score: positive means the finding got riskier.
    pub score_trend: f64,
}

/// New/fixed/persisting comparison between two consecutive snapshots,
/// matched by finding identity hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionDelta {
    /// Identities present only in the current snapshot.
    pub new: Vec<String>,
    /// Identities present only in the prior snapshot.
    pub fixed: Vec<String>,
    /// Identities present in both, in current-snapshot order.
    pub persisting: Vec<PersistingFinding>,
}

impl RegressionDelta {
    /// Compute the delta. With no prior snapshot, everything is new.
    pub fn between(prior: Option<&RunSnapshot>, current: &RunSnapshot) -> Self {
        let old_scores = prior.map(RunSnapshot::scores_by_identity).unwrap_or_default();
        let new_identities: HashSet<&str> = current
            .findings
            .iter()
            .map(|f| f.finding.identity.as_str())
            .collect();

        let mut delta = RegressionDelta::default();
        for scored in &current.findings {
            let identity = scored.finding.identity.as_str();
            match old_scores.get(identity) {
                Some(&old_score) => delta.persisting.push(PersistingFinding {
                    identity: identity.to_string(),
                    old_score,
                    new_score: scored.score,
                    score_trend: scored.score - old_score,
                }),
                None => delta.new.push(identity.to_string()),
            }
        }
        if let Some(prior) = prior {
            for scored in &prior.findings {
                let identity = scored.finding.identity.as_str();
                if !new_identities.contains(identity) {
                    delta.fixed.push(identity.to_string());
                }
            }
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::FileHistoryProfile;
    use crate::normalize::{Finding, Severity};
    use crate::score::RiskScorer;
    use augur_core::config::ScoringConfig;
    use pretty_assertions::assert_eq;

    fn scored(identity: &str, freq: f64) -> ScoredFinding {
        let scorer = RiskScorer::new(ScoringConfig::default());
        let finding = Finding {
            identity: identity.into(),
            rule_id: "rule".into(),
            severity: Severity::Medium,
            file_path: "a.py".into(),
            line_start: 1,
            line_end: 1,
            snippet: String::new(),
            message: "m".into(),
            detected_at: Utc::now(),
        };
        let profile = FileHistoryProfile {
            change_frequency: freq,
            ..FileHistoryProfile::unproven("a.py")
        };
        scorer.score(finding, &profile, None)
    }

    fn snapshot(identities: &[(&str, f64)]) -> RunSnapshot {
        let mut snapshot = RunSnapshot::new(SnapshotMeta::new("rules-v1", 180));
        for (identity, freq) in identities {
            snapshot.record(scored(identity, *freq)).unwrap();
        }
        snapshot.seal(None).0
    }

    #[test]
    fn test_record_after_seal_fails() {
        let mut snapshot = RunSnapshot::new(SnapshotMeta::new("rules-v1", 180));
        snapshot.record(scored("a", 0.0)).unwrap();
        let (mut sealed, _) = snapshot.seal(None);
        assert!(sealed.is_sealed());
        assert!(matches!(
            sealed.record(scored("b", 0.0)),
            Err(AggregateError::SnapshotSealed)
        ));
        assert_eq!(sealed.len(), 1);
    }

    #[test]
    fn test_first_run_everything_is_new() {
        let mut snapshot = RunSnapshot::new(SnapshotMeta::new("rules-v1", 180));
        snapshot.record(scored("a", 0.0)).unwrap();
        snapshot.record(scored("b", 0.0)).unwrap();
        let (_, delta) = snapshot.seal(None);
        assert_eq!(delta.new, vec!["a".to_string(), "b".to_string()]);
        assert!(delta.fixed.is_empty());
        assert!(delta.persisting.is_empty());
    }

    #[test]
    fn test_new_fixed_persisting_partition() {
        let old = snapshot(&[("gone", 0.0), ("stays", 0.0)]);

        let mut current = RunSnapshot::new(SnapshotMeta::new("rules-v1", 180));
        current.record(scored("stays", 0.5)).unwrap();
        current.record(scored("fresh", 0.0)).unwrap();
        let (current, delta) = current.seal(Some(&old));

        assert_eq!(delta.new, vec!["fresh".to_string()]);
        assert_eq!(delta.fixed, vec!["gone".to_string()]);
        assert_eq!(delta.persisting.len(), 1);
        assert_eq!(delta.persisting[0].identity, "stays");
        assert!(delta.persisting[0].score_trend > 0.0, "freq rose, so must the score");

        // Conservation: old side and new side both partition exactly.
        assert_eq!(delta.fixed.len() + delta.persisting.len(), old.len());
        assert_eq!(delta.new.len() + delta.persisting.len(), current.len());
    }

    #[test]
    fn test_identical_rerun_is_all_persisting_with_zero_trend() {
        let old = snapshot(&[("a", 0.2), ("b", 0.7)]);

        let mut current = RunSnapshot::new(SnapshotMeta::new("rules-v1", 180));
        current.record(scored("a", 0.2)).unwrap();
        current.record(scored("b", 0.7)).unwrap();
        let (_, delta) = current.seal(Some(&old));

        assert!(delta.new.is_empty());
        assert!(delta.fixed.is_empty());
        assert_eq!(delta.persisting.len(), 2);
        for p in &delta.persisting {
            assert_eq!(p.score_trend, 0.0, "{}", p.identity);
        }
    }

    #[test]
    fn test_snapshot_roundtrips_through_json_sealed() {
        let original = snapshot(&[("a", 0.3)]);
        let json = serde_json::to_string(&original).unwrap();
        let mut loaded: RunSnapshot = serde_json::from_str(&json).unwrap();
        assert!(loaded.is_sealed());
        assert_eq!(loaded.len(), 1);
        assert!(loaded.record(scored("b", 0.0)).is_err());
        assert_eq!(loaded.meta.ruleset_version, "rules-v1");
    }
}
