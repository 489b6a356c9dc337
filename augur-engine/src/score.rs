//! Risk scoring — fuses a finding's severity with its file's historical
//! risk and an optional oracle adjustment into one explainable score.
//!
//! Scoring is a pure function: given the same finding, profile, and
//! configuration, the non-oracle components are bit-identical across
//! invocations. The oracle enters only through `rescore`, driven by the
//! adjudication gateway.

use crate::history::{DeveloperProfile, FileHistoryProfile};
use crate::normalize::Finding;
use augur_core::config::ScoringConfig;
use serde::{Deserialize, Serialize};

/// The neutral oracle adjustment applied when the oracle was not consulted
/// or could not be reached.
pub const NEUTRAL_ADJUSTMENT: f64 = 0.5;

/// Triage verdict attached to every scored finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Actionable,
    Suppressed,
    NeedsReview,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Actionable => write!(f, "actionable"),
            Verdict::Suppressed => write!(f, "suppressed"),
            Verdict::NeedsReview => write!(f, "needs-review"),
        }
    }
}

/// Per-component contributions to the fused score. The components sum to
/// the final score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub severity_component: f64,
    pub history_component: f64,
    pub oracle_component: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.severity_component + self.history_component + self.oracle_component
    }
}

/// Outcome of an oracle consultation, recorded on the finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleOutcome {
    /// Adjustment in [0, 1]; 0 = likely false positive, 1 = likely true
    /// positive, 0.5 = neutral.
    pub adjustment: f64,
    pub rationale: Option<String>,
    /// False when the oracle could not be reached and the neutral default
    /// was applied (oracle-unreviewed).
    pub reviewed: bool,
}

impl OracleOutcome {
    /// The fallback outcome for an unreachable oracle.
    pub fn unreviewed() -> Self {
        Self {
            adjustment: NEUTRAL_ADJUSTMENT,
            rationale: None,
            reviewed: false,
        }
    }
}

/// A finding wrapped with its fused score, breakdown, and verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFinding {
    pub finding: Finding,
    /// Fused score in [0, 1].
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub verdict: Verdict,
    /// Present once the adjudication gateway has handled the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleOutcome>,
}

/// The historical-risk signal for a file: mean of change frequency, defect
/// density, and inverse ownership concentration (scattered ownership raises
/// risk). When the file's last author has a developer profile, their defect
/// rate joins the mean as a secondary signal.
pub fn historical_risk(
    profile: &FileHistoryProfile,
    developer: Option<&DeveloperProfile>,
) -> f64 {
    let mut sum = profile.change_frequency
        + profile.defect_density
        + (1.0 - profile.ownership_concentration);
    let mut terms = 3.0;
    if let Some(dev) = developer {
        sum += dev.defect_rate;
        terms += 1.0;
    }
    sum / terms
}

/// Fuses severity, historical risk, and the oracle adjustment.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: ScoringConfig,
}

impl RiskScorer {
    /// Build a scorer. The configuration is assumed validated at startup.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a finding against its file profile (and the last author's
    /// developer profile, when available). The oracle component starts at
    /// the neutral adjustment.
    pub fn score(
        &self,
        finding: Finding,
        profile: &FileHistoryProfile,
        developer: Option<&DeveloperProfile>,
    ) -> ScoredFinding {
        let severity = finding.severity.normalized();
        let history = historical_risk(profile, developer);
        self.assemble(finding, severity, history, NEUTRAL_ADJUSTMENT, None)
    }

    /// Re-fuse a scored finding with an oracle outcome. Severity and history
    /// components are carried over unchanged so the fusion stays exact.
    pub fn rescore(&self, scored: &ScoredFinding, outcome: OracleOutcome) -> ScoredFinding {
        let breakdown = ScoreBreakdown {
            severity_component: scored.breakdown.severity_component,
            history_component: scored.breakdown.history_component,
            oracle_component: self.config.oracle_weight * outcome.adjustment,
        };
        let score = breakdown.total();
        ScoredFinding {
            finding: scored.finding.clone(),
            score,
            breakdown,
            verdict: self.verdict_for(score),
            oracle: Some(outcome),
        }
    }

    fn assemble(
        &self,
        finding: Finding,
        severity: f64,
        history: f64,
        adjustment: f64,
        oracle: Option<OracleOutcome>,
    ) -> ScoredFinding {
        let breakdown = ScoreBreakdown {
            severity_component: self.config.severity_weight * severity,
            history_component: self.config.history_weight * history,
            oracle_component: self.config.oracle_weight * adjustment,
        };
        let score = breakdown.total();
        ScoredFinding {
            finding,
            score,
            breakdown,
            verdict: self.verdict_for(score),
            oracle,
        }
    }

    /// Classify a score against the decision band.
    pub fn verdict_for(&self, score: f64) -> Verdict {
        if score >= self.config.band.high {
            Verdict::Actionable
        } else if score <= self.config.band.low {
            Verdict::Suppressed
        } else {
            Verdict::NeedsReview
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Severity;
    use chrono::Utc;

    fn finding(severity: Severity) -> Finding {
        Finding {
            identity: "abc123".into(),
            rule_id: "sql-injection".into(),
            severity,
            file_path: "a.py".into(),
            line_start: 10,
            line_end: 10,
            snippet: "cursor.execute(q)".into(),
            message: "tainted value reaches query".into(),
            detected_at: Utc::now(),
        }
    }

    fn profile(freq: f64, density: f64, ownership: f64) -> FileHistoryProfile {
        FileHistoryProfile {
            path: "a.py".into(),
            change_frequency: freq,
            author_diversity: 0.5,
            recency: 0.9,
            defect_density: density,
            ownership_concentration: ownership,
            last_author: Some("alice".into()),
        }
    }

    #[test]
    fn test_worked_scenario_high_severity_risky_file() {
        let scorer = RiskScorer::new(ScoringConfig::default());
        let scored = scorer.score(finding(Severity::High), &profile(0.9, 0.8, 0.2), None);

        let history = historical_risk(&profile(0.9, 0.8, 0.2), None);
        assert!((history - 0.8333).abs() < 1e-3);
        assert!((scored.score - 0.725).abs() < 1e-3);
        assert_eq!(scored.verdict, Verdict::Actionable);
    }

    #[test]
    fn test_breakdown_sums_to_score() {
        let scorer = RiskScorer::new(ScoringConfig::default());
        let scored = scorer.score(finding(Severity::Medium), &profile(0.3, 0.1, 0.8), None);
        assert_eq!(scored.breakdown.total(), scored.score);
    }

    #[test]
    fn test_deterministic_without_oracle() {
        let scorer = RiskScorer::new(ScoringConfig::default());
        let p = profile(0.37, 0.61, 0.44);
        let a = scorer.score(finding(Severity::Low), &p, None);
        let b = scorer.score(finding(Severity::Low), &p, None);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a.breakdown, b.breakdown);
    }

    #[test]
    fn test_band_verdicts() {
        let scorer = RiskScorer::new(ScoringConfig::default());
        assert_eq!(scorer.verdict_for(0.65), Verdict::Actionable);
        assert_eq!(scorer.verdict_for(0.9), Verdict::Actionable);
        assert_eq!(scorer.verdict_for(0.35), Verdict::Suppressed);
        assert_eq!(scorer.verdict_for(0.1), Verdict::Suppressed);
        assert_eq!(scorer.verdict_for(0.5), Verdict::NeedsReview);
    }

    #[test]
    fn test_suppressed_low_severity_quiet_file() {
        let scorer = RiskScorer::new(ScoringConfig::default());
        let scored = scorer.score(finding(Severity::Info), &profile(0.05, 0.0, 1.0), None);
        assert_eq!(scored.verdict, Verdict::Suppressed);
    }

    #[test]
    fn test_developer_signal_joins_the_mean() {
        let dev = DeveloperProfile {
            author: "alice".into(),
            total_changes: 10,
            fix_changes: 10,
            defect_rate: 1.0,
        };
        let p = profile(0.4, 0.4, 0.6);
        let without = historical_risk(&p, None);
        let with = historical_risk(&p, Some(&dev));
        assert!(with > without);
        assert!((with - (0.4 + 0.4 + 0.4 + 1.0) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_unproven_file_has_zero_history_risk() {
        let p = FileHistoryProfile::unproven("new.rs");
        assert_eq!(historical_risk(&p, None), 0.0);
    }

    #[test]
    fn test_rescore_replaces_only_oracle_component() {
        let scorer = RiskScorer::new(ScoringConfig::default());
        let scored = scorer.score(finding(Severity::Medium), &profile(0.5, 0.5, 0.5), None);
        let rescored = scorer.rescore(
            &scored,
            OracleOutcome {
                adjustment: 1.0,
                rationale: Some("confirmed true positive".into()),
                reviewed: true,
            },
        );
        assert_eq!(
            rescored.breakdown.severity_component,
            scored.breakdown.severity_component
        );
        assert_eq!(
            rescored.breakdown.history_component,
            scored.breakdown.history_component
        );
        assert!((rescored.score - scored.score - 0.1).abs() < 1e-12);
        assert_eq!(rescored.breakdown.total(), rescored.score);
        assert!(rescored.oracle.as_ref().unwrap().reviewed);
    }

    #[test]
    fn test_neutral_rescore_is_identity_on_score() {
        let scorer = RiskScorer::new(ScoringConfig::default());
        let scored = scorer.score(finding(Severity::High), &profile(0.2, 0.2, 0.9), None);
        let rescored = scorer.rescore(&scored, OracleOutcome::unreviewed());
        assert_eq!(rescored.score.to_bits(), scored.score.to_bits());
        assert!(!rescored.oracle.as_ref().unwrap().reviewed);
    }
}
