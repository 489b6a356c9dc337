//! End-to-end pipeline — normalize, profile, score, adjudicate, seal.
//!
//! The pipeline is the composition root: it wires the pure stages together,
//! routes only ambiguous findings through the oracle gateway, and seals the
//! run into a snapshot plus its regression delta. Cancellation is dropping
//! the future; nothing is persisted unless sealing completed.

use crate::adjudicate::{AdjudicationGateway, CachedVerdict, GatewayStats};
use crate::error::EngineError;
use crate::history::{CommitRecord, HistoryProfiler};
use crate::normalize::{NormalizeStats, Normalizer, RawFinding};
use crate::score::RiskScorer;
use crate::snapshot::{RegressionDelta, RunSnapshot, SnapshotMeta};
use augur_core::config::AugurConfig;
use augur_core::error::ConfigError;
use augur_core::oracle::JudgmentOracle;
use augur_core::store::StateDir;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-stage observability counters for one run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub normalize: NormalizeStats,
    pub gateway: GatewayStats,
    pub profiled_files: usize,
    pub profiled_developers: usize,
}

/// The sealed result of one pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    pub snapshot: RunSnapshot,
    pub delta: RegressionDelta,
    pub report: RunReport,
}

/// The assembled pipeline.
pub struct Pipeline {
    config: AugurConfig,
    oracle: Option<Arc<dyn JudgmentOracle>>,
    state: Option<StateDir>,
}

impl Pipeline {
    /// Build a pipeline. Configuration is validated here, before any
    /// processing begins.
    pub fn new(config: AugurConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = config.state_dir.as_ref().map(StateDir::new);
        Ok(Self {
            config,
            oracle: None,
            state,
        })
    }

    /// Attach a judgment oracle. Without one, every finding keeps the
    /// neutral oracle component.
    pub fn with_oracle(mut self, oracle: Arc<dyn JudgmentOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Override the state directory from the configuration.
    pub fn with_state_dir(mut self, state: StateDir) -> Self {
        self.state = Some(state);
        self
    }

    /// Execute one full run.
    ///
    /// The prior snapshot is loaded from the state directory when one is
    /// configured; the sealed snapshot and the refreshed verdict cache are
    /// written back there.
    pub async fn run(
        &self,
        raw: &[RawFinding],
        log: &[CommitRecord],
        ruleset_version: &str,
    ) -> Result<RunOutcome, EngineError> {
        let now = Utc::now();
        let mut report = RunReport::default();

        let normalizer = Normalizer::from_config(&self.config.normalize);
        let (findings, normalize_stats) = normalizer.normalize(raw, now);
        report.normalize = normalize_stats;

        let profiler = HistoryProfiler::new(self.config.history.window_days);
        let profiles = profiler.profile(log, now);
        report.profiled_files = profiles.file_count();
        report.profiled_developers = profiles.developer_count();

        let scorer = RiskScorer::new(self.config.scoring.clone());
        let mut scored = Vec::with_capacity(findings.len());
        for finding in findings {
            let profile = profiles.file_or_unproven(&finding.file_path);
            let developer = profile
                .last_author
                .as_deref()
                .and_then(|author| profiles.developer(author));
            scored.push(scorer.score(finding, &profile, developer));
        }

        if let Some(ref oracle) = self.oracle
            && self.config.oracle.enabled
        {
            let mut gateway = AdjudicationGateway::new(oracle.clone(), &self.config.oracle);
            if let Some(ref state) = self.state {
                let cached: Option<HashMap<String, CachedVerdict>> =
                    state.verdict_cache_store().load()?;
                if let Some(entries) = cached {
                    gateway = gateway.with_cache(entries);
                }
            }
            let (adjudicated, gateway_stats) =
                gateway.adjudicate(&scorer, &profiles, scored).await;
            scored = adjudicated;
            report.gateway = gateway_stats;
            if let Some(ref state) = self.state {
                state
                    .verdict_cache_store()
                    .save(&gateway.cache_entries().await)?;
            }
        }

        let prior: Option<RunSnapshot> = match self.state {
            Some(ref state) => state.snapshot_store().load()?,
            None => None,
        };

        let mut snapshot = RunSnapshot::new(SnapshotMeta::new(
            ruleset_version,
            self.config.history.window_days,
        ));
        for finding in scored {
            snapshot.record(finding)?;
        }
        let (snapshot, delta) = snapshot.seal(prior.as_ref());

        if let Some(ref state) = self.state {
            state.snapshot_store().save(&snapshot)?;
        }

        Ok(RunOutcome {
            snapshot,
            delta,
            report,
        })
    }
}
