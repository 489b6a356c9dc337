//! Judgment adjudication gateway — bounded, cached consultation of the
//! external oracle for findings in the ambiguous score band.
//!
//! Coordination rules:
//! - one consultation in flight per cache key; a concurrent request for the
//!   same key waits and then reads the cached verdict
//! - outbound calls are capped by a semaphore and carry a per-call timeout
//! - exactly one attempt per call; a flaky oracle is not retried
//! - any failure degrades to the neutral adjustment and marks the finding
//!   oracle-unreviewed; the run never fails because the oracle did

use crate::history::HistoryProfiles;
use crate::score::{OracleOutcome, RiskScorer, ScoredFinding, Verdict};
use augur_core::config::OracleConfig;
use augur_core::oracle::{JudgmentOracle, JudgmentRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

/// A cached oracle verdict, replayed on later runs without an external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVerdict {
    pub adjustment: f64,
    pub rationale: String,
    pub cached_at: DateTime<Utc>,
}

/// Consultation counters for one adjudication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStats {
    /// Findings in the needs-review band.
    pub eligible: usize,
    /// External calls that returned a judgment.
    pub consulted: usize,
    /// Verdicts replayed from the cache.
    pub cache_hits: usize,
    /// Calls that failed or timed out and fell back to neutral.
    pub unavailable: usize,
}

/// Cache key: finding identity plus a rule-message checksum, so a changed
/// rule message invalidates the cached verdict.
pub fn cache_key(identity: &str, rule_message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_message.as_bytes());
    let checksum = format!("{:x}", hasher.finalize());
    format!("{identity}:{}", &checksum[..16])
}

enum Consult {
    CacheHit,
    Consulted,
    Unavailable,
}

/// The gateway between the scorer and the external oracle.
pub struct AdjudicationGateway {
    oracle: Arc<dyn JudgmentOracle>,
    cache: Arc<Mutex<HashMap<String, CachedVerdict>>>,
    in_flight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl AdjudicationGateway {
    pub fn new(oracle: Arc<dyn JudgmentOracle>, config: &OracleConfig) -> Self {
        Self {
            oracle,
            cache: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Seed the verdict cache, typically from the verdict-cache store.
    pub fn with_cache(self, entries: HashMap<String, CachedVerdict>) -> Self {
        Self {
            cache: Arc::new(Mutex::new(entries)),
            ..self
        }
    }

    /// Snapshot of the verdict cache, for persisting after a run.
    pub async fn cache_entries(&self) -> HashMap<String, CachedVerdict> {
        self.cache.lock().await.clone()
    }

    /// Adjudicate every needs-review finding in the batch; all other
    /// findings pass through untouched. Input order is preserved.
    pub async fn adjudicate(
        &self,
        scorer: &RiskScorer,
        profiles: &HistoryProfiles,
        findings: Vec<ScoredFinding>,
    ) -> (Vec<ScoredFinding>, GatewayStats) {
        let mut stats = GatewayStats::default();
        let mut out = findings;
        let mut handles = Vec::new();

        for (index, scored) in out.iter().enumerate() {
            if scored.verdict != Verdict::NeedsReview {
                continue;
            }
            stats.eligible += 1;

            let key = cache_key(&scored.finding.identity, &scored.finding.message);
            let request = judgment_request(scored, profiles);
            let oracle = self.oracle.clone();
            let cache = self.cache.clone();
            let in_flight = self.in_flight.clone();
            let semaphore = self.semaphore.clone();
            let timeout = self.timeout;

            handles.push(tokio::spawn(async move {
                let (outcome, kind) =
                    consult_one(oracle, cache, in_flight, semaphore, timeout, key, request).await;
                (index, outcome, kind)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((index, outcome, kind)) => {
                    match kind {
                        Consult::CacheHit => stats.cache_hits += 1,
                        Consult::Consulted => stats.consulted += 1,
                        Consult::Unavailable => stats.unavailable += 1,
                    }
                    out[index] = scorer.rescore(&out[index], outcome);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "adjudication task failed");
                }
            }
        }

        tracing::info!(
            eligible = stats.eligible,
            consulted = stats.consulted,
            cache_hits = stats.cache_hits,
            unavailable = stats.unavailable,
            "adjudication pass complete"
        );
        (out, stats)
    }
}

/// Build the oracle's context for one finding.
fn judgment_request(scored: &ScoredFinding, profiles: &HistoryProfiles) -> JudgmentRequest {
    let finding = &scored.finding;
    let profile = profiles.file_or_unproven(&finding.file_path);
    JudgmentRequest {
        rule_id: finding.rule_id.clone(),
        rule_message: finding.message.clone(),
        snippet: finding.snippet.clone(),
        file_path: finding.file_path.clone(),
        profile_summary: format!(
            "change_frequency {:.2}, defect_density {:.2}, ownership {:.2}, recency {:.2}",
            profile.change_frequency,
            profile.defect_density,
            profile.ownership_concentration,
            profile.recency,
        ),
    }
}

async fn consult_one(
    oracle: Arc<dyn JudgmentOracle>,
    cache: Arc<Mutex<HashMap<String, CachedVerdict>>>,
    in_flight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    key: String,
    request: JudgmentRequest,
) -> (OracleOutcome, Consult) {
    // Single writer per key: whoever holds this lock either finds the
    // verdict cached or performs the one external call for it.
    let key_lock = {
        let mut map = in_flight.lock().await;
        map.entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    };
    let _guard = key_lock.lock().await;

    if let Some(verdict) = cache.lock().await.get(&key).cloned() {
        return (
            OracleOutcome {
                adjustment: verdict.adjustment,
                rationale: Some(verdict.rationale),
                reviewed: true,
            },
            Consult::CacheHit,
        );
    }

    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(key = %key, "oracle semaphore closed; falling back to neutral");
            return (OracleOutcome::unreviewed(), Consult::Unavailable);
        }
    };

    match tokio::time::timeout(timeout, oracle.judge(&request)).await {
        Ok(Ok(response)) => {
            let adjustment = response.true_positive_probability.clamp(0.0, 1.0);
            cache.lock().await.insert(
                key,
                CachedVerdict {
                    adjustment,
                    rationale: response.rationale.clone(),
                    cached_at: Utc::now(),
                },
            );
            (
                OracleOutcome {
                    adjustment,
                    rationale: Some(response.rationale),
                    reviewed: true,
                },
                Consult::Consulted,
            )
        }
        Ok(Err(e)) => {
            tracing::warn!(key = %key, error = %e, "oracle consultation failed; falling back to neutral");
            (OracleOutcome::unreviewed(), Consult::Unavailable)
        }
        Err(_) => {
            tracing::warn!(
                key = %key,
                timeout_secs = timeout.as_secs(),
                "oracle consultation timed out; falling back to neutral"
            );
            (OracleOutcome::unreviewed(), Consult::Unavailable)
        }
    }
}
