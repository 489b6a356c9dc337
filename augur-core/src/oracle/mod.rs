//! The external judgment oracle capability.
//!
//! The oracle is the one genuinely unreliable, latency-bound dependency in
//! the pipeline, so it lives behind a trait: a request/response pair plus an
//! explicit failure mode. Scoring itself never calls the oracle inline; the
//! adjudication gateway in `augur-engine` owns caching, concurrency bounds,
//! and timeouts.

pub mod http;

use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpOracle;

/// Context handed to the oracle for a single ambiguous finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentRequest {
    /// Rule identifier that produced the finding.
    pub rule_id: String,
    /// The rule's human-readable message.
    pub rule_message: String,
    /// The matched code snippet.
    pub snippet: String,
    /// File path of the match.
    pub file_path: String,
    /// One-line summary of the file's history profile.
    pub profile_summary: String,
}

/// The oracle's judgment for a single finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentResponse {
    /// Probability that the finding is a true positive, in [0, 1].
    pub true_positive_probability: f64,
    /// Short free-text rationale.
    pub rationale: String,
}

/// An external source of true/false-positive judgments.
#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    /// Judge whether a finding is likely a true positive.
    async fn judge(&self, request: &JudgmentRequest) -> Result<JudgmentResponse, OracleError>;

    /// Identifier used in logs.
    fn name(&self) -> &str;
}

/// Mock oracle for testing: queued responses, optional latency, call counting.
pub struct MockOracle {
    responses: std::sync::Mutex<Vec<JudgmentResponse>>,
    offline: bool,
    delay: Option<std::time::Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(Vec::new()),
            offline: false,
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a MockOracle that always returns the given judgment.
    ///
    /// Queues multiple copies so it can handle multiple calls.
    pub fn with_response(probability: f64, rationale: &str) -> Self {
        let oracle = Self::new();
        for _ in 0..64 {
            oracle.queue_response(JudgmentResponse {
                true_positive_probability: probability,
                rationale: rationale.to_string(),
            });
        }
        oracle
    }

    /// Create a MockOracle that fails every call with `OracleError::Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    /// Sleep for `delay` before answering. Combine with a short gateway
    /// timeout to simulate an oracle that always times out.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response to be returned by the next `judge` call.
    pub fn queue_response(&self, response: JudgmentResponse) {
        self.responses.lock().unwrap().push(response);
    }

    /// Number of `judge` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JudgmentOracle for MockOracle {
    async fn judge(&self, _request: &JudgmentRequest) -> Result<JudgmentResponse, OracleError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline {
            return Err(OracleError::Unavailable {
                message: "mock oracle offline".into(),
            });
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(OracleError::Unavailable {
                message: "mock oracle response queue exhausted".into(),
            });
        }
        Ok(responses.remove(0))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
