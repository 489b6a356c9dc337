//! HTTP judgment oracle — reqwest client for an external adjudication service.
//!
//! Wire contract: POST the `JudgmentRequest` as JSON, receive a
//! `JudgmentResponse` (`{true_positive_probability, rationale}`). Anything
//! else (connection failure, timeout, non-2xx status, unparseable body)
//! maps onto an `OracleError` variant. Retry policy belongs to the caller;
//! the gateway makes exactly one attempt.

use super::{JudgmentOracle, JudgmentRequest, JudgmentResponse};
use crate::config::OracleConfig;
use crate::error::OracleError;
use async_trait::async_trait;
use std::time::Duration;

/// Oracle implementation backed by an HTTP adjudication endpoint.
#[derive(Debug)]
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpOracle {
    /// Build a client from the oracle configuration.
    ///
    /// The bearer token is read from the environment variable named in
    /// `config.api_key_env`; a missing token is allowed (the service may be
    /// unauthenticated, e.g. a local sidecar).
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| OracleError::Unavailable {
                message: "no oracle endpoint configured".into(),
            })?;
        let api_key = std::env::var(&config.api_key_env).ok();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Unavailable {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Map an HTTP error status to the oracle error taxonomy.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> OracleError {
        let message = if body_text.is_empty() {
            status.to_string()
        } else {
            body_text.chars().take(200).collect()
        };
        match status.as_u16() {
            401 | 403 => OracleError::AuthFailed { message },
            408 | 429 | 500..=599 => OracleError::Unavailable { message },
            code => OracleError::Http { status: code, message },
        }
    }
}

#[async_trait]
impl JudgmentOracle for HttpOracle {
    async fn judge(&self, request: &JudgmentRequest) -> Result<JudgmentResponse, OracleError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            rule_id = %request.rule_id,
            "consulting judgment oracle"
        );
        let mut req = self.client.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                OracleError::Unavailable {
                    message: format!("request failed: {e}"),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &body));
        }

        let mut judgment: JudgmentResponse =
            response
                .json()
                .await
                .map_err(|e| OracleError::ResponseParse {
                    message: e.to_string(),
                })?;
        judgment.true_positive_probability = judgment.true_positive_probability.clamp(0.0, 1.0);
        Ok(judgment)
    }

    fn name(&self) -> &str {
        "http"
    }
}
