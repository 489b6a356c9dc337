//! Configuration for the augur pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment. Validation happens at load time and is
//! fatal: a run never starts with invalid weights or an inverted decision
//! band.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Canonical severity names recognized by the severity map.
const CANONICAL_SEVERITIES: [&str; 5] = ["info", "low", "medium", "high", "critical"];

/// Top-level augur configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugurConfig {
    /// Finding normalization settings.
    pub normalize: NormalizeConfig,
    /// Change-history profiling settings.
    pub history: HistoryConfig,
    /// Score fusion weights and decision band.
    pub scoring: ScoringConfig,
    /// External judgment oracle settings.
    pub oracle: OracleConfig,
    /// Directory for run state (prior snapshot, verdict cache).
    /// None disables cross-run persistence.
    pub state_dir: Option<PathBuf>,
}

impl Default for AugurConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            history: HistoryConfig::default(),
            scoring: ScoringConfig::default(),
            oracle: OracleConfig::default(),
            state_dir: None,
        }
    }
}

impl AugurConfig {
    /// Validate the configuration. Violations are fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        if self.history.window_days == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        for (raw, value) in &self.normalize.severity_map {
            if !CANONICAL_SEVERITIES.contains(&value.to_lowercase().as_str()) {
                return Err(ConfigError::UnknownSeverity {
                    raw: raw.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Finding normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Raw scanner severity -> canonical severity name.
    pub severity_map: HashMap<String, String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        // Semgrep-style scanner levels plus identity mappings for canonical names.
        let mut severity_map = HashMap::new();
        severity_map.insert("ERROR".into(), "high".into());
        severity_map.insert("WARNING".into(), "medium".into());
        severity_map.insert("INFO".into(), "info".into());
        for name in CANONICAL_SEVERITIES {
            severity_map.insert(name.into(), name.into());
        }
        Self { severity_map }
    }
}

/// Change-history profiling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Trailing window, in days, for the history profiler.
    pub window_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { window_days: 180 }
    }
}

/// Score fusion weights and the ambiguous-score decision band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the normalized rule severity.
    pub severity_weight: f64,
    /// Weight of the historical risk signal.
    pub history_weight: f64,
    /// Weight of the oracle adjustment.
    pub oracle_weight: f64,
    /// Scores inside this band are ambiguous and oracle-eligible.
    pub band: DecisionBand,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            severity_weight: 0.5,
            history_weight: 0.3,
            oracle_weight: 0.2,
            band: DecisionBand::default(),
        }
    }
}

impl ScoringConfig {
    /// Validate weights and band. Violations are fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("severity_weight", self.severity_weight),
            ("history_weight", self.history_weight),
            ("oracle_weight", self.oracle_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::WeightOutOfRange { name, value });
            }
        }
        let sum = self.severity_weight + self.history_weight + self.oracle_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeights { sum });
        }
        self.band.validate()
    }
}

/// The `[low, high]` score band that routes findings to the oracle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionBand {
    pub low: f64,
    pub high: f64,
}

impl Default for DecisionBand {
    fn default() -> Self {
        Self {
            low: 0.35,
            high: 0.65,
        }
    }
}

impl DecisionBand {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.low) || !(0.0..=1.0).contains(&self.high) || self.low >= self.high {
            return Err(ConfigError::InvalidBand {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }
}

/// External judgment oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Master enable for oracle consultation.
    pub enabled: bool,
    /// HTTP endpoint of the adjudication service.
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    /// Per-call timeout (seconds). A timed-out call is treated as unavailable.
    pub timeout_secs: u64,
    /// Maximum concurrent outbound consultations.
    pub max_concurrent: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            api_key_env: "AUGUR_ORACLE_API_KEY".into(),
            timeout_secs: 30,
            max_concurrent: 4,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `AUGUR_`)
/// 3. Workspace-local config (`.augur/config.toml`)
/// 4. User config (`~/.config/augur/config.toml`)
/// 5. Built-in defaults
///
/// The loaded configuration is validated before it is returned.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AugurConfig>,
) -> Result<AugurConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AugurConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "augur", "augur") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".augur").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (AUGUR_SCORING__SEVERITY_WEIGHT, AUGUR_ORACLE__TIMEOUT_SECS, etc.)
    figment = figment.merge(Env::prefixed("AUGUR_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: AugurConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    tracing::debug!(
        window_days = config.history.window_days,
        oracle_enabled = config.oracle.enabled,
        "loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_default_config_is_valid() {
        let config = AugurConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_weights() {
        let scoring = ScoringConfig::default();
        assert_eq!(scoring.severity_weight, 0.5);
        assert_eq!(scoring.history_weight, 0.3);
        assert_eq!(scoring.oracle_weight, 0.2);
        assert_eq!(scoring.band.low, 0.35);
        assert_eq!(scoring.band.high, 0.65);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let scoring = ScoringConfig {
            severity_weight: 0.5,
            history_weight: 0.3,
            oracle_weight: 0.3,
            ..Default::default()
        };
        match scoring.validate() {
            Err(ConfigError::InvalidWeights { sum }) => assert!((sum - 1.1).abs() < 1e-9),
            other => panic!("expected InvalidWeights, got {other:?}"),
        }
    }

    #[test]
    fn test_weight_out_of_range() {
        let scoring = ScoringConfig {
            severity_weight: 1.2,
            history_weight: -0.2,
            oracle_weight: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            scoring.validate(),
            Err(ConfigError::WeightOutOfRange { name: "severity_weight", .. })
        ));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let scoring = ScoringConfig {
            band: DecisionBand { low: 0.7, high: 0.3 },
            ..Default::default()
        };
        assert!(matches!(scoring.validate(), Err(ConfigError::InvalidBand { .. })));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = AugurConfig {
            history: HistoryConfig { window_days: 0 },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyWindow)));
    }

    #[test]
    fn test_unknown_severity_in_map_rejected() {
        let mut config = AugurConfig::default();
        config
            .normalize
            .severity_map
            .insert("FATAL".into(), "catastrophic".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownSeverity { .. })
        ));
    }

    #[test]
    fn test_default_severity_map_covers_semgrep_levels() {
        let normalize = NormalizeConfig::default();
        assert_eq!(normalize.severity_map.get("ERROR").map(String::as_str), Some("high"));
        assert_eq!(
            normalize.severity_map.get("WARNING").map(String::as_str),
            Some("medium")
        );
        assert_eq!(normalize.severity_map.get("INFO").map(String::as_str), Some("info"));
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.history.window_days, 180);
        assert!(config.oracle.enabled);
    }

    #[test]
    fn test_load_config_workspace_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let augur_dir = dir.path().join(".augur");
        std::fs::create_dir_all(&augur_dir).unwrap();
        std::fs::write(
            augur_dir.join("config.toml"),
            "[history]\nwindow_days = 90\n\n[oracle]\nmax_concurrent = 2\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.history.window_days, 90);
        assert_eq!(config.oracle.max_concurrent, 2);
        // Untouched sections keep their defaults
        assert_eq!(config.scoring.severity_weight, 0.5);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let augur_dir = dir.path().join(".augur");
        std::fs::create_dir_all(&augur_dir).unwrap();
        std::fs::write(
            augur_dir.join("config.toml"),
            "[scoring]\nseverity_weight = 0.9\nhistory_weight = 0.9\noracle_weight = 0.9\n",
        )
        .unwrap();

        assert!(matches!(
            load_config(Some(dir.path()), None),
            Err(ConfigError::InvalidWeights { .. })
        ));
    }
}
