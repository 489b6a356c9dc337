//! Finding normalization — canonical, deduplicated findings from raw scanner
//! output.
//!
//! Identity is a content hash over (rule id, normalized path, structural
//! fingerprint of the matched code), never the raw line number. Re-running
//! the scanner after a reformat or an unrelated edit above the match yields
//! the same identity; a materially different match yields a new one.

use crate::error::NormalizeError;
use augur_core::config::NormalizeConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Canonical severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map the five levels to evenly spaced values in [0, 1].
    pub fn normalized(&self) -> f64 {
        match self {
            Severity::Info => 0.0,
            Severity::Low => 0.25,
            Severity::Medium => 0.5,
            Severity::High => 0.75,
            Severity::Critical => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parse a canonical severity name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "info" => Some(Severity::Info),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw record as emitted by the external scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFinding {
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub line_start: usize,
    #[serde(default)]
    pub line_end: usize,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub message: String,
    /// The matched code, when the scanner provides it.
    #[serde(default)]
    pub snippet: Option<String>,
    /// A small window of surrounding code; preferred fingerprint source.
    #[serde(default)]
    pub context: Option<String>,
}

/// A canonical, deduplicated static-analysis finding. Immutable once built;
/// the next run supersedes it rather than mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Stable identity hash; survives line shifts and scanner re-runs.
    pub identity: String,
    pub rule_id: String,
    pub severity: Severity,
    pub file_path: String,
    pub line_start: usize,
    pub line_end: usize,
    pub snippet: String,
    pub message: String,
    pub detected_at: DateTime<Utc>,
}

/// Raw-vs-deduplicated counters emitted after normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub raw: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub unique: usize,
}

/// Converts raw scanner records into canonical findings.
pub struct Normalizer {
    severity_map: HashMap<String, Severity>,
}

impl Normalizer {
    /// Build from configuration. Map values were validated at startup;
    /// entries that fail to parse here are skipped.
    pub fn from_config(config: &NormalizeConfig) -> Self {
        let severity_map = config
            .severity_map
            .iter()
            .filter_map(|(raw, name)| Severity::parse(name).map(|s| (raw.clone(), s)))
            .collect();
        Self { severity_map }
    }

    /// Normalize a batch of raw records into deduplicated findings.
    ///
    /// Malformed records (missing rule id or file path) are dropped and
    /// counted, never fatal. `detected_at` is passed in so normalization is
    /// deterministic.
    pub fn normalize(
        &self,
        raw: &[RawFinding],
        detected_at: DateTime<Utc>,
    ) -> (Vec<Finding>, NormalizeStats) {
        let mut stats = NormalizeStats {
            raw: raw.len(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut findings = Vec::new();

        for (index, record) in raw.iter().enumerate() {
            let finding = match self.normalize_one(index, record, detected_at) {
                Ok(f) => f,
                Err(e) => {
                    stats.malformed += 1;
                    tracing::warn!(index, error = %e, "dropping malformed raw finding");
                    continue;
                }
            };
            if seen.insert(finding.identity.clone()) {
                findings.push(finding);
            } else {
                stats.duplicates += 1;
            }
        }

        stats.unique = findings.len();
        tracing::info!(
            raw = stats.raw,
            malformed = stats.malformed,
            duplicates = stats.duplicates,
            unique = stats.unique,
            "normalized scanner output"
        );
        (findings, stats)
    }

    fn normalize_one(
        &self,
        index: usize,
        record: &RawFinding,
        detected_at: DateTime<Utc>,
    ) -> Result<Finding, NormalizeError> {
        if record.rule_id.trim().is_empty() {
            return Err(NormalizeError::MalformedInput {
                index,
                reason: "missing rule id".into(),
            });
        }
        if record.file_path.trim().is_empty() {
            return Err(NormalizeError::MalformedInput {
                index,
                reason: "missing file path".into(),
            });
        }

        let file_path = normalize_path(&record.file_path);
        let fingerprint = fingerprint_source(record);
        let identity = identity_hash(&record.rule_id, &file_path, &fingerprint);

        Ok(Finding {
            identity,
            rule_id: record.rule_id.clone(),
            severity: self.severity_for(&record.severity),
            file_path,
            line_start: record.line_start,
            line_end: record.line_end.max(record.line_start),
            snippet: record.snippet.clone().unwrap_or_default(),
            message: record.message.clone(),
            detected_at,
        })
    }

    fn severity_for(&self, raw: &str) -> Severity {
        if let Some(&severity) = self.severity_map.get(raw) {
            return severity;
        }
        if let Some(severity) = Severity::parse(raw) {
            return severity;
        }
        tracing::warn!(raw, "unmapped scanner severity, defaulting to info");
        Severity::Info
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&NormalizeConfig::default())
    }
}

/// Parse a scanner output document: either a bare JSON array of records or
/// an object with a `results` array (semgrep-style).
pub fn parse_raw_document(document: &str) -> Result<Vec<RawFinding>, NormalizeError> {
    let value: serde_json::Value =
        serde_json::from_str(document).map_err(|e| NormalizeError::Document {
            message: e.to_string(),
        })?;
    let records = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(ref map) => map
            .get("results")
            .cloned()
            .unwrap_or(serde_json::Value::Array(Vec::new())),
        _ => {
            return Err(NormalizeError::Document {
                message: "expected an array or an object with a 'results' field".into(),
            });
        }
    };
    serde_json::from_value(records).map_err(|e| NormalizeError::Document {
        message: e.to_string(),
    })
}

/// Normalize a file path: forward slashes, no leading `./`, no doubled
/// separators.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }
    normalized
        .strip_prefix("./")
        .map(str::to_string)
        .unwrap_or(normalized)
}

/// The code text that feeds the structural fingerprint: the context window
/// when present, else the snippet, else the rule message. Never the line
/// numbers.
fn fingerprint_source(record: &RawFinding) -> String {
    let source = record
        .context
        .as_deref()
        .or(record.snippet.as_deref())
        .unwrap_or(&record.message);
    normalize_whitespace(source)
}

/// Collapse whitespace so unrelated re-indentation does not change identity:
/// trim each line, collapse internal runs to a single space, drop blanks.
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compute the stable identity hash for a finding.
pub fn identity_hash(rule_id: &str, normalized_path: &str, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_id.as_bytes());
    hasher.update(b"|");
    hasher.update(normalized_path.as_bytes());
    hasher.update(b"|");
    hasher.update(fingerprint.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rule: &str, file: &str, line: usize, context: &str) -> RawFinding {
        RawFinding {
            rule_id: rule.into(),
            file_path: file.into(),
            line_start: line,
            line_end: line,
            severity: "ERROR".into(),
            message: format!("{rule} matched"),
            snippet: Some("cursor.execute(q)".into()),
            context: Some(context.into()),
        }
    }

    #[test]
    fn test_idempotent_normalization() {
        let normalizer = Normalizer::default();
        let record = raw("sql-injection", "a.py", 10, "q = build()\ncursor.execute(q)");
        let (findings, stats) =
            normalizer.normalize(&[record.clone(), record], Utc::now());
        assert_eq!(findings.len(), 1);
        assert_eq!(stats.raw, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.unique, 1);
    }

    #[test]
    fn test_line_shift_does_not_change_identity() {
        let normalizer = Normalizer::default();
        let at_10 = raw("sql-injection", "a.py", 10, "q = build()\ncursor.execute(q)");
        let at_42 = raw("sql-injection", "a.py", 42, "q = build()\ncursor.execute(q)");
        let (findings, stats) = normalizer.normalize(&[at_10, at_42], Utc::now());
        assert_eq!(findings.len(), 1, "shifted match must collapse");
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_reindentation_does_not_change_identity() {
        let flat = normalize_whitespace("q = build()\ncursor.execute(q)");
        let indented = normalize_whitespace("    q  =  build()\n\n        cursor.execute(q)");
        assert_eq!(flat, indented);
    }

    #[test]
    fn test_different_match_changes_identity() {
        let normalizer = Normalizer::default();
        let a = raw("sql-injection", "a.py", 10, "cursor.execute(q)");
        let b = raw("sql-injection", "a.py", 10, "cursor.execute(other)");
        let (findings, _) = normalizer.normalize(&[a, b], Utc::now());
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_malformed_records_dropped_and_counted() {
        let normalizer = Normalizer::default();
        let missing_rule = RawFinding {
            file_path: "a.py".into(),
            ..Default::default()
        };
        let missing_path = RawFinding {
            rule_id: "r".into(),
            ..Default::default()
        };
        let good = raw("r", "a.py", 1, "x");
        let (findings, stats) =
            normalizer.normalize(&[missing_rule, missing_path, good], Utc::now());
        assert_eq!(findings.len(), 1);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.unique, 1);
    }

    #[test]
    fn test_severity_mapping() {
        let normalizer = Normalizer::default();
        let mut record = raw("r", "a.py", 1, "x");
        record.severity = "ERROR".into();
        let (findings, _) = normalizer.normalize(std::slice::from_ref(&record), Utc::now());
        assert_eq!(findings[0].severity, Severity::High);

        record.severity = "critical".into();
        let (findings, _) = normalizer.normalize(std::slice::from_ref(&record), Utc::now());
        assert_eq!(findings[0].severity, Severity::Critical);

        record.severity = "whatever".into();
        let (findings, _) = normalizer.normalize(&[record], Utc::now());
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("./src//main.rs"), "src/main.rs");
        assert_eq!(normalize_path("src\\lib.rs"), "src/lib.rs");
        let normalizer = Normalizer::default();
        let a = raw("r", "./a.py", 1, "x");
        let b = raw("r", "a.py", 1, "x");
        let (findings, _) = normalizer.normalize(&[a, b], Utc::now());
        assert_eq!(findings.len(), 1, "path spelling must not split identity");
    }

    #[test]
    fn test_severity_normalized_values_evenly_spaced() {
        assert_eq!(Severity::Info.normalized(), 0.0);
        assert_eq!(Severity::Low.normalized(), 0.25);
        assert_eq!(Severity::Medium.normalized(), 0.5);
        assert_eq!(Severity::High.normalized(), 0.75);
        assert_eq!(Severity::Critical.normalized(), 1.0);
    }

    #[test]
    fn test_parse_raw_document_array_and_results() {
        let array = r#"[{"rule_id":"r","file_path":"a.py","line_start":1,"line_end":1,"severity":"ERROR","message":"m"}]"#;
        let parsed = parse_raw_document(array).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].rule_id, "r");

        let object = format!(r#"{{"results":{array}}}"#);
        let parsed = parse_raw_document(&object).unwrap();
        assert_eq!(parsed.len(), 1);

        assert!(parse_raw_document("not json").is_err());
        assert!(parse_raw_document("42").is_err());
    }

    #[test]
    fn test_fingerprint_falls_back_to_snippet_then_message() {
        let with_snippet = RawFinding {
            rule_id: "r".into(),
            file_path: "a.py".into(),
            snippet: Some("foo()".into()),
            message: "m".into(),
            ..Default::default()
        };
        let message_only = RawFinding {
            rule_id: "r".into(),
            file_path: "a.py".into(),
            message: "m".into(),
            ..Default::default()
        };
        assert_ne!(
            fingerprint_source(&with_snippet),
            fingerprint_source(&message_only)
        );
        assert_eq!(fingerprint_source(&message_only), "m");
    }
}
