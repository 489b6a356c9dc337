//! History profiling — per-file and per-author risk signals from the
//! change-history log.
//!
//! Profiles are recomputed fully on every run from a single pass over the
//! windowed log; there is no incremental mutation to drift out of sync.
//! Counter-valued attributes (change frequency, author diversity) are
//! min-max normalized by the largest counter observed in the same run, so
//! the model adapts to repository size instead of relying on fixed
//! constants.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One commit in the change-history log.
///
/// The log may arrive in either time order; the profiler sorts internally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub files: Vec<String>,
    /// True when the commit remediated a defect.
    pub is_fix: bool,
}

/// Historical risk profile for a single file. All rates are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHistoryProfile {
    pub path: String,
    /// Touch count in the window, normalized by the busiest file.
    pub change_frequency: f64,
    /// Distinct-author count, normalized by the most-shared file.
    pub author_diversity: f64,
    /// 1.0 = touched just now (or never: new code is unproven),
    /// 0.0 = last touched at the window's far edge.
    pub recency: f64,
    /// Fraction of this file's touches that were fix commits.
    pub defect_density: f64,
    /// Share of touches by the dominant author.
    pub ownership_concentration: f64,
    /// Author of the most recent touch, if any.
    pub last_author: Option<String>,
}

impl FileHistoryProfile {
    /// Profile for a file with no history in the window.
    ///
    /// All risk components are zero; recency is 1.0 (new code is unproven).
    /// Ownership is 1.0 by convention so that inverse-ownership risk is also
    /// zero for unproven files.
    pub fn unproven(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            change_frequency: 0.0,
            author_diversity: 0.0,
            recency: 1.0,
            defect_density: 0.0,
            ownership_concentration: 1.0,
            last_author: None,
        }
    }
}

/// Aggregated change statistics for one author. Derived, read-only output
/// of the profiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperProfile {
    pub author: String,
    pub total_changes: usize,
    /// Changes to files in commits flagged as fixes.
    pub fix_changes: usize,
    /// fix_changes / total_changes, in [0, 1].
    pub defect_rate: f64,
}

/// The profiler's output: file profiles and developer profiles for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryProfiles {
    files: HashMap<String, FileHistoryProfile>,
    developers: HashMap<String, DeveloperProfile>,
}

impl HistoryProfiles {
    pub fn file(&self, path: &str) -> Option<&FileHistoryProfile> {
        self.files.get(path)
    }

    /// Profile used for scoring: absent history yields the unproven profile.
    pub fn file_or_unproven(&self, path: &str) -> FileHistoryProfile {
        self.files
            .get(path)
            .cloned()
            .unwrap_or_else(|| FileHistoryProfile::unproven(path))
    }

    pub fn developer(&self, author: &str) -> Option<&DeveloperProfile> {
        self.developers.get(author)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn developer_count(&self) -> usize {
        self.developers.len()
    }
}

/// Per-file accumulator for the single log pass.
#[derive(Default)]
struct FileCounters {
    touches: usize,
    fix_touches: usize,
    author_touches: HashMap<String, usize>,
    last_touch: Option<DateTime<Utc>>,
    last_author: Option<String>,
}

/// Builds history profiles from a commit log restricted to a trailing window.
pub struct HistoryProfiler {
    window_days: u32,
}

impl HistoryProfiler {
    pub fn new(window_days: u32) -> Self {
        Self { window_days }
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Profile the log as of `now`.
    ///
    /// `now` is passed explicitly so window filtering and recency are
    /// deterministic under test.
    pub fn profile(&self, log: &[CommitRecord], now: DateTime<Utc>) -> HistoryProfiles {
        let window = Duration::days(i64::from(self.window_days));
        let cutoff = now - window;

        let mut commits: Vec<&CommitRecord> = log
            .iter()
            .filter(|c| c.timestamp > cutoff && c.timestamp <= now)
            .collect();
        commits.sort_by_key(|c| c.timestamp);

        let mut files: HashMap<String, FileCounters> = HashMap::new();
        let mut authors: HashMap<String, (usize, usize)> = HashMap::new();

        for commit in &commits {
            for path in &commit.files {
                let counters = files.entry(path.clone()).or_default();
                counters.touches += 1;
                if commit.is_fix {
                    counters.fix_touches += 1;
                }
                *counters
                    .author_touches
                    .entry(commit.author.clone())
                    .or_insert(0) += 1;
                counters.last_touch = Some(commit.timestamp);
                counters.last_author = Some(commit.author.clone());

                let entry = authors.entry(commit.author.clone()).or_insert((0, 0));
                entry.0 += 1;
                if commit.is_fix {
                    entry.1 += 1;
                }
            }
        }

        let max_touches = files.values().map(|c| c.touches).max().unwrap_or(0).max(1);
        let max_authors = files
            .values()
            .map(|c| c.author_touches.len())
            .max()
            .unwrap_or(0)
            .max(1);
        let window_secs = window.num_seconds().max(1) as f64;

        let file_profiles = files
            .into_iter()
            .map(|(path, counters)| {
                let touches = counters.touches.max(1);
                let recency = counters
                    .last_touch
                    .map(|t| {
                        let age = now.signed_duration_since(t).num_seconds().max(0) as f64;
                        (1.0 - age / window_secs).clamp(0.0, 1.0)
                    })
                    .unwrap_or(1.0);
                let dominant = counters
                    .author_touches
                    .values()
                    .copied()
                    .max()
                    .unwrap_or(0);
                let profile = FileHistoryProfile {
                    path: path.clone(),
                    change_frequency: counters.touches as f64 / max_touches as f64,
                    author_diversity: counters.author_touches.len() as f64 / max_authors as f64,
                    recency,
                    defect_density: counters.fix_touches as f64 / touches as f64,
                    ownership_concentration: dominant as f64 / touches as f64,
                    last_author: counters.last_author,
                };
                (path, profile)
            })
            .collect();

        let developers = authors
            .into_iter()
            .map(|(author, (total, fixes))| {
                let profile = DeveloperProfile {
                    author: author.clone(),
                    total_changes: total,
                    fix_changes: fixes,
                    defect_rate: fixes as f64 / total.max(1) as f64,
                };
                (author, profile)
            })
            .collect();

        let profiles = HistoryProfiles {
            files: file_profiles,
            developers,
        };
        tracing::info!(
            commits = commits.len(),
            files = profiles.file_count(),
            developers = profiles.developer_count(),
            window_days = self.window_days,
            "profiled change history"
        );
        profiles
    }
}
