//! Commit-log reader — git2 adapter producing `CommitRecord`s.
//!
//! The profiler consumes plain `CommitRecord`s from any source; this is the
//! bundled reader for git repositories. Fix commits are flagged by a
//! commit-message keyword heuristic.

use crate::error::HistoryError;
use crate::history::CommitRecord;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Message keywords that flag a commit as a defect fix.
const FIX_KEYWORDS: [&str; 6] = ["fix", "bug", "patch", "repair", "defect", "fault"];

/// Check whether a commit message indicates a defect fix.
pub fn is_fix_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    FIX_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Reads commit records from a git repository's HEAD history.
pub struct CommitLogReader {
    max_commits: usize,
}

impl CommitLogReader {
    pub fn new() -> Self {
        Self { max_commits: 5000 }
    }

    /// Cap the number of commits walked (newest first).
    pub fn with_max_commits(mut self, max_commits: usize) -> Self {
        self.max_commits = max_commits;
        self
    }

    /// Walk HEAD history and produce one record per commit, newest first.
    pub fn read(&self, repo_path: &Path) -> Result<Vec<CommitRecord>, HistoryError> {
        let repo = git2::Repository::open(repo_path).map_err(|e| HistoryError::Git {
            message: format!("failed to open repo: {e}"),
        })?;

        let mut walk = repo.revwalk().map_err(|e| HistoryError::Git {
            message: format!("failed to start revwalk: {e}"),
        })?;
        walk.push_head().map_err(|e| HistoryError::Git {
            message: format!("failed to push HEAD: {e}"),
        })?;

        let mut records = Vec::new();
        for oid in walk.take(self.max_commits) {
            let oid = oid.map_err(|e| HistoryError::Git {
                message: format!("revwalk error: {e}"),
            })?;
            let commit = repo.find_commit(oid).map_err(|e| HistoryError::Git {
                message: format!("failed to load commit {oid}: {e}"),
            })?;

            let author = commit
                .author()
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| "unknown".into());
            let timestamp = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            let is_fix = is_fix_message(commit.message().unwrap_or(""));
            let files = self.touched_files(&repo, &commit)?;

            records.push(CommitRecord {
                author,
                timestamp,
                files,
                is_fix,
            });
        }

        tracing::debug!(commits = records.len(), "read commit log");
        Ok(records)
    }

    /// Paths touched by a commit, from the diff against its first parent
    /// (or the empty tree for a root commit).
    fn touched_files(
        &self,
        repo: &git2::Repository,
        commit: &git2::Commit<'_>,
    ) -> Result<Vec<String>, HistoryError> {
        let tree = commit.tree().map_err(|e| HistoryError::Git {
            message: format!("failed to load tree: {e}"),
        })?;
        let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());

        let diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
            .map_err(|e| HistoryError::Git {
                message: format!("failed to diff commit: {e}"),
            })?;

        let mut files = Vec::new();
        diff.foreach(
            &mut |delta, _| {
                if let Some(path) = delta.new_file().path().or(delta.old_file().path()) {
                    files.push(path.to_string_lossy().into_owned());
                }
                true
            },
            None,
            None,
            None,
        )
        .map_err(|e| HistoryError::Git {
            message: format!("failed to walk diff: {e}"),
        })?;
        Ok(files)
    }
}

impl Default for CommitLogReader {
    fn default() -> Self {
        Self::new()
    }
}
