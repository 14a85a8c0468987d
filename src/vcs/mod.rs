//! Version-control access: the diff, stat and log a review is built from.

pub mod git;

pub use git::GitCli;

use async_trait::async_trait;

use crate::error::ReviewError;

/// Change data between two refs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInfo {
    pub diff: String,
    pub stat: String,
    pub commit_log: String,
}

impl GitInfo {
    pub fn has_changes(&self) -> bool {
        !self.diff.trim().is_empty()
    }

    /// The totals line of `--stat` (e.g. `3 files changed, 10 insertions(+)`).
    pub fn stat_summary(&self) -> &str {
        self.stat.trim().lines().last().unwrap_or("").trim()
    }
}

/// Source of diffs and history.
#[async_trait]
pub trait DiffProvider: Send + Sync {
    /// Resolve a user-supplied ref. Tries the name, then `origin/<name>`,
    /// and falls back to the literal name.
    async fn resolve_ref(&self, name: &str) -> String;

    async fn diff(&self, base: &str, target: &str) -> Result<String, ReviewError>;

    async fn stat(&self, base: &str, target: &str) -> Result<String, ReviewError>;

    async fn log(&self, base: &str, target: &str) -> Result<String, ReviewError>;

    /// Currently checked-out branch; `None` when detached.
    async fn current_branch(&self) -> Option<String>;

    async fn git_info(&self, base: &str, target: &str) -> Result<GitInfo, ReviewError> {
        Ok(GitInfo {
            diff: self.diff(base, target).await?,
            stat: self.stat(base, target).await?,
            commit_log: self.log(base, target).await?,
        })
    }
}
