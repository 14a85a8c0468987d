//! Typed errors surfaced by the review pipeline.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Every configured reviewer failed; nothing to synthesize.
    #[error("all {attempted} reviewers failed")]
    AllReviewersFailed { attempted: usize },

    #[error("`{command}` failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
