//! Git CLI implementation of [`DiffProvider`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::DiffProvider;
use crate::error::ReviewError;

/// Runs `git` in a working tree.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
    max_output_bytes: usize,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>, max_output_bytes: usize) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            max_output_bytes,
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn run(&self, args: &[&str]) -> Result<String, ReviewError> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|e| ReviewError::Git {
                command: command.clone(),
                stderr: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            return Err(ReviewError::Git {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.len() > self.max_output_bytes {
            return Err(ReviewError::Git {
                command,
                stderr: format!(
                    "output is {} bytes, limit is {}",
                    output.stdout.len(),
                    self.max_output_bytes
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn verifies(&self, name: &str) -> bool {
        self.run(&["rev-parse", "--verify", "--quiet", name])
            .await
            .is_ok()
    }
}

#[async_trait]
impl DiffProvider for GitCli {
    async fn resolve_ref(&self, name: &str) -> String {
        if self.verifies(name).await {
            return name.to_string();
        }
        let remote = format!("origin/{name}");
        if self.verifies(&remote).await {
            return remote;
        }
        name.to_string()
    }

    async fn diff(&self, base: &str, target: &str) -> Result<String, ReviewError> {
        let range = format!("{base}..{target}");
        self.run(&["diff", range.as_str()]).await
    }

    async fn stat(&self, base: &str, target: &str) -> Result<String, ReviewError> {
        let range = format!("{base}..{target}");
        self.run(&["diff", range.as_str(), "--stat"]).await
    }

    async fn log(&self, base: &str, target: &str) -> Result<String, ReviewError> {
        let range = format!("{base}..{target}");
        self.run(&["log", range.as_str(), "--oneline"]).await
    }

    async fn current_branch(&self) -> Option<String> {
        let branch = self.run(&["branch", "--show-current"]).await.ok()?;
        let branch = branch.trim();
        (!branch.is_empty()).then(|| branch.to_string())
    }
}
