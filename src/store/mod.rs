//! Report persistence.
//!
//! Each run writes `<base>.md` and, when synthesis parsed, `<base>_items.json`
//! where `<base>` is `<label>_<timestamp>` (see [`base_name`]).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::coding::Report;
use crate::error::ReviewError;

/// Where the artifacts of one run were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPaths {
    pub report_path: PathBuf,
    pub items_path: Option<PathBuf>,
}

/// `<label>_<timestamp>` with `/` in the label and `:`/`.` in the
/// timestamp replaced by `-`, at second precision.
///
/// `feature/login` at 2026-10-18 09:05:03.412Z gives
/// `feature-login_2026-10-18T09-05-03`.
pub fn base_name(label: &str, at: DateTime<Utc>) -> String {
    let stamp: String = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .map(|c| if c == ':' || c == '.' { '-' } else { c })
        .take(19)
        .collect();
    format!("{}_{stamp}", label.replace('/', "-"))
}

/// Writes reports into one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn persist(&self, base: &str, report: &Report) -> Result<PersistedPaths, ReviewError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReviewError::Persist {
                path: self.dir.clone(),
                source,
            })?;

        let report_path = self.dir.join(format!("{base}.md"));
        write(&report_path, report.document.as_bytes()).await?;
        tracing::info!(path = %report_path.display(), "📄 Report saved");

        let items_path = match &report.structured {
            Some(result) => {
                let path = self.dir.join(format!("{base}_items.json"));
                let json = serde_json::to_vec_pretty(result).map_err(|e| ReviewError::Persist {
                    path: path.clone(),
                    source: e.into(),
                })?;
                write(&path, &json).await?;
                tracing::info!(path = %path.display(), items = result.items.len(), "📋 Review items saved");
                Some(path)
            }
            None => None,
        };

        Ok(PersistedPaths {
            report_path,
            items_path,
        })
    }
}

async fn write(path: &Path, contents: &[u8]) -> Result<(), ReviewError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ReviewError::Persist {
            path: path.to_path_buf(),
            source,
        })
}
