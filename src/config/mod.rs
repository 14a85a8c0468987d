//! Configuration loading and validation.
//!
//! Lookup order: an explicit `--config` path, then
//! `<platform config dir>/multi-review/config.toml`, then built-in defaults.

pub mod schema;

#[allow(unused_imports)]
pub use schema::{Config, ModelSpec, ProviderConfig, ReviewerSpec, RuntimeConfig};

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::agent::Provider;

/// Smallest roster the pipeline accepts.
pub const MIN_REVIEWERS: usize = 3;

const CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Default config file location for this platform, if one can be determined.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "multi-review")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load and validate the configuration.
    ///
    /// Returns the config together with the file it came from, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let config = match &path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok((config, path))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Check the roster and model references.
    pub fn validate(&self) -> Result<()> {
        if self.reviewers.len() < MIN_REVIEWERS {
            bail!(
                "At least {MIN_REVIEWERS} reviewers are required, {} configured",
                self.reviewers.len()
            );
        }

        let mut names = HashSet::new();
        for reviewer in &self.reviewers {
            let name = reviewer.name.trim();
            if name.is_empty() {
                bail!("Reviewer for {}/{} has an empty name", reviewer.provider, reviewer.model);
            }
            if !names.insert(name) {
                bail!("Duplicate reviewer name '{name}'");
            }
            check_model(&reviewer.provider, &reviewer.model)
                .with_context(|| format!("Reviewer '{name}'"))?;
        }

        check_model(&self.synthesis.provider, &self.synthesis.model)
            .context("Synthesis model")?;

        for name in self.providers.keys() {
            if Provider::parse(name).is_none() {
                bail!("Unknown provider '{name}' in [providers]");
            }
        }
        Ok(())
    }

    /// Output directory with `~` and environment variables expanded.
    pub fn output_dir(&self) -> PathBuf {
        let expanded = shellexpand::full(&self.output_dir)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.output_dir.clone());
        PathBuf::from(expanded)
    }
}

fn check_model(provider: &str, model: &str) -> Result<()> {
    if Provider::parse(provider).is_none() {
        bail!("Unknown provider '{provider}' (expected anthropic, openai or google)");
    }
    if model.trim().is_empty() {
        bail!("Empty model id for provider '{provider}'");
    }
    Ok(())
}
