use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::agent::ThinkingLevel;

// ── Top-level config ─────────────────────────────────────────────

/// Review configuration, loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory reports are written to. `~` and `$VAR` are expanded.
    pub output_dir: String,
    /// Language reviewers and the synthesizer write in.
    pub response_language: String,
    /// Reviewer roster, in report order.
    pub reviewers: Vec<ReviewerSpec>,
    /// Model that merges the reviews into one structured verdict.
    pub synthesis: ModelSpec,
    pub runtime: RuntimeConfig,
    /// Per-provider overrides keyed by provider name (`anthropic`, `openai`, `google`).
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: "reviews".into(),
            response_language: "Korean".into(),
            reviewers: default_reviewers(),
            synthesis: ModelSpec {
                provider: "anthropic".into(),
                model: "claude-opus-4-6".into(),
                thinking: ThinkingLevel::High,
            },
            runtime: RuntimeConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn default_reviewers() -> Vec<ReviewerSpec> {
    vec![
        ReviewerSpec::new("Codex 5.3", "openai", "gpt-5.3-codex", ThinkingLevel::XHigh),
        ReviewerSpec::new("Gemini 3 Flash", "google", "gemini-3-flash", ThinkingLevel::XHigh),
        ReviewerSpec::new("Claude Opus 4.6", "anthropic", "claude-opus-4-6", ThinkingLevel::XHigh),
    ]
}

// ── Reviewer / model specs ───────────────────────────────────────

/// One reviewer identity. Immutable once the roster is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerSpec {
    /// Display name, used as the reviewer's heading and reporter name.
    pub name: String,
    pub provider: String,
    #[serde(alias = "id")]
    pub model: String,
    #[serde(default)]
    pub thinking: ThinkingLevel,
}

impl ReviewerSpec {
    pub fn new(name: &str, provider: &str, model: &str, thinking: ThinkingLevel) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            thinking,
        }
    }
}

/// A model reference without a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: String,
    #[serde(alias = "id")]
    pub model: String,
    #[serde(default)]
    pub thinking: ThinkingLevel,
}

// ── Runtime ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Retries for a reviewer prompt that failed before producing text.
    pub max_retries: u32,
    /// Bound on establishing a provider connection, in seconds. Streamed
    /// calls themselves are never cut off.
    pub connect_timeout_secs: u64,
    pub max_output_tokens: u32,
    /// Cap on git output read for the diff, stat and log.
    pub max_diff_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            connect_timeout_secs: 30,
            max_output_tokens: 32_000,
            max_diff_bytes: 10 * 1024 * 1024,
        }
    }
}

// ── Providers ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL, e.g. for a proxy or a local gateway.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
}
