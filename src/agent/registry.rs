//! Model and credential registry.
//!
//! Built once at process start and shared read-only with every reviewer
//! and the synthesizer. A model resolves only when its provider is known
//! and a credential for that provider is available.

use std::collections::HashMap;

use super::traits::{ModelHandle, ModelResolver, Provider};
use crate::config::ProviderConfig;

const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_GOOGLE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables consulted for each provider, in order.
fn default_key_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Anthropic => &["ANTHROPIC_API_KEY"],
        Provider::OpenAi => &["OPENAI_API_KEY"],
        Provider::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
    }
}

fn default_base_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Anthropic => DEFAULT_ANTHROPIC_URL,
        Provider::OpenAi => DEFAULT_OPENAI_URL,
        Provider::Google => DEFAULT_GOOGLE_URL,
    }
}

const ALL_PROVIDERS: [Provider; 3] = [Provider::Anthropic, Provider::OpenAi, Provider::Google];

// ── Credential store ─────────────────────────────────────────────

/// API keys per provider.
#[derive(Clone, Default)]
pub struct CredentialStore {
    keys: HashMap<Provider, String>,
}

impl CredentialStore {
    /// Load keys through `lookup` (normally `std::env::var`). A configured
    /// `api_key_env` replaces the default variable names for that provider.
    pub fn load<F>(providers: &HashMap<String, ProviderConfig>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = HashMap::new();
        for provider in ALL_PROVIDERS {
            let configured = providers
                .get(provider.as_str())
                .and_then(|p| p.api_key_env.as_deref());
            let found = match configured {
                Some(var) => lookup(var),
                None => default_key_vars(provider).iter().find_map(|var| lookup(var)),
            };
            if let Some(key) = found.filter(|k| !k.trim().is_empty()) {
                keys.insert(provider, key.trim().to_string());
            }
        }
        Self { keys }
    }

    pub fn from_env(providers: &HashMap<String, ProviderConfig>) -> Self {
        Self::load(providers, |var| std::env::var(var).ok())
    }

    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }

    pub fn get(&self, provider: Provider) -> Option<&str> {
        self.keys.get(&provider).map(String::as_str)
    }

    pub fn has(&self, provider: Provider) -> bool {
        self.keys.contains_key(&provider)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<&str> = self.keys.keys().map(|p| p.as_str()).collect();
        providers.sort_unstable();
        f.debug_struct("CredentialStore")
            .field("providers", &providers)
            .finish()
    }
}

// ── Model registry ───────────────────────────────────────────────

/// Resolves `(provider, id)` pairs into [`ModelHandle`]s.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    credentials: CredentialStore,
    base_urls: HashMap<Provider, String>,
}

impl ModelRegistry {
    pub fn new(credentials: CredentialStore) -> Self {
        let base_urls = ALL_PROVIDERS
            .iter()
            .map(|p| (*p, default_base_url(*p).to_string()))
            .collect();
        Self {
            credentials,
            base_urls,
        }
    }

    /// Registry with base URL overrides from the `[providers]` config table.
    pub fn from_config(
        credentials: CredentialStore,
        providers: &HashMap<String, ProviderConfig>,
    ) -> Self {
        let mut registry = Self::new(credentials);
        for (name, settings) in providers {
            let (Some(provider), Some(url)) = (Provider::parse(name), settings.base_url.as_ref())
            else {
                continue;
            };
            registry = registry.with_base_url(provider, url.clone());
        }
        registry
    }

    pub fn with_base_url(mut self, provider: Provider, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.base_urls
            .insert(provider, url.trim_end_matches('/').to_string());
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }
}

impl ModelResolver for ModelRegistry {
    fn find(&self, provider: &str, id: &str) -> Option<ModelHandle> {
        let provider = Provider::parse(provider)?;
        if id.trim().is_empty() {
            return None;
        }
        let api_key = self.credentials.get(provider)?;
        let base_url = self
            .base_urls
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| default_base_url(provider).to_string());
        Some(ModelHandle {
            provider,
            id: id.trim().to_string(),
            base_url,
            api_key: api_key.to_string(),
        })
    }
}
