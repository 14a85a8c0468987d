//! Trait definitions for the agent/session runtime.
//!
//! The review pipeline never talks to a provider directly. It asks a
//! [`ModelResolver`] for a [`ModelHandle`], opens one [`AgentSession`]
//! per call through an [`AgentRuntime`], and listens for [`AgentEvent`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ── Provider ─────────────────────────────────────────────────────

/// Model providers the HTTP runtime knows how to stream from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Google,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
        }
    }

    /// Parse a provider identifier as written in config files.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" | "gpt" => Some(Self::OpenAi),
            "google" | "gemini" | "google-antigravity" => Some(Self::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Thinking level ───────────────────────────────────────────────

/// Reasoning effort requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Off,
    Minimal,
    Low,
    #[default]
    Medium,
    High,
    #[serde(alias = "x-high", alias = "extra-high")]
    XHigh,
}

impl ThinkingLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
        }
    }

    /// Token budget for providers that take an explicit thinking budget.
    /// `None` disables thinking.
    pub fn budget_tokens(self) -> Option<u32> {
        match self {
            Self::Off => None,
            Self::Minimal => Some(1_024),
            Self::Low => Some(4_096),
            Self::Medium => Some(10_000),
            Self::High => Some(20_000),
            Self::XHigh => Some(31_999),
        }
    }
}

impl std::fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Model handle ─────────────────────────────────────────────────

/// A resolved, invocable model: provider, model id and the credential
/// needed to reach it.
#[derive(Clone)]
pub struct ModelHandle {
    pub provider: Provider,
    pub id: String,
    pub base_url: String,
    pub api_key: String,
}

impl ModelHandle {
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.id)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("provider", &self.provider)
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Looks up invocable models by `(provider, id)`.
///
/// Returns `None` when the pair cannot be served; callers turn that into
/// data rather than an error.
pub trait ModelResolver: Send + Sync {
    fn find(&self, provider: &str, id: &str) -> Option<ModelHandle>;
}

// ── Session configuration ────────────────────────────────────────

/// Tools a session is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    /// Read files from the working tree.
    Read,
    /// Run shell commands in the working tree.
    Bash,
}

/// Per-session settings passed to [`AgentRuntime::create_session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub system_prompt: String,
    pub thinking: ThinkingLevel,
    pub tools: Vec<ToolCapability>,
    /// How many times a failed prompt may be retried before any text arrived.
    pub max_retries: u32,
    pub max_output_tokens: u32,
}

// ── Events ───────────────────────────────────────────────────────

/// Incremental events emitted by a session while a prompt runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    MessageStart,
    TextDelta { delta: String },
    ThinkingDelta { delta: String },
    MessageEnd,
}

/// Subscriber callback. Called in arrival order on the prompting task.
pub type EventHandler = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

// ── Session / runtime ────────────────────────────────────────────

/// One conversational session with a model. Sessions are owned by a single
/// call site and must be disposed when that call is finished.
#[async_trait]
pub trait AgentSession: Send {
    /// Register a handler for events emitted by subsequent prompts.
    fn subscribe(&mut self, handler: EventHandler);

    /// Send a user message and resolve once the reply has been fully
    /// streamed to all subscribers.
    async fn prompt(&mut self, text: &str) -> anyhow::Result<()>;

    /// Release the session. Further prompts fail.
    async fn dispose(&mut self);
}

/// Opens sessions against resolved models.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn create_session(
        &self,
        model: &ModelHandle,
        config: SessionConfig,
    ) -> anyhow::Result<Box<dyn AgentSession>>;
}
