//! Single-call agent invocation.
//!
//! Hides the session/event machinery behind a request/response call:
//! resolve the model, open a session scoped to this call, collect every
//! text delta in arrival order, dispose the session, return the text.

use parking_lot::Mutex;
use std::sync::Arc;

use super::traits::{
    AgentEvent, AgentRuntime, EventHandler, ModelResolver, SessionConfig, ThinkingLevel,
    ToolCapability,
};

/// Prefix marking a text as a failure rather than model output.
pub const FAILURE_MARKER: &str = "❌";

/// Whether `text` carries the failure marker.
pub fn is_failure_text(text: &str) -> bool {
    text.starts_with(FAILURE_MARKER)
}

/// Everything needed for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct InvokeRequest<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub thinking: ThinkingLevel,
    pub system_prompt: &'a str,
    pub tools: &'a [ToolCapability],
    pub max_retries: u32,
    pub prompt: &'a str,
}

/// Runs prompts against models resolved through a shared registry.
#[derive(Clone)]
pub struct AgentInvoker {
    runtime: Arc<dyn AgentRuntime>,
    resolver: Arc<dyn ModelResolver>,
    max_output_tokens: u32,
}

impl AgentInvoker {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        resolver: Arc<dyn ModelResolver>,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            runtime,
            resolver,
            max_output_tokens,
        }
    }

    /// Whether `(provider, model)` currently resolves.
    pub fn is_available(&self, provider: &str, model: &str) -> bool {
        self.resolver.find(provider, model).is_some()
    }

    /// Invoke a model and return its accumulated text.
    ///
    /// An unresolvable model is reported as a failure-marked string, not an
    /// error. Errors from the runtime itself propagate to the caller. The
    /// session is disposed on every path once it has been created.
    pub async fn invoke(&self, request: InvokeRequest<'_>) -> anyhow::Result<String> {
        let Some(handle) = self.resolver.find(request.provider, request.model) else {
            return Ok(format!(
                "{FAILURE_MARKER} model not found: {}/{}",
                request.provider, request.model
            ));
        };

        let config = SessionConfig {
            system_prompt: request.system_prompt.to_string(),
            thinking: request.thinking,
            tools: request.tools.to_vec(),
            max_retries: request.max_retries,
            max_output_tokens: self.max_output_tokens,
        };
        let mut session = self.runtime.create_session(&handle, config).await?;

        let buffer = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&buffer);
        let handler: EventHandler = Arc::new(move |event: &AgentEvent| {
            if let AgentEvent::TextDelta { delta } = event {
                sink.lock().push_str(delta);
            }
        });
        session.subscribe(handler);

        tracing::debug!(model = %handle.label(), thinking = %request.thinking, "Prompting model");
        let outcome = session.prompt(request.prompt).await;
        session.dispose().await;
        outcome?;

        let text = std::mem::take(&mut *buffer.lock());
        Ok(text)
    }
}
