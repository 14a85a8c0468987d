//! Streaming HTTP implementation of [`AgentRuntime`].
//!
//! Each provider is reached over its public REST API with Server-Sent
//! Events enabled. Text chunks are forwarded to subscribers as
//! [`AgentEvent::TextDelta`] in the order they arrive on the wire.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;

use super::traits::{
    AgentEvent, AgentRuntime, AgentSession, EventHandler, ModelHandle, Provider, SessionConfig,
    ThinkingLevel,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Headroom kept above the thinking budget so the visible answer is not cut off.
const ANSWER_TOKEN_HEADROOM: u32 = 8_192;

const RETRY_BACKOFF: Duration = Duration::from_millis(750);

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: Provider,
        status: u16,
        body: String,
    },
    #[error("{provider} stream error: {message}")]
    Stream { provider: Provider, message: String },
    #[error("session for {0} has been disposed")]
    Disposed(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl RuntimeError {
    /// Whether re-sending the prompt can help. Timeouts, client errors
    /// and disposed sessions are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Stream { .. } => true,
            Self::Disposed(_) => false,
            Self::Transport(e) => !e.is_timeout(),
        }
    }
}

// ── Runtime ──────────────────────────────────────────────────────

/// Opens [`HttpSession`]s sharing one connection pool.
///
/// Only connection setup is bounded; a streamed call runs until the
/// provider ends it.
#[derive(Debug, Clone)]
pub struct HttpRuntime {
    client: reqwest::Client,
}

impl HttpRuntime {
    pub fn new(connect_timeout: Duration) -> Result<Self, RuntimeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AgentRuntime for HttpRuntime {
    async fn create_session(
        &self,
        model: &ModelHandle,
        config: SessionConfig,
    ) -> anyhow::Result<Box<dyn AgentSession>> {
        if !config.tools.is_empty() {
            tracing::debug!(
                model = %model.label(),
                tools = ?config.tools,
                "HTTP runtime has no tool loop; tool capabilities are unused"
            );
        }
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            model: model.clone(),
            config,
            handlers: Vec::new(),
            history: Vec::new(),
            disposed: false,
        }))
    }
}

// ── Session ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
struct Turn {
    role: Role,
    text: String,
}

/// A single conversation with one model. History lives only as long as
/// the session.
pub struct HttpSession {
    client: reqwest::Client,
    model: ModelHandle,
    config: SessionConfig,
    handlers: Vec<EventHandler>,
    history: Vec<Turn>,
    disposed: bool,
}

impl HttpSession {
    fn emit(&self, event: &AgentEvent) {
        for handler in &self.handlers {
            handler(event);
        }
    }

    fn build_request(&self) -> reqwest::RequestBuilder {
        let body = request_body(&self.model, &self.config, &self.history);
        let request = match self.model.provider {
            Provider::Anthropic => self
                .client
                .post(format!("{}/v1/messages", self.model.base_url))
                .header("x-api-key", &self.model.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Provider::OpenAi => self
                .client
                .post(format!("{}/v1/chat/completions", self.model.base_url))
                .bearer_auth(&self.model.api_key),
            Provider::Google => self
                .client
                .post(format!(
                    "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                    self.model.base_url, self.model.id
                ))
                .header("x-goog-api-key", &self.model.api_key),
        };
        request.json(&body)
    }

    /// One streamed attempt. `emitted` is set once any delta, text or
    /// thinking, reached subscribers.
    async fn stream_once(&self, emitted: &mut bool) -> Result<String, RuntimeError> {
        let provider = self.model.provider;
        let resp = self.build_request().send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RuntimeError::Status {
                provider,
                status,
                body,
            });
        }

        self.emit(&AgentEvent::MessageStart);

        let mut text = String::new();
        let mut decoder = SseDecoder::default();
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for payload in decoder.push(&chunk) {
                self.dispatch(&payload, &mut text, emitted)?;
            }
        }
        if let Some(payload) = decoder.finish() {
            self.dispatch(&payload, &mut text, emitted)?;
        }

        self.emit(&AgentEvent::MessageEnd);
        Ok(text)
    }

    fn dispatch(
        &self,
        payload: &str,
        text: &mut String,
        emitted: &mut bool,
    ) -> Result<(), RuntimeError> {
        for delta in decode_payload(self.model.provider, payload)? {
            match delta {
                StreamDelta::Text(chunk) => {
                    text.push_str(&chunk);
                    *emitted = true;
                    self.emit(&AgentEvent::TextDelta { delta: chunk });
                }
                StreamDelta::Thinking(chunk) => {
                    *emitted = true;
                    self.emit(&AgentEvent::ThinkingDelta { delta: chunk });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AgentSession for HttpSession {
    fn subscribe(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    async fn prompt(&mut self, text: &str) -> anyhow::Result<()> {
        if self.disposed {
            return Err(RuntimeError::Disposed(self.model.label()).into());
        }
        self.history.push(Turn {
            role: Role::User,
            text: text.to_string(),
        });

        let mut attempt = 0;
        loop {
            let mut emitted = false;
            match self.stream_once(&mut emitted).await {
                Ok(reply) => {
                    self.history.push(Turn {
                        role: Role::Assistant,
                        text: reply,
                    });
                    return Ok(());
                }
                Err(e) if !emitted && e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        model = %self.model.label(),
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "Prompt failed, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => {
                    self.history.pop();
                    return Err(e.into());
                }
            }
        }
    }

    async fn dispose(&mut self) {
        self.handlers.clear();
        self.history.clear();
        self.disposed = true;
    }
}

// ── Request bodies ───────────────────────────────────────────────

fn openai_reasoning_effort(level: ThinkingLevel) -> Option<&'static str> {
    match level {
        ThinkingLevel::Off => None,
        other => Some(other.as_str()),
    }
}

fn request_body(model: &ModelHandle, config: &SessionConfig, history: &[Turn]) -> Value {
    match model.provider {
        Provider::Anthropic => {
            let messages: Vec<Value> = history
                .iter()
                .map(|t| {
                    json!({
                        "role": if t.role == Role::User { "user" } else { "assistant" },
                        "content": t.text,
                    })
                })
                .collect();
            let mut body = json!({
                "model": model.id,
                "max_tokens": config.max_output_tokens,
                "system": config.system_prompt,
                "messages": messages,
                "stream": true,
            });
            if let Some(budget) = config.thinking.budget_tokens() {
                body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
                body["max_tokens"] =
                    json!(config.max_output_tokens.max(budget + ANSWER_TOKEN_HEADROOM));
            }
            body
        }
        Provider::OpenAi => {
            let mut messages = vec![json!({ "role": "system", "content": config.system_prompt })];
            messages.extend(history.iter().map(|t| {
                json!({
                    "role": if t.role == Role::User { "user" } else { "assistant" },
                    "content": t.text,
                })
            }));
            let mut body = json!({
                "model": model.id,
                "messages": messages,
                "stream": true,
                "max_completion_tokens": config.max_output_tokens,
            });
            if let Some(effort) = openai_reasoning_effort(config.thinking) {
                body["reasoning_effort"] = json!(effort);
            }
            body
        }
        Provider::Google => {
            let contents: Vec<Value> = history
                .iter()
                .map(|t| {
                    json!({
                        "role": if t.role == Role::User { "user" } else { "model" },
                        "parts": [{ "text": t.text }],
                    })
                })
                .collect();
            let thinking_budget = config.thinking.budget_tokens().unwrap_or(0);
            json!({
                "systemInstruction": { "parts": [{ "text": config.system_prompt }] },
                "contents": contents,
                "generationConfig": {
                    "maxOutputTokens": config.max_output_tokens,
                    "thinkingConfig": {
                        "thinkingBudget": thinking_budget,
                        "includeThoughts": thinking_budget > 0,
                    },
                },
            })
        }
    }
}

// ── SSE decoding ─────────────────────────────────────────────────

/// Incremental Server-Sent Events decoder. Feed raw body chunks, get back
/// the `data:` payload of every completed event.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
    data: String,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(std::mem::take(&mut self.data));
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        events
    }

    /// Flush an event left open by a body that ended without a blank line.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest);
            if let Some(data) = line.trim_end_matches('\r').strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(data.strip_prefix(' ').unwrap_or(data));
            }
        }
        (!self.data.is_empty()).then(|| std::mem::take(&mut self.data))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamDelta {
    Text(String),
    Thinking(String),
}

pub(crate) fn decode_payload(
    provider: Provider,
    payload: &str,
) -> Result<Vec<StreamDelta>, RuntimeError> {
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(Vec::new());
    }
    let event: Value = serde_json::from_str(payload).map_err(|e| RuntimeError::Stream {
        provider,
        message: format!("invalid event JSON: {e}"),
    })?;

    if let Some(err) = event.get("error").filter(|e| !e.is_null()) {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(RuntimeError::Stream { provider, message });
    }

    let mut deltas = Vec::new();
    match provider {
        Provider::Anthropic => {
            if event["type"] == "content_block_delta" {
                let delta = &event["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        if let Some(t) = delta["text"].as_str() {
                            deltas.push(StreamDelta::Text(t.to_string()));
                        }
                    }
                    Some("thinking_delta") => {
                        if let Some(t) = delta["thinking"].as_str() {
                            deltas.push(StreamDelta::Thinking(t.to_string()));
                        }
                    }
                    _ => {}
                }
            }
        }
        Provider::OpenAi => {
            if let Some(t) = event["choices"][0]["delta"]["content"].as_str() {
                if !t.is_empty() {
                    deltas.push(StreamDelta::Text(t.to_string()));
                }
            }
        }
        Provider::Google => {
            if let Some(parts) = event["candidates"][0]["content"]["parts"].as_array() {
                for part in parts {
                    let Some(t) = part["text"].as_str() else {
                        continue;
                    };
                    if part["thought"].as_bool().unwrap_or(false) {
                        deltas.push(StreamDelta::Thinking(t.to_string()));
                    } else {
                        deltas.push(StreamDelta::Text(t.to_string()));
                    }
                }
            }
        }
    }
    Ok(deltas)
}
