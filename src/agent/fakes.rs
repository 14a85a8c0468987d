//! In-memory test doubles for the agent runtime and model registry.
//!
//! Replies are scripted per model id, so a test can describe a whole
//! reviewer roster and the synthesis model up front and then assert how
//! many sessions were opened, disposed and which prompts were sent.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::traits::{
    AgentEvent, AgentRuntime, AgentSession, EventHandler, ModelHandle, ModelResolver, Provider,
    SessionConfig,
};

/// What a scripted session does when prompted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReply {
    events: Vec<AgentEvent>,
    error: Option<String>,
    delay: Option<Duration>,
}

impl ScriptedReply {
    pub fn text(text: &str) -> Self {
        Self::chunks(&[text])
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::events(
            chunks
                .iter()
                .map(|c| AgentEvent::TextDelta {
                    delta: (*c).to_string(),
                })
                .collect(),
        )
    }

    pub fn events(events: Vec<AgentEvent>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Wait before replying.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    disposed: AtomicUsize,
}

/// [`AgentRuntime`] whose sessions replay [`ScriptedReply`]s keyed by model id.
#[derive(Default)]
pub struct ScriptedRuntime {
    replies: HashMap<String, ScriptedReply>,
    counters: Arc<Counters>,
    prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, model_id: &str, reply: ScriptedReply) -> Self {
        self.replies.insert(model_id.to_string(), reply);
        self
    }

    pub fn sessions_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn sessions_disposed(&self) -> usize {
        self.counters.disposed.load(Ordering::SeqCst)
    }

    /// Prompts sent to `model_id`, in call order.
    pub fn prompts_for(&self, model_id: &str) -> Vec<String> {
        self.prompts
            .lock()
            .iter()
            .filter(|(model, _)| model == model_id)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn create_session(
        &self,
        model: &ModelHandle,
        _config: SessionConfig,
    ) -> anyhow::Result<Box<dyn AgentSession>> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            model_id: model.id.clone(),
            reply: self.replies.get(&model.id).cloned(),
            handlers: Vec::new(),
            counters: Arc::clone(&self.counters),
            prompts: Arc::clone(&self.prompts),
            disposed: false,
        }))
    }
}

struct ScriptedSession {
    model_id: String,
    reply: Option<ScriptedReply>,
    handlers: Vec<EventHandler>,
    counters: Arc<Counters>,
    prompts: Arc<Mutex<Vec<(String, String)>>>,
    disposed: bool,
}

#[async_trait]
impl AgentSession for ScriptedSession {
    fn subscribe(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    async fn prompt(&mut self, text: &str) -> anyhow::Result<()> {
        anyhow::ensure!(!self.disposed, "session for {} has been disposed", self.model_id);
        self.prompts
            .lock()
            .push((self.model_id.clone(), text.to_string()));

        let Some(reply) = self.reply.clone() else {
            anyhow::bail!("no scripted reply for model {}", self.model_id);
        };
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        for event in &reply.events {
            for handler in &self.handlers {
                handler(event);
            }
            tokio::task::yield_now().await;
        }
        match reply.error {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }

    async fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.handlers.clear();
            self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// [`ModelResolver`] that resolves every pair except an explicit deny list.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResolver {
    missing: HashSet<String>,
    resolve_nothing: bool,
}

impl ScriptedResolver {
    pub fn all() -> Self {
        Self::default()
    }

    /// Resolve everything except the given `provider/id` labels.
    pub fn except(labels: &[&str]) -> Self {
        Self {
            missing: labels.iter().map(|l| (*l).to_string()).collect(),
            resolve_nothing: false,
        }
    }

    pub fn none() -> Self {
        Self {
            missing: HashSet::new(),
            resolve_nothing: true,
        }
    }
}

impl ModelResolver for ScriptedResolver {
    fn find(&self, provider: &str, id: &str) -> Option<ModelHandle> {
        if self.resolve_nothing || self.missing.contains(&format!("{provider}/{id}")) {
            return None;
        }
        Some(ModelHandle {
            provider: Provider::parse(provider).unwrap_or(Provider::Anthropic),
            id: id.to_string(),
            base_url: "http://scripted.invalid".into(),
            api_key: "scripted".into(),
        })
    }
}
