//! Concrete [`CodeReviewer`] and the concurrent reviewer pool.
//!
//! Every reviewer in the roster is dispatched at once and the pool waits
//! for all of them to settle. A failing reviewer becomes a failure-marked
//! [`ReviewerOutcome`]; it never cancels or hides the others.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::time::Instant;

use super::prompts::reviewer_system_prompt;
use super::traits::{CodeReviewer, ReviewerOutcome};
use crate::agent::{is_failure_text, AgentInvoker, InvokeRequest, ToolCapability, FAILURE_MARKER};
use crate::config::ReviewerSpec;

/// Tools reviewers may use to look beyond the diff.
const REVIEWER_TOOLS: [ToolCapability; 2] = [ToolCapability::Read, ToolCapability::Bash];

// ── Agent-backed reviewer ────────────────────────────────────────

/// Reviewer backed by one model through the [`AgentInvoker`].
pub struct AgentReviewer {
    spec: ReviewerSpec,
    invoker: AgentInvoker,
    system_prompt: String,
    max_retries: u32,
}

impl AgentReviewer {
    pub fn new(spec: ReviewerSpec, invoker: AgentInvoker, language: &str, max_retries: u32) -> Self {
        Self {
            spec,
            invoker,
            system_prompt: reviewer_system_prompt(language),
            max_retries,
        }
    }
}

#[async_trait]
impl CodeReviewer for AgentReviewer {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn model_label(&self) -> String {
        format!("{}/{}", self.spec.provider, self.spec.model)
    }

    async fn review(&self, prompt: &str) -> anyhow::Result<String> {
        self.invoker
            .invoke(InvokeRequest {
                provider: &self.spec.provider,
                model: &self.spec.model,
                thinking: self.spec.thinking,
                system_prompt: &self.system_prompt,
                tools: &REVIEWER_TOOLS,
                max_retries: self.max_retries,
                prompt,
            })
            .await
    }
}

// ── Reviewer pool ────────────────────────────────────────────────

/// Fixed roster of reviewers run concurrently over the same prompt.
pub struct ReviewerPool {
    reviewers: Vec<Box<dyn CodeReviewer>>,
}

impl ReviewerPool {
    /// Build agent-backed reviewers for a roster, sharing one invoker.
    pub fn from_specs(
        specs: &[ReviewerSpec],
        invoker: &AgentInvoker,
        language: &str,
        max_retries: u32,
    ) -> Self {
        let reviewers = specs
            .iter()
            .map(|spec| {
                Box::new(AgentReviewer::new(
                    spec.clone(),
                    invoker.clone(),
                    language,
                    max_retries,
                )) as Box<dyn CodeReviewer>
            })
            .collect();
        Self { reviewers }
    }

    /// Create a pool with custom reviewers (for testing or extension).
    pub fn with_reviewers(reviewers: Vec<Box<dyn CodeReviewer>>) -> Self {
        Self { reviewers }
    }

    pub fn is_empty(&self) -> bool {
        self.reviewers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reviewers.len()
    }

    /// Run every reviewer and wait for all of them.
    ///
    /// Returns one outcome per reviewer, in roster order regardless of
    /// completion order.
    pub async fn run_all(&self, prompt: &str) -> Vec<ReviewerOutcome> {
        join_all(
            self.reviewers
                .iter()
                .map(|reviewer| run_one(reviewer.as_ref(), prompt)),
        )
        .await
    }
}

async fn run_one(reviewer: &dyn CodeReviewer, prompt: &str) -> ReviewerOutcome {
    let name = reviewer.name().to_string();
    let model = reviewer.model_label();
    let start = Instant::now();
    tracing::info!(reviewer = %name, model = %model, "⏳ Review started");

    let text = match reviewer.review(prompt).await {
        Ok(text) if is_failure_text(&text) => {
            tracing::warn!(reviewer = %name, model = %model, detail = %text, "❌ Reviewer unavailable");
            text
        }
        Ok(text) => {
            tracing::info!(
                reviewer = %name,
                chars = text.chars().count(),
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "✅ Review completed"
            );
            text
        }
        Err(e) => {
            tracing::warn!(reviewer = %name, model = %model, error = %format!("{e:#}"), "❌ Review failed");
            format!("{FAILURE_MARKER} review failed: {e:#}")
        }
    };

    ReviewerOutcome { name, text }
}

// ── Tests ────────────────────────────────────────────────────────
