//! Merges successful reviews into one [`Synthesis`].
//!
//! ```text
//! reviews ──▸ model available? ──no──▸ Unparsed(degraded concatenation)
//!                    │yes
//!                    ▼
//!              one invocation ──error──▸ Unparsed(degraded concatenation)
//!                    │
//!                    ▼
//!             parse_synthesis ──None──▸ Unparsed(raw model text)
//!                    │
//!                    ▼
//!             Parsed(result, raw)
//! ```

use super::parser::parse_synthesis;
use super::prompts::{build_synthesis_prompt, degraded_synthesis, synthesis_system_prompt};
use super::traits::{ReviewerOutcome, Synthesis};
use crate::agent::{is_failure_text, AgentInvoker, InvokeRequest};
use crate::config::ModelSpec;

/// Runs the synthesis model once over the successful reviews.
pub struct Synthesizer {
    invoker: AgentInvoker,
    model: ModelSpec,
    language: String,
}

impl Synthesizer {
    pub fn new(invoker: AgentInvoker, model: ModelSpec, language: &str) -> Self {
        Self {
            invoker,
            model,
            language: language.to_string(),
        }
    }

    fn label(&self) -> String {
        format!("{}/{}", self.model.provider, self.model.model)
    }

    /// Synthesize `reviews`, which must all be successful outcomes.
    ///
    /// Never fails: an unavailable model or a failed call falls back to the
    /// lossless concatenation of the reviews.
    pub async fn synthesize(&self, reviews: &[ReviewerOutcome]) -> Synthesis {
        if !self
            .invoker
            .is_available(&self.model.provider, &self.model.model)
        {
            tracing::warn!(model = %self.label(), "Synthesis model not available; concatenating reviews");
            return Synthesis::Unparsed {
                raw: degraded_synthesis(reviews),
            };
        }

        tracing::info!(model = %self.label(), reviews = reviews.len(), "⏳ Synthesizing reviews");
        let system_prompt = synthesis_system_prompt(&self.language);
        let prompt = build_synthesis_prompt(reviews, &self.language);
        let reply = self
            .invoker
            .invoke(InvokeRequest {
                provider: &self.model.provider,
                model: &self.model.model,
                thinking: self.model.thinking,
                system_prompt: &system_prompt,
                tools: &[],
                max_retries: 0,
                prompt: &prompt,
            })
            .await;

        let raw = match reply {
            Ok(text) if !is_failure_text(&text) => text,
            Ok(text) => {
                tracing::warn!(model = %self.label(), detail = %text, "Synthesis unavailable; concatenating reviews");
                return Synthesis::Unparsed {
                    raw: degraded_synthesis(reviews),
                };
            }
            Err(e) => {
                tracing::warn!(model = %self.label(), error = %format!("{e:#}"), "Synthesis failed; concatenating reviews");
                return Synthesis::Unparsed {
                    raw: degraded_synthesis(reviews),
                };
            }
        };

        match parse_synthesis(&raw) {
            Some(result) => {
                tracing::info!(
                    items = result.items.len(),
                    score = result.score,
                    "✅ Synthesis parsed"
                );
                Synthesis::Parsed { result, raw }
            }
            None => {
                tracing::warn!("Synthesis output did not contain a decodable result; keeping raw text");
                Synthesis::Unparsed { raw }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fakes::{ScriptedReply, ScriptedResolver, ScriptedRuntime};
    use crate::agent::ThinkingLevel;
    use std::sync::Arc;

    const SYNTH_JSON: &str = r#"```json
{"summary":"Mostly fine.","score":8,"verdict":"approve","items":[
 {"id":1,"severity":"major","file":"src/lib.rs","line":"3","title":"Unchecked input",
  "description":"d","suggestion":"s","recommendation":"recommended","reporters":["Alpha","Beta"]}
]}
```"#;

    fn model() -> ModelSpec {
        ModelSpec {
            provider: "anthropic".into(),
            model: "claude-opus-4-6".into(),
            thinking: ThinkingLevel::High,
        }
    }

    fn reviews() -> Vec<ReviewerOutcome> {
        vec![
            ReviewerOutcome {
                name: "Alpha".into(),
                text: "Input is unchecked.".into(),
            },
            ReviewerOutcome {
                name: "Beta".into(),
                text: "Validate the input.".into(),
            },
        ]
    }

    fn synthesizer(runtime: Arc<ScriptedRuntime>, resolver: ScriptedResolver) -> Synthesizer {
        let invoker = AgentInvoker::new(runtime, Arc::new(resolver), 1024);
        Synthesizer::new(invoker, model(), "English")
    }

    #[tokio::test]
    async fn missing_model_degrades_without_a_session() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let synth = synthesizer(
            runtime.clone(),
            ScriptedResolver::except(&["anthropic/claude-opus-4-6"]),
        );

        let synthesis = synth.synthesize(&reviews()).await;
        assert_eq!(
            synthesis,
            Synthesis::Unparsed {
                raw: "# Alpha\n\nInput is unchecked.\n\n---\n\n# Beta\n\nValidate the input.".into()
            }
        );
        assert_eq!(runtime.sessions_created(), 0);
    }

    #[tokio::test]
    async fn structured_reply_is_parsed() {
        let runtime = Arc::new(
            ScriptedRuntime::new().reply("claude-opus-4-6", ScriptedReply::text(SYNTH_JSON)),
        );
        let synth = synthesizer(runtime.clone(), ScriptedResolver::all());

        let synthesis = synth.synthesize(&reviews()).await;
        let result = synthesis.result().unwrap();
        assert_eq!(result.score, 8);
        assert_eq!(result.items[0].reporters, vec!["Alpha", "Beta"]);
        assert_eq!(synthesis.raw(), SYNTH_JSON);

        let prompts = runtime.prompts_for("claude-opus-4-6");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("## Review by Alpha\n\nInput is unchecked."));
        assert_eq!(runtime.sessions_disposed(), 1);
    }

    #[tokio::test]
    async fn unparsable_reply_keeps_raw_text() {
        let runtime = Arc::new(ScriptedRuntime::new().reply(
            "claude-opus-4-6",
            ScriptedReply::text("Both reviewers agree the input is unchecked."),
        ));
        let synth = synthesizer(runtime, ScriptedResolver::all());

        let synthesis = synth.synthesize(&reviews()).await;
        assert_eq!(
            synthesis,
            Synthesis::Unparsed {
                raw: "Both reviewers agree the input is unchecked.".into()
            }
        );
    }

    #[tokio::test]
    async fn failed_call_degrades_to_concatenation() {
        let runtime = Arc::new(
            ScriptedRuntime::new().reply("claude-opus-4-6", ScriptedReply::error("overloaded")),
        );
        let synth = synthesizer(runtime.clone(), ScriptedResolver::all());

        let synthesis = synth.synthesize(&reviews()).await;
        assert!(synthesis.result().is_none());
        assert!(synthesis.raw().starts_with("# Alpha\n\n"));
        assert_eq!(runtime.prompts_for("claude-opus-4-6").len(), 1);
    }
}
