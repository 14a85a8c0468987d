//! Review pipeline.
//!
//! Drives one review run end to end:
//!
//! ```text
//! Idle ─▸ Gathering ─┬─▸ Aborted            (every reviewer failed)
//!   │                └─▸ Synthesizing ─▸ Assembling ─▸ Done
//!   └─▸ NoChanges                           (empty diff)
//! ```
//!
//! `Aborted` writes nothing; `NoChanges` and `Done` both count as success.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

use super::prompts::build_review_prompt;
use super::report::{Report, ReportHeader};
use super::reviewers::ReviewerPool;
use super::synthesis::Synthesizer;
use super::traits::ReviewerOutcome;
use crate::agent::AgentInvoker;
use crate::config::Config;
use crate::error::ReviewError;
use crate::store::{base_name, PersistedPaths, ReportStore};
use crate::vcs::DiffProvider;

// ── State ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Gathering,
    Synthesizing,
    Assembling,
    Done,
    NoChanges,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::NoChanges | Self::Aborted)
    }
}

// ── Request / outcome ────────────────────────────────────────────

/// Refs to compare plus an optional focus note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub target: String,
    pub base: String,
    pub focus: Option<String>,
}

impl Default for ReviewRequest {
    fn default() -> Self {
        Self {
            target: "HEAD".into(),
            base: "main".into(),
            focus: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The diff was empty; no reviewer ran.
    NoChanges,
    Completed {
        paths: PersistedPaths,
        /// Whether the synthesis produced a structured result.
        structured: bool,
    },
}

// ── Pipeline ─────────────────────────────────────────────────────

/// Multi-model review pipeline: fan out to the reviewer pool, fan in
/// through the synthesizer, persist the report.
pub struct ReviewPipeline {
    diff: Arc<dyn DiffProvider>,
    pool: ReviewerPool,
    synthesizer: Synthesizer,
    store: ReportStore,
    language: String,
    state: Mutex<PipelineState>,
}

impl ReviewPipeline {
    pub fn new(
        diff: Arc<dyn DiffProvider>,
        pool: ReviewerPool,
        synthesizer: Synthesizer,
        store: ReportStore,
        language: &str,
    ) -> Self {
        Self {
            diff,
            pool,
            synthesizer,
            store,
            language: language.to_string(),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// Build the pipeline described by `config`.
    pub fn from_config(config: &Config, invoker: AgentInvoker, diff: Arc<dyn DiffProvider>) -> Self {
        let language = &config.response_language;
        let pool = ReviewerPool::from_specs(
            &config.reviewers,
            &invoker,
            language,
            config.runtime.max_retries,
        );
        let synthesizer = Synthesizer::new(invoker, config.synthesis.clone(), language);
        Self::new(
            diff,
            pool,
            synthesizer,
            ReportStore::new(config.output_dir()),
            language,
        )
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    fn enter(&self, next: PipelineState) {
        let mut state = self.state.lock();
        tracing::debug!(from = ?*state, to = ?next, "Pipeline state");
        *state = next;
    }

    /// Run one review.
    ///
    /// Fails with [`ReviewError::AllReviewersFailed`] when no reviewer
    /// succeeded; the synthesizer is not called and nothing is written.
    pub async fn run(&self, request: &ReviewRequest) -> anyhow::Result<PipelineOutcome> {
        let base = self.diff.resolve_ref(&request.base).await;
        let target = self.diff.resolve_ref(&request.target).await;
        tracing::info!(base = %base, target = %target, "🔍 Collecting changes");

        let info = self.diff.git_info(&base, &target).await?;
        if !info.has_changes() {
            tracing::info!(base = %base, target = %target, "No changes to review");
            self.enter(PipelineState::NoChanges);
            return Ok(PipelineOutcome::NoChanges);
        }
        tracing::info!(summary = %info.stat_summary(), "📊 Changes found");

        let label = self.target_label(&request.target).await;
        let prompt = build_review_prompt(&info, request.focus.as_deref(), &self.language);

        self.enter(PipelineState::Gathering);
        tracing::info!(reviewers = self.pool.len(), "🚀 Starting parallel review");
        let outcomes = self.pool.run_all(&prompt).await;
        let successful: Vec<ReviewerOutcome> = outcomes
            .iter()
            .filter(|o| o.is_successful())
            .cloned()
            .collect();
        tracing::info!(
            succeeded = successful.len(),
            attempted = outcomes.len(),
            "Reviews finished"
        );
        if successful.is_empty() {
            self.enter(PipelineState::Aborted);
            return Err(ReviewError::AllReviewersFailed {
                attempted: outcomes.len(),
            }
            .into());
        }

        self.enter(PipelineState::Synthesizing);
        let synthesis = self.synthesizer.synthesize(&successful).await;

        self.enter(PipelineState::Assembling);
        let generated_at = Utc::now();
        let header = ReportHeader {
            target_label: label.clone(),
            base_ref: base,
            focus: request.focus.clone(),
            generated_at,
        };
        let report = Report::assemble(&header, &outcomes, &synthesis);
        let paths = self
            .store
            .persist(&base_name(&label, generated_at), &report)
            .await?;

        self.enter(PipelineState::Done);
        tracing::info!("✅ Code review complete");
        Ok(PipelineOutcome::Completed {
            structured: report.structured.is_some(),
            paths,
        })
    }

    /// `HEAD` is reported under the current branch name.
    async fn target_label(&self, target: &str) -> String {
        if target != "HEAD" {
            return target.to_string();
        }
        self.diff
            .current_branch()
            .await
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| "HEAD".to_string())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fakes::{ScriptedReply, ScriptedResolver, ScriptedRuntime};
    use crate::agent::ThinkingLevel;
    use crate::config::{ModelSpec, ReviewerSpec};
    use async_trait::async_trait;

    struct StaticDiff {
        diff: &'static str,
        branch: Option<&'static str>,
    }

    #[async_trait]
    impl DiffProvider for StaticDiff {
        // `main` only exists as a remote-tracking branch here.
        async fn resolve_ref(&self, name: &str) -> String {
            match name {
                "main" => "origin/main".to_string(),
                other => other.to_string(),
            }
        }
        async fn diff(&self, _: &str, _: &str) -> Result<String, ReviewError> {
            Ok(self.diff.to_string())
        }
        async fn stat(&self, _: &str, _: &str) -> Result<String, ReviewError> {
            Ok(" src/lib.rs | 1 +\n 1 file changed, 1 insertion(+)".into())
        }
        async fn log(&self, _: &str, _: &str) -> Result<String, ReviewError> {
            Ok("abc123 change".into())
        }
        async fn current_branch(&self) -> Option<String> {
            self.branch.map(str::to_string)
        }
    }

    fn specs() -> Vec<ReviewerSpec> {
        vec![
            ReviewerSpec::new("A", "openai", "m-a", ThinkingLevel::High),
            ReviewerSpec::new("B", "google", "m-b", ThinkingLevel::High),
            ReviewerSpec::new("C", "anthropic", "m-c", ThinkingLevel::High),
        ]
    }

    fn pipeline(
        runtime: Arc<ScriptedRuntime>,
        diff: StaticDiff,
        dir: &std::path::Path,
    ) -> ReviewPipeline {
        let invoker = AgentInvoker::new(runtime, Arc::new(ScriptedResolver::all()), 1024);
        let pool = ReviewerPool::from_specs(&specs(), &invoker, "English", 0);
        let synth = Synthesizer::new(
            invoker,
            ModelSpec {
                provider: "anthropic".into(),
                model: "synth".into(),
                thinking: ThinkingLevel::High,
            },
            "English",
        );
        ReviewPipeline::new(Arc::new(diff), pool, synth, ReportStore::new(dir), "English")
    }

    #[tokio::test]
    async fn empty_diff_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(ScriptedRuntime::new());
        let p = pipeline(
            runtime.clone(),
            StaticDiff {
                diff: "  \n",
                branch: None,
            },
            tmp.path(),
        );

        let outcome = p.run(&ReviewRequest::default()).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::NoChanges);
        assert_eq!(p.state(), PipelineState::NoChanges);
        assert_eq!(runtime.sessions_created(), 0);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn all_failures_abort_before_synthesis() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(
            ScriptedRuntime::new()
                .reply("m-a", ScriptedReply::error("down"))
                .reply("m-b", ScriptedReply::error("down"))
                .reply("m-c", ScriptedReply::error("down"))
                .reply("synth", ScriptedReply::text("unused")),
        );
        let p = pipeline(
            runtime.clone(),
            StaticDiff {
                diff: "+x",
                branch: Some("main"),
            },
            &tmp.path().join("out"),
        );

        let err = p.run(&ReviewRequest::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReviewError>(),
            Some(ReviewError::AllReviewersFailed { attempted: 3 })
        ));
        assert_eq!(p.state(), PipelineState::Aborted);
        assert!(runtime.prompts_for("synth").is_empty());
        assert!(!tmp.path().join("out").exists());
    }

    #[tokio::test]
    async fn partial_success_is_synthesized_and_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(
            ScriptedRuntime::new()
                .reply("m-a", ScriptedReply::text("review A"))
                .reply("m-b", ScriptedReply::error("down"))
                .reply("m-c", ScriptedReply::text("review C"))
                .reply(
                    "synth",
                    ScriptedReply::text(
                        r#"{"summary":"s","score":6,"verdict":"request-changes","items":[]}"#,
                    ),
                ),
        );
        let p = pipeline(
            runtime.clone(),
            StaticDiff {
                diff: "+x",
                branch: Some("feature/login"),
            },
            tmp.path(),
        );

        let request = ReviewRequest {
            focus: Some("security".into()),
            ..ReviewRequest::default()
        };
        let PipelineOutcome::Completed { paths, structured } = p.run(&request).await.unwrap()
        else {
            panic!("expected a completed review");
        };
        assert!(structured);
        assert_eq!(p.state(), PipelineState::Done);
        assert!(p.state().is_terminal());

        let name = paths.report_path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("feature-login_"));
        assert!(paths.items_path.is_some());

        let doc = std::fs::read_to_string(&paths.report_path).unwrap();
        assert!(doc.starts_with("# Code review: feature/login"));
        assert!(doc.contains("> Focus: security"));
        assert!(doc.contains("> Base: origin/main |"));
        assert!(doc.contains("## Review by A"));
        assert!(!doc.contains("## Review by B"));

        let synth_prompt = &runtime.prompts_for("synth")[0];
        assert!(synth_prompt.contains("review A"));
        assert!(synth_prompt.contains("review C"));
        assert!(runtime.prompts_for("m-a")[0].contains("Pay special attention to\nsecurity"));
    }

    #[tokio::test]
    async fn detached_head_is_labelled_head() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(
            ScriptedRuntime::new()
                .reply("m-a", ScriptedReply::text("a"))
                .reply("m-b", ScriptedReply::text("b"))
                .reply("m-c", ScriptedReply::text("c"))
                .reply("synth", ScriptedReply::text("plain prose")),
        );
        let p = pipeline(
            runtime,
            StaticDiff {
                diff: "+x",
                branch: None,
            },
            tmp.path(),
        );

        let PipelineOutcome::Completed { paths, structured } =
            p.run(&ReviewRequest::default()).await.unwrap()
        else {
            panic!("expected a completed review");
        };
        assert!(!structured);
        assert!(paths.items_path.is_none());
        let name = paths.report_path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("HEAD_"));
    }
}
