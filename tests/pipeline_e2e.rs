//! End-to-end review runs against scripted models and a static diff.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use multi_review::agent::fakes::{ScriptedReply, ScriptedResolver, ScriptedRuntime};
use multi_review::agent::{AgentInvoker, ThinkingLevel};
use multi_review::coding::{PipelineOutcome, ReviewPipeline, ReviewRequest, SynthesisResult, Verdict};
use multi_review::config::{Config, ModelSpec, ReviewerSpec};
use multi_review::error::ReviewError;
use multi_review::vcs::DiffProvider;

const SYNTHESIS_REPLY: &str = r#"Here is the merged review:

```json
{
  "summary": "The login flow works but leaks the session token in logs.",
  "score": 7,
  "verdict": "approve",
  "items": [
    {
      "id": 1,
      "severity": "critical",
      "file": "src/auth.rs",
      "line": "42",
      "title": "Session token logged",
      "description": "The token is written to the info log.",
      "suggestion": "Log a hash of the token instead.",
      "recommendation": "must-fix",
      "reporters": ["Alpha", "Gamma"]
    },
    {
      "id": 2,
      "severity": "minor",
      "file": "src/auth.rs",
      "title": "Unclear variable name",
      "description": "`t` should describe what it holds.",
      "suggestion": "Rename to `token`.",
      "recommendation": "optional",
      "reporters": ["Gamma"]
    }
  ]
}
```"#;

struct LoginDiff;

#[async_trait]
impl DiffProvider for LoginDiff {
    async fn resolve_ref(&self, name: &str) -> String {
        name.to_string()
    }

    async fn diff(&self, _base: &str, _target: &str) -> Result<String, ReviewError> {
        Ok("diff --git a/src/auth.rs b/src/auth.rs\n+    info!(\"token={t}\");\n".into())
    }

    async fn stat(&self, _base: &str, _target: &str) -> Result<String, ReviewError> {
        Ok(" src/auth.rs | 1 +\n 1 file changed, 1 insertion(+)\n".into())
    }

    async fn log(&self, _base: &str, _target: &str) -> Result<String, ReviewError> {
        Ok("1a2b3c4 log session token\n".into())
    }

    async fn current_branch(&self) -> Option<String> {
        Some("feature/login".into())
    }
}

fn config(output_dir: &Path) -> Config {
    Config {
        output_dir: output_dir.to_string_lossy().into_owned(),
        response_language: "English".into(),
        reviewers: vec![
            ReviewerSpec::new("Alpha", "openai", "alpha-1", ThinkingLevel::XHigh),
            ReviewerSpec::new("Acme", "acme", "x1", ThinkingLevel::High),
            ReviewerSpec::new("Gamma", "anthropic", "gamma-1", ThinkingLevel::XHigh),
        ],
        synthesis: ModelSpec {
            provider: "anthropic".into(),
            model: "synth-1".into(),
            thinking: ThinkingLevel::High,
        },
        ..Config::default()
    }
}

fn reviewer_runtime() -> ScriptedRuntime {
    ScriptedRuntime::new()
        .reply(
            "alpha-1",
            ScriptedReply::chunks(&["- **src/auth.rs:42** — [Critical] ", "token is logged"]),
        )
        .reply("gamma-1", ScriptedReply::text("The token leaks into logs; also rename `t`."))
}

fn pipeline(runtime: Arc<ScriptedRuntime>, resolver: ScriptedResolver, out: &Path) -> ReviewPipeline {
    let invoker = AgentInvoker::new(runtime, Arc::new(resolver), 4096);
    ReviewPipeline::from_config(&config(out), invoker, Arc::new(LoginDiff))
}

#[tokio::test]
async fn partial_failure_still_produces_structured_report() {
    let tmp = tempfile::tempdir().unwrap();
    let runtime = Arc::new(
        reviewer_runtime().reply("synth-1", ScriptedReply::text(SYNTHESIS_REPLY)),
    );
    let p = pipeline(runtime.clone(), ScriptedResolver::except(&["acme/x1"]), tmp.path());

    let request = ReviewRequest::default();
    let PipelineOutcome::Completed { paths, structured } = p.run(&request).await.unwrap() else {
        panic!("expected a completed review");
    };
    assert!(structured);

    let items_path = paths.items_path.expect("items artifact");
    let items: SynthesisResult =
        serde_json::from_str(&std::fs::read_to_string(items_path).unwrap()).unwrap();
    assert_eq!(items.items.len(), 2);
    assert_eq!(items.score, 7);
    assert_eq!(items.verdict, Verdict::Approve);

    let doc = std::fs::read_to_string(&paths.report_path).unwrap();
    assert!(doc.contains("## Review by Alpha\n\n- **src/auth.rs:42** — [Critical] token is logged"));
    assert!(doc.contains("## Review by Gamma"));
    assert!(!doc.contains("## Review by Acme"));
    assert!(doc.contains("**Verdict**: ✅ Approve"));
    assert!(doc.contains("#### 🔴 #1 Session token logged"));

    // Only successful reviews reach the synthesizer.
    let synth_prompts = runtime.prompts_for("synth-1");
    assert_eq!(synth_prompts.len(), 1);
    assert!(synth_prompts[0].contains("## Review by Alpha"));
    assert!(!synth_prompts[0].contains("Acme"));

    // Every opened session was disposed: two reviewers plus synthesis.
    assert_eq!(runtime.sessions_created(), 3);
    assert_eq!(runtime.sessions_disposed(), 3);
}

#[tokio::test]
async fn missing_synthesis_model_degrades_to_raw_reviews() {
    let tmp = tempfile::tempdir().unwrap();
    let runtime = Arc::new(reviewer_runtime());
    let p = pipeline(
        runtime.clone(),
        ScriptedResolver::except(&["acme/x1", "anthropic/synth-1"]),
        tmp.path(),
    );

    let PipelineOutcome::Completed { paths, structured } =
        p.run(&ReviewRequest::default()).await.unwrap()
    else {
        panic!("expected a completed review");
    };
    assert!(!structured);
    assert!(paths.items_path.is_none());

    let json = serde_json::to_value(&paths).unwrap();
    assert!(json["itemsPath"].is_null());

    let doc = std::fs::read_to_string(&paths.report_path).unwrap();
    let synthesis = doc.split("## Synthesis\n\n").nth(1).unwrap();
    assert!(synthesis.starts_with("# Alpha\n\n- **src/auth.rs:42**"));
    assert!(synthesis.contains("\n\n---\n\n# Gamma\n\nThe token leaks into logs"));
    assert!(runtime.prompts_for("synth-1").is_empty());
}

#[tokio::test]
async fn total_failure_aborts_without_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("reviews");
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .reply("alpha-1", ScriptedReply::error("401 unauthorized"))
            .reply("gamma-1", ScriptedReply::error("overloaded"))
            .reply("synth-1", ScriptedReply::text(SYNTHESIS_REPLY)),
    );
    let p = pipeline(runtime.clone(), ScriptedResolver::except(&["acme/x1"]), &out);

    let err = p.run(&ReviewRequest::default()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReviewError>(),
        Some(ReviewError::AllReviewersFailed { attempted: 3 })
    ));
    assert!(runtime.prompts_for("synth-1").is_empty());
    assert!(!out.exists());
}
