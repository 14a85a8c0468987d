//! Types and trait definitions for the multi-model code review pipeline.
//!
//! Reviewers implement [`CodeReviewer`] and return free-form prose; only
//! the synthesis step produces structured [`ReviewItem`]s.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::agent::is_failure_text;

// ── Severity ─────────────────────────────────────────────────────

/// Severity of a synthesized review item, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Bugs and security problems.
    #[serde(alias = "Critical", alias = "CRITICAL")]
    Critical,
    /// Design and performance problems.
    #[serde(alias = "Major", alias = "MAJOR")]
    Major,
    /// Code quality.
    #[serde(alias = "Minor", alias = "MINOR")]
    Minor,
    /// Improvement ideas.
    #[serde(alias = "Suggestion", alias = "SUGGESTION")]
    Suggestion,
    /// Anything the synthesizer wrote that is not one of the above.
    #[serde(other)]
    Unknown,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Suggestion => "suggestion",
            Self::Unknown => "unknown",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Critical => "🔴",
            Self::Major => "🟠",
            Self::Minor => "🟡",
            Self::Suggestion => "🔵",
            Self::Unknown => "⚪",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Recommendation ───────────────────────────────────────────────

/// How strongly an item should be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    #[serde(alias = "must_fix", alias = "mustfix")]
    MustFix,
    Recommended,
    Optional,
    #[serde(other)]
    Unknown,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Self::MustFix => "must-fix",
            Self::Recommended => "recommended",
            Self::Optional => "optional",
            Self::Unknown => "unknown",
        }
    }
}

// ── Verdict ──────────────────────────────────────────────────────

/// Overall verdict of the synthesized review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    #[serde(alias = "APPROVE", alias = "Approve")]
    Approve,
    #[serde(alias = "request_changes", alias = "REQUEST_CHANGES")]
    RequestChanges,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "✅ Approve",
            Self::RequestChanges => "🔄 Request changes",
        }
    }
}

// ── Review item ──────────────────────────────────────────────────

/// One deduplicated issue from the synthesis step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: u32,
    pub severity: Severity,
    pub file: String,
    /// Line number or range, e.g. `42` or `10-20`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "line_from_string_or_number"
    )]
    pub line: Option<String>,
    pub title: String,
    pub description: String,
    /// Concrete fix.
    #[serde(default)]
    pub suggestion: String,
    pub recommendation: Recommendation,
    /// Names of the reviewers that raised this issue.
    #[serde(default)]
    pub reporters: Vec<String>,
}

impl ReviewItem {
    /// `file:line`, or just the file when no line is known.
    pub fn location(&self) -> String {
        match self.line.as_deref().map(str::trim) {
            Some(line) if !line.is_empty() => format!("{}:{}", self.file, line),
            _ => self.file.clone(),
        }
    }
}

fn line_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Line {
        Text(String),
        Number(u64),
    }

    Ok(match Option::<Line>::deserialize(deserializer)? {
        Some(Line::Text(s)) if !s.trim().is_empty() => Some(s),
        Some(Line::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ── Synthesis result ─────────────────────────────────────────────

/// Structured outcome of the synthesis step. Items keep the order the
/// synthesizer produced (severity first, then discovery order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub summary: String,
    /// Intended range 1–10; not enforced.
    pub score: i64,
    pub verdict: Verdict,
    #[serde(default)]
    pub items: Vec<ReviewItem>,
}

impl SynthesisResult {
    pub fn items_with(&self, recommendation: Recommendation) -> impl Iterator<Item = &ReviewItem> {
        self.items
            .iter()
            .filter(move |i| i.recommendation == recommendation)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.items.iter().filter(|i| i.severity == severity).count()
    }
}

/// Synthesis output: either a parsed result or only the raw text.
///
/// The raw text is always kept so a report can be rendered either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    Parsed { result: SynthesisResult, raw: String },
    Unparsed { raw: String },
}

impl Synthesis {
    pub fn result(&self) -> Option<&SynthesisResult> {
        match self {
            Self::Parsed { result, .. } => Some(result),
            Self::Unparsed { .. } => None,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::Parsed { raw, .. } | Self::Unparsed { raw } => raw,
        }
    }

    pub fn into_result(self) -> Option<SynthesisResult> {
        match self {
            Self::Parsed { result, .. } => Some(result),
            Self::Unparsed { .. } => None,
        }
    }
}

// ── Reviewer outcome ─────────────────────────────────────────────

/// What one reviewer produced: its review text or a failure-marked text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerOutcome {
    pub name: String,
    pub text: String,
}

impl ReviewerOutcome {
    pub fn is_successful(&self) -> bool {
        !is_failure_text(&self.text)
    }
}

// ── Code reviewer trait ──────────────────────────────────────────

/// A code review agent.
///
/// Implementations wrap a specific model and turn a review prompt into
/// free-form review text.
#[async_trait]
pub trait CodeReviewer: Send + Sync {
    /// Display name, e.g. "Claude Opus 4.6".
    fn name(&self) -> &str;

    /// `provider/model` label for logs.
    fn model_label(&self) -> String;

    /// Run the review. Errors are isolated by the pool.
    async fn review(&self, prompt: &str) -> anyhow::Result<String>;
}

// ── Tests ────────────────────────────────────────────────────────
