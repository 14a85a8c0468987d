//! Report assembly: one Markdown document plus the optional structured result.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;

use super::traits::{Recommendation, ReviewerOutcome, Synthesis, SynthesisResult};

/// Recommendation tiers in the order they are rendered.
const GROUPS: [(Recommendation, &str); 3] = [
    (Recommendation::MustFix, "🔴 Must fix"),
    (Recommendation::Recommended, "🟠 Recommended"),
    (Recommendation::Optional, "🔵 Optional"),
];

/// What the report is about.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub target_label: String,
    pub base_ref: String,
    pub focus: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Assembled report. `structured` is present iff synthesis parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub document: String,
    pub structured: Option<SynthesisResult>,
}

impl Report {
    /// Build the report from every outcome; failed reviewers are left out
    /// of the document.
    pub fn assemble(
        header: &ReportHeader,
        outcomes: &[ReviewerOutcome],
        synthesis: &Synthesis,
    ) -> Self {
        let mut doc = String::new();
        let _ = writeln!(doc, "# Code review: {}", header.target_label);
        let _ = writeln!(
            doc,
            "> Base: {} | Generated: {}",
            header.base_ref,
            header
                .generated_at
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        if let Some(focus) = header.focus.as_deref().filter(|f| !f.trim().is_empty()) {
            let _ = writeln!(doc, "> Focus: {focus}");
        }
        doc.push_str("\n---\n\n");

        for outcome in outcomes.iter().filter(|o| o.is_successful()) {
            let _ = write!(doc, "## Review by {}\n\n{}\n\n---\n\n", outcome.name, outcome.text);
        }

        doc.push_str("## Synthesis\n\n");
        match synthesis.result() {
            Some(result) => doc.push_str(&render_result(result)),
            None => doc.push_str(synthesis.raw()),
        }

        Self {
            document: doc,
            structured: synthesis.result().cloned(),
        }
    }
}

/// Markdown for a parsed synthesis, grouped by recommendation tier.
pub fn render_result(result: &SynthesisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "**Score**: {}/10 | **Verdict**: {}",
        result.score,
        result.verdict.label()
    );
    let _ = writeln!(out, "\n{}\n", result.summary);

    for (tier, label) in GROUPS {
        let mut items = result.items_with(tier).peekable();
        if items.peek().is_none() {
            continue;
        }
        let _ = writeln!(out, "### {label}\n");
        for item in items {
            let _ = writeln!(
                out,
                "#### {} #{} {}",
                item.severity.icon(),
                item.id,
                item.title
            );
            let _ = writeln!(
                out,
                "- **Severity**: {} | **Location**: `{}` | **Reported by**: {}\n",
                item.severity,
                item.location(),
                item.reporters.join(", ")
            );
            let _ = writeln!(out, "{}\n", item.description);
            if !item.suggestion.trim().is_empty() {
                let _ = writeln!(out, "> **Suggestion**: {}\n", item.suggestion);
            }
        }
    }

    let unranked = result.items_with(Recommendation::Unknown).count();
    if unranked > 0 {
        tracing::debug!(unranked, "Items without a known recommendation are kept only in the structured result");
    }
    out
}
