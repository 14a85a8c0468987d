//! Best-effort extraction of a [`SynthesisResult`] from model output.
//!
//! Tiers, first success wins:
//! 1. the first fenced code block (optionally tagged `json`);
//! 2. the whole trimmed text;
//! 3. the span from the first `{` to the last `}`.
//!
//! Tier 3 is greedy: text holding several separate objects, or stray braces
//! in prose around the object, will not decode. Failure is `None`, never an
//! error; callers fall back to the raw text.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::traits::SynthesisResult;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?i:json)?\s*\n?(.*?)\n?```").unwrap());

static BRACED_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Parse synthesis output. Returns `None` when no tier decodes.
pub fn parse_synthesis(text: &str) -> Option<SynthesisResult> {
    if let Some(inner) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        if let Some(result) = decode(inner.as_str()) {
            return Some(result);
        }
        tracing::debug!("Fenced block did not decode, trying the whole text");
    }

    if let Some(result) = decode(text) {
        return Some(result);
    }

    let span = BRACED_SPAN.find(text)?;
    decode(span.as_str())
}

fn decode(candidate: &str) -> Option<SynthesisResult> {
    serde_json::from_str::<SynthesisResult>(candidate.trim())
        .ok()
        .map(ensure_unique_ids)
}

/// Renumber items `1..=n` in their existing order if any id repeats.
fn ensure_unique_ids(mut result: SynthesisResult) -> SynthesisResult {
    let mut seen = HashSet::new();
    let duplicated = result.items.iter().any(|item| !seen.insert(item.id));
    if duplicated {
        tracing::warn!(
            items = result.items.len(),
            "Synthesis returned duplicate item ids; renumbering"
        );
        for (index, item) in result.items.iter_mut().enumerate() {
            item.id = u32::try_from(index + 1).unwrap_or(u32::MAX);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::traits::{Recommendation, ReviewItem, Severity, Verdict};

    fn item(id: u32, severity: Severity, title: &str) -> ReviewItem {
        ReviewItem {
            id,
            severity,
            file: "src/auth.rs".into(),
            line: Some("12".into()),
            title: title.into(),
            description: format!("{title} description"),
            suggestion: format!("fix {title}"),
            recommendation: Recommendation::Recommended,
            reporters: vec!["Alpha".into(), "Beta".into()],
        }
    }

    fn sample() -> SynthesisResult {
        SynthesisResult {
            summary: "Solid change with one risky path.".into(),
            score: 7,
            verdict: Verdict::Approve,
            items: vec![
                item(1, Severity::Critical, "token leak"),
                item(2, Severity::Major, "blocking call"),
                item(3, Severity::Minor, "naming"),
            ],
        }
    }

    fn json() -> String {
        serde_json::to_string_pretty(&sample()).unwrap()
    }

    #[test]
    fn fenced_block_round_trip() {
        let text = format!("```json\n{}\n```", json());
        assert_eq!(parse_synthesis(&text), Some(sample()));
    }

    #[test]
    fn fenced_block_with_surrounding_prose() {
        let text = format!(
            "Here is the merged review.\n\n```json\n{}\n```\n\nLet me know if you need more.",
            json()
        );
        assert_eq!(parse_synthesis(&text), Some(sample()));
    }

    #[test]
    fn untagged_fence_is_accepted() {
        let text = format!("```\n{}\n```", json());
        assert_eq!(parse_synthesis(&text), Some(sample()));
    }

    #[test]
    fn bare_json_parses_via_whole_text() {
        let text = format!("\n  {}  \n", json());
        assert_eq!(parse_synthesis(&text), Some(sample()));
    }

    #[test]
    fn braced_object_inside_garbage() {
        let text = format!("Sure! Result follows: {} -- end of output", json());
        assert_eq!(parse_synthesis(&text), Some(sample()));
    }

    #[test]
    fn broken_fence_falls_through_to_braces() {
        let text = format!(
            "```json\n{{ not json\n```\nCorrected version: {}",
            serde_json::to_string(&sample()).unwrap()
        );
        // Tier 3 spans from the first '{' (inside the broken fence) and fails.
        assert_eq!(parse_synthesis(&text), None);

        let text = format!(
            "```json\nnot json\n```\nCorrected version: {}",
            serde_json::to_string(&sample()).unwrap()
        );
        assert_eq!(parse_synthesis(&text), Some(sample()));
    }

    #[test]
    fn no_structure_returns_none() {
        assert_eq!(parse_synthesis("The code looks fine, approve."), None);
        assert_eq!(parse_synthesis(""), None);
        assert_eq!(parse_synthesis("{\"summary\": \"missing fields\"}"), None);
    }

    #[test]
    fn two_objects_in_prose_do_not_decode() {
        let one = serde_json::to_string(&sample()).unwrap();
        let text = format!("First: {one} and again: {one}");
        assert_eq!(parse_synthesis(&text), None);
    }

    #[test]
    fn item_order_is_preserved() {
        let result = parse_synthesis(&json()).unwrap();
        let severities: Vec<Severity> = result.items.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Major, Severity::Minor]
        );
    }

    #[test]
    fn unsorted_items_keep_synthesizer_order() {
        let mut unsorted = sample();
        unsorted.items = vec![
            item(1, Severity::Minor, "naming"),
            item(2, Severity::Critical, "token leak"),
            item(3, Severity::Major, "blocking call"),
        ];
        let text = format!("```json\n{}\n```", serde_json::to_string(&unsorted).unwrap());
        let result = parse_synthesis(&text).unwrap();
        let order: Vec<(u32, Severity)> = result.items.iter().map(|i| (i.id, i.severity)).collect();
        assert_eq!(
            order,
            vec![
                (1, Severity::Minor),
                (2, Severity::Critical),
                (3, Severity::Major)
            ]
        );
    }

    #[test]
    fn duplicate_ids_are_renumbered_in_place() {
        let mut dup = sample();
        dup.items[1].id = 1;
        dup.items[2].id = 1;
        let result = parse_synthesis(&serde_json::to_string(&dup).unwrap()).unwrap();
        let ids: Vec<u32> = result.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(result.items[1].title, "blocking call");
    }

    #[test]
    fn tolerant_fields_decode() {
        let text = r#"```json
{
  "summary": "ok",
  "score": 9,
  "verdict": "request_changes",
  "items": [
    {"id": 1, "severity": "Major", "file": "a.rs", "line": 7, "title": "t",
     "description": "d", "recommendation": "must_fix"}
  ]
}
```"#;
        let result = parse_synthesis(text).unwrap();
        assert_eq!(result.verdict, Verdict::RequestChanges);
        assert_eq!(result.items[0].line.as_deref(), Some("7"));
        assert_eq!(result.items[0].recommendation, Recommendation::MustFix);
        assert!(result.items[0].reporters.is_empty());
        assert_eq!(result.items[0].suggestion, "");
    }
}
