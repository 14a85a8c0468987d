//! Prompt text for reviewers and the synthesizer.

use std::fmt::Write;

use super::traits::ReviewerOutcome;
use crate::vcs::GitInfo;

/// Separator between reviewer sections in prompts and degraded output.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

pub fn reviewer_system_prompt(language: &str) -> String {
    format!(
        "You are a senior software engineer and an expert code reviewer. \
         Review code thoroughly and respond in {language}. \
         When needed you may use the read and bash tools to inspect more of the code."
    )
}

pub fn synthesis_system_prompt(language: &str) -> String {
    format!(
        "You are a senior tech lead. You merge code reviews written by several reviewers \
         into one structured JSON report. Write all prose in {language}."
    )
}

/// Prompt sent to every reviewer.
pub fn build_review_prompt(info: &GitInfo, focus: Option<&str>, language: &str) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "Review the following git diff thoroughly. Write every review comment in {language}.

## Review perspectives
1. **Bugs and latent issues**: runtime errors, edge cases, null/undefined handling, type safety
2. **Design and architecture**: SOLID principles, dependency direction, separation of concerns, extensibility
3. **Code quality**: naming, readability, duplication, complexity
4. **Performance**: unnecessary work, N+1 queries, memory leaks
5. **Tests**: coverage, missing edge-case tests
"
    );

    if let Some(focus) = focus.map(str::trim).filter(|f| !f.is_empty()) {
        let _ = write!(prompt, "\n## Pay special attention to\n{focus}\n");
    }

    let _ = write!(
        prompt,
        "
## Commit history
{log}
## Changed files
{stat}
## Diff
```diff
{diff}
```

Report each issue in this format:
- **file:line** — [Critical/Major/Minor/Suggestion] description

Finish with an overall summary and your opinion: approve or request changes.",
        log = info.commit_log,
        stat = info.stat,
        diff = info.diff,
    );
    prompt
}

/// Each successful review under its reviewer's heading.
fn reviews_section(reviews: &[ReviewerOutcome]) -> String {
    reviews
        .iter()
        .map(|r| format!("## Review by {}\n\n{}", r.name, r.text))
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

/// Prompt for the synthesis call. Embeds every review verbatim.
pub fn build_synthesis_prompt(reviews: &[ReviewerOutcome], language: &str) -> String {
    format!(
        r#"Analyze the code reviews written by {count} reviewers and output the merged result as JSON.

{reviews}

## Output format

Output only JSON in exactly the format below. Do not include any text outside the JSON.

```json
{{
  "summary": "Overall assessment of the change (3-5 sentences covering the key points)",
  "score": 7,
  "verdict": "approve or request-changes",
  "items": [
    {{
      "id": 1,
      "severity": "one of critical | major | minor | suggestion",
      "file": "file path",
      "line": "line number or range (omit if unknown)",
      "title": "issue title (one concise line)",
      "description": "Detailed explanation: why it is a problem and what it affects.",
      "suggestion": "Concrete fix, with a code example where possible.",
      "recommendation": "one of must-fix | recommended | optional",
      "reporters": ["names of the reviewers who raised this issue"]
    }}
  ]
}}
```

### Rules
1. Merge issues raised by two or more reviewers into one item and list all of them in reporters
2. severity: critical (bugs/security) > major (design/performance) > minor (code quality) > suggestion (improvements)
3. recommendation: must-fix > recommended > optional
4. Sort items by severity, critical first; keep discovery order within the same severity
5. Remove duplicates and keep only the essential issues
6. Make every suggestion as concrete as possible: which code to change and how
7. Write summary, title, description and suggestion in {language}"#,
        count = reviews.len(),
        reviews = reviews_section(reviews),
    )
}

/// Deterministic stand-in when no synthesis model is available: every
/// review under its reviewer's name, nothing dropped.
pub fn degraded_synthesis(reviews: &[ReviewerOutcome]) -> String {
    reviews
        .iter()
        .map(|r| format!("# {}\n\n{}", r.name, r.text))
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}
