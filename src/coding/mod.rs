//! Multi-model code review pipeline.
//!
//! Several reviewer models read the same diff in parallel; one synthesis
//! model merges their prose into a structured verdict.
//!
//! ## Architecture
//!
//! ```text
//!            ┌─▸ reviewer 1 ─┐
//! git diff ──┼─▸ reviewer 2 ─┼─▸ successful reviews ─▸ Synthesizer ─▸ parse_synthesis
//!            └─▸ reviewer N ─┘                                            │
//!                                                                         ▼
//!                                      Report (Markdown + optional items JSON)
//! ```
//!
//! A failed reviewer becomes a failure-marked outcome and is left out of
//! the synthesis; only the failure of every reviewer stops the run. When
//! the synthesis model is missing or its output does not parse, the report
//! carries the raw text instead of structured items.
//!
//! ## Extension
//!
//! Add new reviewers by implementing [`CodeReviewer`] and passing them to
//! [`ReviewerPool::with_reviewers`].

pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod reviewers;
pub mod synthesis;
pub mod traits;

#[allow(unused_imports)]
pub use parser::parse_synthesis;
#[allow(unused_imports)]
pub use pipeline::{PipelineOutcome, PipelineState, ReviewPipeline, ReviewRequest};
#[allow(unused_imports)]
pub use report::{Report, ReportHeader};
#[allow(unused_imports)]
pub use reviewers::{AgentReviewer, ReviewerPool};
#[allow(unused_imports)]
pub use synthesis::Synthesizer;
#[allow(unused_imports)]
pub use traits::{
    CodeReviewer, Recommendation, ReviewItem, ReviewerOutcome, Severity, Synthesis,
    SynthesisResult, Verdict,
};
