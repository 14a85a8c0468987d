//! Multi-model code review.
//!
//! Runs several reviewer models over one git diff in parallel, merges their
//! reviews with a synthesis model and writes a Markdown report plus the
//! structured review items.

pub mod agent;
pub mod coding;
pub mod config;
pub mod error;
pub mod store;
pub mod vcs;
