//! FinTrack Report Service
//!
//! Generates the AI financial report shown on the FinTrack dashboard:
//! - Builds a deterministic prompt from the month's income and expenses
//! - Calls a hosted text-generation backend (Replicate or Gemini)
//! - Coerces the free-form answer into a `{summary, advice}` report
//! - Never fails outward: unusable answers fall back to a fixed report
//!
//! PIPELINE:
//! SUMMARY → PROMPT → GENERATE → EXTRACT → REPORT

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod models;
pub mod prompt;
pub mod store;
pub mod synthesizer;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use extraction::{extract, ExtractionStrategy};
pub use prompt::build_prompt;
pub use synthesizer::{ReportOutcome, ReportSource, ReportSynthesizer};
