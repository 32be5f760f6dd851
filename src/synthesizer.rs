//! Report synthesis pipeline
//!
//! PROMPT → GENERATE → EXTRACT → DEFAULTS
//!
//! The pipeline is total: every call produces a report. A failed generation
//! call, or model output too thin for even the heuristic split, yields the
//! fixed fallback report instead of an error.

use crate::extraction::{extract_candidate, ExtractionStrategy};
use crate::generation::GenerationBackend;
use crate::models::{FinancialSummary, GenerationParams, ReportPrompt, StructuredReport};
use crate::prompt::build_prompt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const FALLBACK_SUMMARY: &str =
    "Laporan keuangan belum dapat dibuat saat ini. Silakan coba lagi dalam beberapa saat.";

pub const FALLBACK_ADVICE: &str = "1. **Coba buat laporan kembali** dalam beberapa menit.\n2. **Periksa data keuangan Anda** dan pastikan semua pemasukan serta pengeluaran sudah tercatat.";

/// Fixed report returned when the pipeline cannot produce one
pub fn fallback_report() -> StructuredReport {
    StructuredReport {
        summary: FALLBACK_SUMMARY.to_string(),
        advice: FALLBACK_ADVICE.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    GenerationFailed,
    UnusableOutput,
}

/// Where the returned report came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSource {
    Model {
        backend: String,
        strategy: ExtractionStrategy,
    },
    Fallback {
        reason: FallbackReason,
    },
}

impl ReportSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ReportSource::Fallback { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub report_id: Uuid,
    pub report: StructuredReport,
    pub source: ReportSource,
    pub prompt_fingerprint: String,
    pub generated_at: DateTime<Utc>,
}

/// Composes prompt building, generation and extraction
pub struct ReportSynthesizer {
    backend: Arc<dyn GenerationBackend>,
    params: GenerationParams,
}

impl ReportSynthesizer {
    pub fn new(backend: Arc<dyn GenerationBackend>, params: GenerationParams) -> Self {
        Self { backend, params }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Build the prompt for a summary and generate a report from it
    pub async fn generate_report(&self, summary: &FinancialSummary) -> ReportOutcome {
        let prompt = build_prompt(summary);
        self.generate_from_prompt(&prompt).await
    }

    /// Generate a report from a caller-supplied prompt
    pub async fn generate_from_prompt(&self, prompt: &ReportPrompt) -> ReportOutcome {
        let report_id = Uuid::new_v4();
        let prompt_fingerprint = prompt.fingerprint();
        let short_fingerprint = &prompt_fingerprint[..12];
        let span = info_span!(
            "report",
            %report_id,
            prompt = %short_fingerprint,
            backend = self.backend.name()
        );

        let (report, source) = self.run(prompt).instrument(span).await;

        ReportOutcome {
            report_id,
            report,
            source,
            prompt_fingerprint,
            generated_at: Utc::now(),
        }
    }

    async fn run(&self, prompt: &ReportPrompt) -> (StructuredReport, ReportSource) {
        let raw = match self.backend.generate(prompt, &self.params).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Report generation failed, returning fallback report");
                return (
                    fallback_report(),
                    ReportSource::Fallback {
                        reason: FallbackReason::GenerationFailed,
                    },
                );
            }
        };

        let extraction = extract_candidate(&raw);

        if extraction.strategy.is_ambiguous() {
            if let Err(violation) = extraction.candidate.validate() {
                warn!(%violation, "Model output unusable, returning fallback report");
                return (
                    fallback_report(),
                    ReportSource::Fallback {
                        reason: FallbackReason::UnusableOutput,
                    },
                );
            }
        }

        let strategy = extraction.strategy;
        let report = extraction.into_report();

        info!(?strategy, "Report generated");

        (
            report,
            ReportSource::Model {
                backend: self.backend.name().to_string(),
                strategy,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::DEFAULT_ADVICE;
    use crate::generation::MockBackend;

    fn synthesizer(backend: MockBackend) -> ReportSynthesizer {
        ReportSynthesizer::new(Arc::new(backend), GenerationParams::default())
    }

    fn summary() -> FinancialSummary {
        FinancialSummary::new(6_000_000.0, 4_500_000.0, "Makanan")
    }

    #[tokio::test]
    async fn test_structured_output() {
        let outcome = synthesizer(MockBackend::with_output(
            r#"{"summary": "Ringkasan", "advice": "1. Saran"}"#,
        ))
        .generate_report(&summary())
        .await;

        assert_eq!(outcome.report.summary, "Ringkasan");
        assert_eq!(outcome.report.advice, "1. Saran");
        assert_eq!(
            outcome.source,
            ReportSource::Model {
                backend: "mock".to_string(),
                strategy: ExtractionStrategy::Direct,
            }
        );
    }

    #[tokio::test]
    async fn test_generation_failure_returns_fallback() {
        let backend = MockBackend::failing("backend unreachable");
        let outcome = synthesizer(backend.clone()).generate_report(&summary()).await;

        assert_eq!(outcome.report, fallback_report());
        assert_eq!(
            outcome.source,
            ReportSource::Fallback {
                reason: FallbackReason::GenerationFailed
            }
        );
        // single attempt, no retry
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_output_returns_fallback() {
        let outcome = synthesizer(MockBackend::with_output("  \n "))
            .generate_report(&summary())
            .await;

        assert_eq!(outcome.report, fallback_report());
        assert_eq!(
            outcome.source,
            ReportSource::Fallback {
                reason: FallbackReason::UnusableOutput
            }
        );
    }

    #[tokio::test]
    async fn test_prose_output_uses_heuristic() {
        let outcome = synthesizer(MockBackend::with_output(
            "Keuangan stabil. 1. Hemat listrik 2. Kurangi jajan",
        ))
        .generate_report(&summary())
        .await;

        assert!(!outcome.source.is_fallback());
        assert_eq!(outcome.report.summary, "Keuangan stabil. Hemat listrik");
        assert_eq!(outcome.report.advice, "Kurangi jajan");
    }

    #[tokio::test]
    async fn test_missing_advice_is_defaulted() {
        let outcome = synthesizer(MockBackend::with_fragments(vec![
            "Berikut: ".to_string(),
            r#"{"summary": "Hanya ringkasan"}"#.to_string(),
        ]))
        .generate_report(&summary())
        .await;

        assert_eq!(outcome.report.summary, "Hanya ringkasan");
        assert_eq!(outcome.report.advice, DEFAULT_ADVICE);
    }

    #[tokio::test]
    async fn test_same_summary_same_fingerprint() {
        let synth = synthesizer(MockBackend::new());
        let first = synth.generate_report(&summary()).await;
        let second = synth.generate_report(&summary()).await;

        assert_eq!(first.prompt_fingerprint, second.prompt_fingerprint);
        assert_ne!(first.report_id, second.report_id);
    }

    #[test]
    fn test_source_serialization() {
        let json = serde_json::to_value(ReportSource::Fallback {
            reason: FallbackReason::GenerationFailed,
        })
        .unwrap();

        assert_eq!(json["kind"], "fallback");
        assert_eq!(json["reason"], "generation_failed");
    }
}
