//! Mock backend for development & testing
//!
//! Keeps the service functional without a hosted model.

use super::GenerationBackend;
use crate::error::ReportError;
use crate::models::{GenerationParams, RawModelOutput, ReportPrompt};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CANNED_REPORT: &str = r#"{"summary": "Pemasukan Anda bulan ini masih **lebih besar** dari pengeluaran.", "advice": "1. **Pertahankan** kebiasaan mencatat transaksi.\n2. **Sisihkan** sebagian pemasukan untuk dana darurat."}"#;

#[derive(Debug, Clone)]
enum MockResponse {
    Fragments(Vec<String>),
    Failure(String),
}

/// Returns scripted output (or a scripted failure) for every call
#[derive(Debug, Clone)]
pub struct MockBackend {
    response: MockResponse,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Backend that always answers with a well-formed report
    pub fn new() -> Self {
        Self::with_output(CANNED_REPORT)
    }

    pub fn with_output(text: impl Into<String>) -> Self {
        Self::with_fragments(vec![text.into()])
    }

    pub fn with_fragments(fragments: Vec<String>) -> Self {
        Self {
            response: MockResponse::Fragments(fragments),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backend whose every call fails with a generation error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: MockResponse::Failure(message.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _prompt: &ReportPrompt,
        _params: &GenerationParams,
    ) -> Result<RawModelOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.response {
            MockResponse::Fragments(fragments) => Ok(RawModelOutput::from_fragments(fragments)),
            MockResponse::Failure(message) => Err(ReportError::Generation(message.clone())),
        }
    }
}
