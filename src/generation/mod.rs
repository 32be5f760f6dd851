//! Text generation backends
//!
//! A backend turns a report prompt into raw model text. Each call makes a
//! single attempt; failures surface as `ReportError` and are never retried
//! here.

use crate::config::{GenerationConfig, Provider};
use crate::error::ReportError;
use crate::models::{GenerationParams, RawModelOutput, ReportPrompt};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod gemini;
pub mod mock;
pub mod replicate;

pub use gemini::GeminiClient;
pub use mock::MockBackend;
pub use replicate::ReplicateClient;

/// Trait for hosted text generation
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short provider name for logs and health output
    fn name(&self) -> &str;

    /// Generate text for a prompt, returning the fully assembled output
    async fn generate(
        &self,
        prompt: &ReportPrompt,
        params: &GenerationParams,
    ) -> Result<RawModelOutput>;
}

/// Long-lived, connection-pooled HTTP client with a request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .build()?;

    Ok(client)
}

/// Build the backend selected by configuration
pub fn create_backend(config: &GenerationConfig) -> Result<Arc<dyn GenerationBackend>> {
    info!(provider = ?config.provider, model = %config.model, "Creating generation backend");

    let backend: Arc<dyn GenerationBackend> = match config.provider {
        Provider::Replicate => Arc::new(ReplicateClient::new(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            config.timeout,
        )?),
        Provider::Gemini => Arc::new(GeminiClient::new(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            config.timeout,
        )?),
        Provider::Mock => Arc::new(MockBackend::new()),
    };

    Ok(backend)
}

/// Map a transport failure, keeping timeouts distinguishable
pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> ReportError {
    if error.is_timeout() {
        ReportError::Timeout(timeout.as_secs())
    } else {
        ReportError::HttpError(error)
    }
}

/// Turn a non-2xx response into `BackendStatus`
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ReportError::BackendStatus {
        status: status.as_u16(),
        body,
    })
}
