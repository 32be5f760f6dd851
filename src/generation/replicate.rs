//! Replicate predictions client
//!
//! Creates a prediction for a hosted model and waits for it to finish. The
//! model streams its answer as a list of text fragments, which are joined
//! into a single string once the prediction succeeds.

use super::{build_http_client, ensure_success, transport_error, GenerationBackend};
use crate::error::ReportError;
use crate::models::{GenerationParams, RawModelOutput, ReportPrompt};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Longest synchronous wait Replicate honours in the `Prefer` header
const MAX_PREFER_WAIT_SECS: u64 = 60;

/// Headroom between the synchronous wait and the client timeout
const PREFER_WAIT_MARGIN_SECS: u64 = 5;

/// Synchronous wait to request; ends before the client timeout so an
/// unfinished prediction comes back in time to be polled
fn prefer_wait_secs(timeout: Duration) -> u64 {
    timeout
        .as_secs()
        .saturating_sub(PREFER_WAIT_MARGIN_SECS)
        .clamp(1, MAX_PREFER_WAIT_SECS)
}

pub struct ReplicateClient {
    client: Client,
    api_token: String,
    model: String,
    base_url: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReplicateClient {
    pub fn new(
        api_token: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            api_token,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            poll_interval: Duration::from_secs(1),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn predictions_url(&self) -> String {
        format!("{}/v1/models/{}/predictions", self.base_url, self.model)
    }

    async fn fetch_prediction(&self, url: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let prediction = ensure_success(response).await?.json().await?;
        Ok(prediction)
    }
}

#[async_trait]
impl GenerationBackend for ReplicateClient {
    fn name(&self) -> &str {
        "replicate"
    }

    async fn generate(
        &self,
        prompt: &ReportPrompt,
        params: &GenerationParams,
    ) -> Result<RawModelOutput> {
        if self.api_token.is_empty() {
            return Err(ReportError::Configuration(
                "REPLICATE_API_TOKEN not configured".to_string(),
            ));
        }

        // No deadline if the timeout is too large to represent
        let deadline = Instant::now().checked_add(self.timeout);

        let request = PredictionRequest {
            input: PredictionInput {
                prompt: prompt.as_str(),
                max_tokens: params.max_tokens,
                temperature: params.temperature,
                system_prompt: params.system_prompt.as_deref(),
            },
        };

        info!(model = %self.model, "Calling Replicate API");

        let response = self
            .client
            .post(self.predictions_url())
            .bearer_auth(&self.api_token)
            .header("Prefer", format!("wait={}", prefer_wait_secs(self.timeout)))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Replicate API request failed: {}", e);
                transport_error(e, self.timeout)
            })?;

        let mut prediction: Prediction = ensure_success(response).await?.json().await?;

        loop {
            match prediction.status {
                PredictionStatus::Succeeded => break,
                PredictionStatus::Starting | PredictionStatus::Processing => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Err(ReportError::Timeout(self.timeout.as_secs()));
                    }

                    let poll_url = prediction.urls.get.clone().ok_or_else(|| {
                        ReportError::Generation(format!(
                            "prediction {} is {:?} but has no poll URL",
                            prediction.id, prediction.status
                        ))
                    })?;

                    debug!(
                        prediction_id = %prediction.id,
                        status = ?prediction.status,
                        "Prediction pending"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                    prediction = self.fetch_prediction(&poll_url).await?;
                }
                PredictionStatus::Failed
                | PredictionStatus::Canceled
                | PredictionStatus::Unknown => {
                    error!(
                        prediction_id = %prediction.id,
                        status = ?prediction.status,
                        "Prediction did not succeed"
                    );
                    return Err(ReportError::Generation(format!(
                        "prediction {} ended as {:?}: {}",
                        prediction.id,
                        prediction.status,
                        prediction.error.unwrap_or_default()
                    )));
                }
            }
        }

        let output = prediction
            .output
            .map(PredictionOutput::into_raw)
            .ok_or(ReportError::EmptyOutput)?;

        info!(
            prediction_id = %prediction.id,
            chars = output.as_str().len(),
            "Replicate prediction completed"
        );

        Ok(output)
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    urls: PredictionUrls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

/// Language models emit a fragment list; some return one string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Fragments(Vec<String>),
    Text(String),
}

impl PredictionOutput {
    fn into_raw(self) -> RawModelOutput {
        match self {
            PredictionOutput::Fragments(fragments) => RawModelOutput::from_fragments(fragments),
            PredictionOutput::Text(text) => RawModelOutput::new(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "ibm-granite/granite-3.3-8b-instruct";

    fn client(server: &MockServer, token: &str) -> ReplicateClient {
        client_with_timeout(server, token, Duration::from_secs(5))
    }

    fn client_with_timeout(server: &MockServer, token: &str, timeout: Duration) -> ReplicateClient {
        ReplicateClient::new(token.to_string(), MODEL.to_string(), server.uri(), timeout)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_prefer_wait_leaves_headroom() {
        assert_eq!(prefer_wait_secs(Duration::from_secs(60)), 55);
        assert_eq!(prefer_wait_secs(Duration::from_secs(600)), MAX_PREFER_WAIT_SECS);
        assert_eq!(prefer_wait_secs(Duration::from_secs(3)), 1);
    }

    #[test]
    fn test_request_serialization() {
        let request = PredictionRequest {
            input: PredictionInput {
                prompt: "Analisis data berikut",
                max_tokens: 512,
                temperature: 0.7,
                system_prompt: None,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"]["prompt"], "Analisis data berikut");
        assert_eq!(json["input"]["max_tokens"], 512);
        assert!(json["input"].get("system_prompt").is_none());
    }

    #[tokio::test]
    async fn test_fragments_are_concatenated() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/v1/models/{}/predictions", MODEL)))
            .and(header("authorization", "Bearer r8_test"))
            .and(body_partial_json(serde_json::json!({
                "input": { "max_tokens": 512 }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p1",
                "status": "succeeded",
                "output": ["{\"summary\": ", "\"A\", \"advice\"", ": \"B\"}"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = client(&server, "r8_test")
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(output.as_str(), "{\"summary\": \"A\", \"advice\": \"B\"}");
    }

    #[tokio::test]
    async fn test_polls_until_prediction_finishes() {
        let server = MockServer::start().await;
        let poll_url = format!("{}/v1/predictions/p2", server.uri());

        Mock::given(method("POST"))
            .and(path(format!("/v1/models/{}/predictions", MODEL)))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p2",
                "status": "processing",
                "output": null,
                "urls": { "get": poll_url }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/predictions/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "p2",
                "status": "succeeded",
                "output": "selesai"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = client(&server, "r8_test")
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(output.as_str(), "selesai");
    }

    #[tokio::test]
    async fn test_prefer_header_is_shorter_than_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("prefer", "wait=55"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p4",
                "status": "succeeded",
                "output": ["ok"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = client_with_timeout(&server, "r8_test", Duration::from_secs(60))
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(output.as_str(), "ok");
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({
                        "id": "p5",
                        "status": "succeeded",
                        "output": ["terlambat"]
                    }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let result = client_with_timeout(&server, "r8_test", Duration::from_secs(1))
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await;

        assert!(matches!(result, Err(ReportError::Timeout(1))), "{:?}", result);
    }

    #[tokio::test]
    async fn test_polling_stops_at_deadline() {
        let server = MockServer::start().await;
        let poll_url = format!("{}/v1/predictions/p6", server.uri());
        let pending = serde_json::json!({
            "id": "p6",
            "status": "processing",
            "output": null,
            "urls": { "get": poll_url }
        });

        Mock::given(method("POST"))
            .and(path(format!("/v1/models/{}/predictions", MODEL)))
            .respond_with(ResponseTemplate::new(201).set_body_json(pending.clone()))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/predictions/p6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pending))
            .mount(&server)
            .await;

        let result = client_with_timeout(&server, "r8_test", Duration::from_secs(1))
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await;

        assert!(matches!(result, Err(ReportError::Timeout(1))), "{:?}", result);

        let polls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.method.as_str() == "GET")
            .count();
        assert!(polls >= 1);
    }

    #[tokio::test]
    async fn test_failed_prediction_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p3",
                "status": "failed",
                "error": "CUDA out of memory"
            })))
            .mount(&server)
            .await;

        let result = client(&server, "r8_test")
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await;

        match result {
            Err(ReportError::Generation(message)) => {
                assert!(message.contains("CUDA out of memory"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthenticated"))
            .mount(&server)
            .await;

        let result = client(&server, "bad")
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await;

        assert!(matches!(
            result,
            Err(ReportError::BackendStatus { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_token_is_configuration_error() {
        let server = MockServer::start().await;

        let result = client(&server, "")
            .generate(&ReportPrompt::new("prompt"), &GenerationParams::default())
            .await;

        assert!(matches!(result, Err(ReportError::Configuration(_))));
    }
}
