//! REST API server for report generation
//!
//! Exposes the report pipeline via HTTP endpoints for the dashboard UI

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::dashboard::DashboardClient;
use crate::models::{FinancialSummary, ReportPrompt};
use crate::store::ReportStore;
use crate::synthesizer::{ReportOutcome, ReportSynthesizer};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub synthesizer: Arc<ReportSynthesizer>,
    pub store: ReportStore,
    pub dashboard: Option<Arc<DashboardClient>>,
}

impl ApiState {
    pub fn new(
        synthesizer: Arc<ReportSynthesizer>,
        dashboard: Option<Arc<DashboardClient>>,
    ) -> Self {
        Self {
            synthesizer,
            store: ReportStore::new(),
            dashboard,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Cache a report for the caller. Anonymous requests are not cached.
async fn remember(state: &ApiState, headers: &HeaderMap, outcome: &ReportOutcome) {
    if let Some(token) = bearer_token(headers) {
        state.store.record(token, outcome).await;
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "backend": state.synthesizer.backend_name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Prompt Endpoint
/// =============================

/// `POST /api/generate-report` — `{prompt}` in, `{summary, advice}` out.
/// Only a missing prompt is an error; generation failures still answer 200
/// with the fallback report.
async fn generate_report(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateReportRequest>, JsonRejection>,
) -> Response {
    let prompt = match payload {
        Ok(Json(req)) => req.prompt.filter(|p| !p.trim().is_empty()),
        Err(rejection) => {
            warn!("Rejected generate-report body: {}", rejection);
            None
        }
    };

    let Some(prompt) = prompt else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Prompt is required".to_string(),
            }),
        )
            .into_response();
    };

    let outcome = state
        .synthesizer
        .generate_from_prompt(&ReportPrompt::new(prompt))
        .await;
    remember(&state, &headers, &outcome).await;

    (StatusCode::OK, Json(outcome.report)).into_response()
}

/// =============================
/// Report Endpoints
/// =============================

async fn create_report(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<FinancialSummary>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let summary = match payload {
        Ok(Json(summary)) => summary,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!(
                    "Invalid financial summary: {}",
                    rejection.body_text()
                ))),
            );
        }
    };

    info!(
        income = summary.whole_income(),
        expense = summary.whole_expense(),
        "Received report request"
    );

    let outcome = state.synthesizer.generate_report(&summary).await;
    remember(&state, &headers, &outcome).await;

    (StatusCode::OK, Json(ApiResponse::success(outcome)))
}

async fn create_report_from_dashboard(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(dashboard) = state.dashboard.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("DASHBOARD_API_BASE_URL not configured".into())),
        );
    };

    let summary = match dashboard.financial_summary(bearer_token(&headers)).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Failed to load financial data: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(format!("Failed to load financial data: {}", e))),
            );
        }
    };

    let outcome = state.synthesizer.generate_report(&summary).await;
    remember(&state, &headers, &outcome).await;

    (StatusCode::OK, Json(ApiResponse::success(outcome)))
}

/// The caller's own last report; requires a bearer token
async fn latest_report(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Bearer token required".into())),
        );
    };

    match state.store.latest(token).await {
        Some(outcome) => (StatusCode::OK, Json(ApiResponse::success(outcome))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("No report generated yet".into())),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate-report", post(generate_report))
        .route("/api/reports", post(create_report))
        .route("/api/reports/dashboard", post(create_report_from_dashboard))
        .route("/api/reports/latest", get(latest_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
