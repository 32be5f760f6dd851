//! Client for the finance REST backend
//!
//! Reads the dashboard totals and the spending breakdown a report is built
//! from. Requests carry the user's bearer token when one is supplied.

use crate::error::ReportError;
use crate::models::{CategorySpending, DashboardSummary, FinancialSummary};
use crate::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Fetching financial data");

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!("Finance API request failed: {}", e);
            ReportError::DataSource(format!("{} unreachable: {}", path, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Finance API error response: {}", body);
            return Err(ReportError::DataSource(format!(
                "{} returned {}",
                path, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ReportError::DataSource(format!("{} returned invalid JSON: {}", path, e)))
    }

    /// `GET /dashboard/summary`
    pub async fn summary(&self, token: Option<&str>) -> Result<DashboardSummary> {
        self.get_json("/dashboard/summary", token).await
    }

    /// `GET /reports/spending-by-category`, largest category first
    pub async fn spending_by_category(&self, token: Option<&str>) -> Result<Vec<CategorySpending>> {
        self.get_json("/reports/spending-by-category", token).await
    }

    /// Fetch both endpoints concurrently and derive the report input
    pub async fn financial_summary(&self, token: Option<&str>) -> Result<FinancialSummary> {
        let (summary, spending) =
            tokio::try_join!(self.summary(token), self.spending_by_category(token))?;

        Ok(FinancialSummary::from_dashboard(&summary, &spending))
    }
}
