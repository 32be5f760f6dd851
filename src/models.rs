//! Core data models for the report pipeline

use serde::{de, Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Category name used when the spending breakdown is empty
pub const NO_EXPENSE_CATEGORY: &str = "Tidak ada pengeluaran";

//
// ================= Financial Data =================
//

/// Figures a report is generated from. Fetched fresh for every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(deserialize_with = "deserialize_amount")]
    pub total_income: f64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub total_expense: f64,
    #[serde(default = "default_top_category")]
    pub top_expense_category: String,
}

impl FinancialSummary {
    pub fn new(
        total_income: f64,
        total_expense: f64,
        top_expense_category: impl Into<String>,
    ) -> Self {
        Self {
            total_income,
            total_expense,
            top_expense_category: top_expense_category.into(),
        }
    }

    /// Combine the dashboard totals with the category breakdown.
    /// The breakdown is ordered largest first.
    pub fn from_dashboard(summary: &DashboardSummary, spending: &[CategorySpending]) -> Self {
        let top_expense_category = spending
            .first()
            .map(|c| c.category_name.clone())
            .unwrap_or_else(default_top_category);

        Self::new(summary.total_income, summary.total_expense, top_expense_category)
    }

    /// Income truncated to whole rupiah
    pub fn whole_income(&self) -> i64 {
        self.total_income.trunc() as i64
    }

    /// Expense truncated to whole rupiah
    pub fn whole_expense(&self) -> i64 {
        self.total_expense.trunc() as i64
    }

    /// Top category, with the sentinel substituted for a blank name
    pub fn top_category(&self) -> &str {
        let name = self.top_expense_category.trim();
        if name.is_empty() {
            NO_EXPENSE_CATEGORY
        } else {
            name
        }
    }
}

fn default_top_category() -> String {
    NO_EXPENSE_CATEGORY.to_string()
}

/// `GET /dashboard/summary` payload of the finance backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "deserialize_amount")]
    pub total_income: f64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub total_expense: f64,
}

/// One row of `GET /reports/spending-by-category`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category_name: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub total_amount: f64,
}

/// The finance backend sends decimals either as JSON numbers or as
/// numeric strings ("1500000.00").
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    let value = match Amount::deserialize(deserializer)? {
        Amount::Number(n) => n,
        Amount::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("invalid amount {:?}: {}", s, e)))?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(de::Error::custom("amount must be a finite number"))
    }
}

//
// ================= Prompt / Output =================
//

/// Prompt text sent to the generation backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportPrompt(String);

impl ReportPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Hex SHA-256 of the prompt text
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for ReportPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unstructured text assembled from the backend's emitted fragments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawModelOutput(String);

impl RawModelOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        for fragment in fragments {
            text.push_str(fragment.as_ref());
        }
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Leading slice for log lines
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.0.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

//
// ================= Report =================
//

/// The two-field report shown to the user. Both fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub summary: String,
    pub advice: String,
}

//
// ================= Generation Parameters =================
//

/// Bounded decoding parameters for a generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}
