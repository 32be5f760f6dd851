//! Error types for the report service

use thiserror::Error;

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Error, Debug)]
pub enum ReportError {

    // =============================
    // Generation Errors
    // =============================

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Generation backend returned {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    #[error("Generation backend returned no output")]
    EmptyOutput,

    // =============================
    // Surrounding Errors
    // =============================

    #[error("Financial data source error: {0}")]
    DataSource(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
