//! Runtime configuration loaded from the process environment

use crate::error::ReportError;
use crate::models::GenerationParams;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REPLICATE_BASE_URL: &str = "https://api.replicate.com";
pub const DEFAULT_REPLICATE_MODEL: &str = "ibm-granite/granite-3.3-8b-instruct";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const MAX_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_PORT: u16 = 8080;

/// Which hosted backend generates report text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Replicate,
    Gemini,
    Mock,
}

impl FromStr for Provider {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "replicate" => Ok(Provider::Replicate),
            "gemini" => Ok(Provider::Gemini),
            "mock" => Ok(Provider::Mock),
            other => Err(ReportError::Configuration(format!(
                "unknown GENERATION_PROVIDER: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: Provider,
    /// Credential for the selected provider; checked at call time
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub params: GenerationParams,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    /// Base URL of the finance REST backend, if report-from-dashboard is enabled
    pub dashboard_base_url: Option<String>,
    pub port: u16,
}

impl AppConfig {
    /// Load `.env` (if present) and read the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("GENERATION_PROVIDER") {
            Some(value) => value.parse()?,
            None => Provider::Replicate,
        };

        let (api_key, model, base_url) = match provider {
            Provider::Replicate => (
                get("REPLICATE_API_TOKEN").unwrap_or_default(),
                get("REPLICATE_MODEL").unwrap_or_else(|| DEFAULT_REPLICATE_MODEL.to_string()),
                get("REPLICATE_BASE_URL").unwrap_or_else(|| DEFAULT_REPLICATE_BASE_URL.to_string()),
            ),
            Provider::Gemini => (
                get("GEMINI_API_KEY").unwrap_or_default(),
                get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            ),
            Provider::Mock => (String::new(), "mock".to_string(), String::new()),
        };

        let defaults = GenerationParams::default();
        let params = GenerationParams {
            max_tokens: parse_or(
                "GENERATION_MAX_TOKENS",
                get("GENERATION_MAX_TOKENS"),
                defaults.max_tokens,
            )?,
            temperature: parse_or(
                "GENERATION_TEMPERATURE",
                get("GENERATION_TEMPERATURE"),
                defaults.temperature,
            )?,
            system_prompt: get("GENERATION_SYSTEM_PROMPT"),
        };

        let timeout_secs = parse_or(
            "GENERATION_TIMEOUT_SECS",
            get("GENERATION_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?;
        if !(1..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(ReportError::Configuration(format!(
                "GENERATION_TIMEOUT_SECS must be between 1 and {}, got {}",
                MAX_TIMEOUT_SECS, timeout_secs
            )));
        }

        let port = parse_or("PORT", get("PORT").or_else(|| get("API_PORT")), DEFAULT_PORT)?;

        Ok(Self {
            generation: GenerationConfig {
                provider,
                api_key,
                model,
                base_url: base_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(timeout_secs),
                params,
            },
            dashboard_base_url: get("DASHBOARD_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            port,
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e| {
            ReportError::Configuration(format!("invalid {} {:?}: {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.generation.provider, Provider::Replicate);
        assert_eq!(config.generation.model, DEFAULT_REPLICATE_MODEL);
        assert_eq!(config.generation.api_key, "");
        assert_eq!(config.generation.timeout, Duration::from_secs(60));
        assert_eq!(config.generation.params, GenerationParams::default());
        assert_eq!(config.port, 8080);
        assert!(config.dashboard_base_url.is_none());
    }

    #[test]
    fn test_gemini_provider() {
        let config = load(&[
            ("GENERATION_PROVIDER", "Gemini"),
            ("GEMINI_API_KEY", "secret"),
            ("GENERATION_TEMPERATURE", "0.2"),
            ("GENERATION_MAX_TOKENS", "256"),
            ("API_PORT", "9000"),
            ("DASHBOARD_API_BASE_URL", "http://localhost:8000/api/"),
        ])
        .unwrap();

        assert_eq!(config.generation.provider, Provider::Gemini);
        assert_eq!(config.generation.api_key, "secret");
        assert_eq!(config.generation.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.generation.params.max_tokens, 256);
        assert!((config.generation.params.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.port, 9000);
        assert_eq!(config.dashboard_base_url.as_deref(), Some("http://localhost:8000/api"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("GENERATION_PROVIDER", "openai")]),
            Err(ReportError::Configuration(_))
        ));
        assert!(matches!(
            load(&[("GENERATION_MAX_TOKENS", "lots")]),
            Err(ReportError::Configuration(_))
        ));
        assert!(matches!(
            load(&[("GENERATION_TIMEOUT_SECS", "0")]),
            Err(ReportError::Configuration(_))
        ));
    }

    #[test]
    fn test_timeout_is_bounded() {
        for value in ["601", "18446744073709551615"] {
            assert!(
                matches!(
                    load(&[("GENERATION_TIMEOUT_SECS", value)]),
                    Err(ReportError::Configuration(_))
                ),
                "timeout {} accepted",
                value
            );
        }

        let config = load(&[("GENERATION_TIMEOUT_SECS", "600")]).unwrap();
        assert_eq!(config.generation.timeout, Duration::from_secs(MAX_TIMEOUT_SECS));
    }
}
