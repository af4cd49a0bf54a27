use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for every oracle call. Not validated here: a missing key
    /// surfaces as a transport failure on the first call.
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Attempts per oracle call. 1 means no retries.
    pub llm_max_attempts: u32,
    /// Upper bound for discovery and detail-fetch calls.
    pub fast_timeout: Duration,
    /// Upper bound for the deep analysis call. `None` lets it run unbounded.
    pub analysis_timeout: Option<Duration>,
    /// Sessions untouched for this long are dropped.
    pub session_idle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", 1_u32)
                .context("LLM_MAX_ATTEMPTS must be a positive integer")?
                .max(1),
            fast_timeout: Duration::from_secs(
                parse_env("LLM_FAST_TIMEOUT_SECS", 120_u64)
                    .context("LLM_FAST_TIMEOUT_SECS must be a number of seconds")?,
            ),
            analysis_timeout: optional_env::<u64>("ANALYSIS_TIMEOUT_SECS")
                .context("ANALYSIS_TIMEOUT_SECS must be a number of seconds")?
                .map(Duration::from_secs),
            session_idle: Duration::from_secs(
                parse_env("SESSION_IDLE_SECS", 3600_u64)
                    .context("SESSION_IDLE_SECS must be a number of seconds")?,
            ),
        })
    }

    /// Problems worth logging once tracing is up. None of them stop startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.anthropic_api_key.trim().is_empty() {
            warnings.push("ANTHROPIC_API_KEY is not set; oracle calls will fail".to_string());
        }
        warnings
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(optional_env(key)?.unwrap_or(default))
}

fn optional_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value '{raw}' for environment variable '{key}'")),
        _ => Ok(None),
    }
}
