use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// The API key is optional at startup; without it the finder answers 500.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub port: u16,
    pub upstream_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_concurrent_requests = parse_or(&var, "MAX_CONCURRENT_REQUESTS", 64usize)?;
        if max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be greater than zero");
        }

        Ok(Config {
            openai_api_key: var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port: parse_or(&var, "PORT", 3000u16)?,
            upstream_timeout: Duration::from_secs(parse_or(&var, "UPSTREAM_TIMEOUT_SECS", 20u64)?),
            max_concurrent_requests,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
