use std::str::FromStr;

use anyhow::{Context, Result};

/// Service configuration loaded from environment variables.
/// Startup fails if `BACKEND_URL` is missing or a numeric variable does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the AI/LaTeX backend, e.g. `https://backend.internal/api`.
    pub backend_url: String,
    /// Bearer token forwarded to the backend when set.
    pub backend_token: Option<String>,
    pub backend_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            backend_url: require_env("BACKEND_URL")?,
            backend_token: std::env::var("BACKEND_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            backend_timeout_secs: parse_or_default(
                "BACKEND_TIMEOUT_SECS",
                std::env::var("BACKEND_TIMEOUT_SECS").ok(),
                60,
            )?,
            poll_interval_ms: parse_or_default(
                "POLL_INTERVAL_MS",
                std::env::var("POLL_INTERVAL_MS").ok(),
                5000,
            )?,
            poll_max_attempts: parse_or_default(
                "POLL_MAX_ATTEMPTS",
                std::env::var("POLL_MAX_ATTEMPTS").ok(),
                60,
            )?,
            port: parse_or_default("PORT", std::env::var("PORT").ok(), 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{value}'")),
        None => Ok(default),
    }
}
