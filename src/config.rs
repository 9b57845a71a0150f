use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Translation backend
    pub translator_key: String,
    pub translator_endpoint: String,
    pub translator_auth_endpoint: String,

    // Reaper
    pub idle_timeout_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env when present (ignored in production)
        let _ = dotenvy::dotenv();

        Ok(Self {
            translator_key: std::env::var("TRANSLATOR_KEY").context("TRANSLATOR_KEY not set")?,
            translator_endpoint: std::env::var("TRANSLATOR_ENDPOINT")
                .unwrap_or_else(|_| "https://api.cognitive.microsofttranslator.com".to_string()),
            translator_auth_endpoint: std::env::var("TRANSLATOR_AUTH_ENDPOINT").unwrap_or_else(
                |_| "https://api.cognitive.microsoft.com/sts/v1.0/issueToken".to_string(),
            ),
            idle_timeout_minutes: std::env::var("IDLE_TIMEOUT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::constants::IDLE_TIMEOUT_MINUTES),
        })
    }
}
