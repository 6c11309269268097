use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{LlmSettings, DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub prompt_bundle_path: PathBuf,
    /// Used when a client creates a session without its own key.
    pub openai_api_key: Option<String>,
    pub llm_api_base: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    /// Sessions untouched for longer than this are dropped.
    pub session_idle_ttl: chrono::Duration,
    pub session_sweep_interval: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            prompt_bundle_path: PathBuf::from(require_env("PROMPT_BUNDLE_PATH")?),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            llm_api_base: optional_env("LLM_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            llm_model: optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_temperature: match optional_env("LLM_TEMPERATURE") {
                Some(raw) => raw
                    .parse::<f32>()
                    .context("LLM_TEMPERATURE must be a number")?,
                None => DEFAULT_TEMPERATURE,
            },
            session_idle_ttl: chrono::Duration::from_std(Duration::from_secs(secs_env(
                "SESSION_IDLE_TTL_SECS",
                DEFAULT_SESSION_IDLE_TTL_SECS,
            )?))
            .context("SESSION_IDLE_TTL_SECS is out of range")?,
            session_sweep_interval: Duration::from_secs(
                secs_env("SESSION_SWEEP_INTERVAL_SECS", DEFAULT_SESSION_SWEEP_INTERVAL_SECS)?.max(1),
            ),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_base: self.llm_api_base.trim_end_matches('/').to_string(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
        }
    }
}

fn secs_env(key: &str, default: u64) -> Result<u64> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds")),
        None => Ok(default),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are the same thing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            prompt_bundle_path: PathBuf::from("prompts.toml"),
            openai_api_key: None,
            llm_api_base: DEFAULT_API_BASE.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            llm_temperature: DEFAULT_TEMPERATURE,
            session_idle_ttl: chrono::Duration::seconds(DEFAULT_SESSION_IDLE_TTL_SECS as i64),
            session_sweep_interval: Duration::from_secs(DEFAULT_SESSION_SWEEP_INTERVAL_SECS),
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_settings_strip_trailing_slash() {
        let mut config = Config::for_tests();
        config.llm_api_base = "http://localhost:11434/v1/".to_string();
        config.llm_model = "local-model".to_string();
        let settings = config.llm_settings();
        assert_eq!(settings.api_base, "http://localhost:11434/v1");
        assert_eq!(settings.model, "local-model");
        assert!((settings.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
    }
}
