/// LLM Client — the single point of entry for all language-model calls in Rollplay.
///
/// ARCHITECTURAL RULE: No other module may call the completion API directly.
/// Interview code only sees the `LanguageModel` trait; `LlmClient` is the
/// production backend (OpenAI-compatible chat completions).
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(test)]
pub mod mock;
pub mod prompts;

/// Model used when `LLM_MODEL` is not configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Every accepted credential starts with this prefix.
pub const API_KEY_PREFIX: &str = "sk-";

const MAX_TOKENS: u32 = 2048;
const PROBE_MAX_TOKENS: u32 = 1;
/// Transport failures and 5xx responses only. Auth, quota and rate-limit
/// failures are surfaced on the first attempt.
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Language model service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Why a credential could not be used to start a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("API key is malformed (expected a key starting with 'sk-')")]
    MalformedFormat,

    #[error("API key was rejected by the language model service")]
    AuthenticationRejected,

    #[error("API key has no remaining quota or billing is not set up")]
    QuotaExceeded,

    #[error("Language model service is rate limiting this key, try again later")]
    RateLimited,

    #[error("API key could not be validated: {0}")]
    Unknown(String),
}

impl CredentialError {
    /// Stable reason class reported to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            CredentialError::MalformedFormat => "malformed_format",
            CredentialError::AuthenticationRejected => "authentication_rejected",
            CredentialError::QuotaExceeded => "quota_exceeded",
            CredentialError::RateLimited => "rate_limited",
            CredentialError::Unknown(_) => "unknown",
        }
    }
}

impl From<LlmError> for CredentialError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::AuthenticationFailed(_) => CredentialError::AuthenticationRejected,
            LlmError::QuotaExceeded(_) => CredentialError::QuotaExceeded,
            LlmError::RateLimited(_) => CredentialError::RateLimited,
            other => CredentialError::Unknown(other.to_string()),
        }
    }
}

/// The text-generation boundary. One prompt in, one completion out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Turns a user-supplied credential into a ready-to-use model handle.
///
/// Carried in `AppState` as `Arc<dyn LlmConnector>` so tests can swap the
/// live probe for an in-memory model.
#[async_trait]
pub trait LlmConnector: Send + Sync {
    async fn connect(&self, api_key: &str) -> Result<Arc<dyn LanguageModel>, CredentialError>;
}

/// Endpoint and sampling settings shared by every client the service builds.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

/// Production client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(api_key: String, settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    /// Makes a raw call to the completion API, returning the full response object.
    /// Retries transport failures and 5xx responses with exponential backoff.
    pub async fn call(&self, prompt: &str, max_tokens: u32) -> Result<ChatResponse, LlmError> {
        let request_body = ChatRequest {
            model: &self.settings.model,
            max_tokens,
            temperature: self.settings.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let url = format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        );

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::ServiceUnavailable(e.to_string()));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::ServiceUnavailable(format!("{status}: {body}")));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(classify_failure(status.as_u16(), &error_signal(&body)));
            }

            let chat_response: ChatResponse = response.json().await?;

            if let Some(usage) = &chat_response.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return Ok(chat_response);
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::ServiceUnavailable(format!("no response after {MAX_ATTEMPTS} attempts"))
        }))
    }

    /// Cheapest possible request: one output token. Only the status matters.
    pub async fn probe(&self) -> Result<(), LlmError> {
        self.call(prompts::PROBE_PROMPT, PROBE_MAX_TOKENS).await?;
        Ok(())
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, MAX_TOKENS).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text.to_string())
    }
}

/// Builds `LlmClient`s for user-supplied keys after a format check and a live probe.
pub struct OpenAiConnector {
    settings: LlmSettings,
}

impl OpenAiConnector {
    pub fn new(settings: LlmSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl LlmConnector for OpenAiConnector {
    async fn connect(&self, api_key: &str) -> Result<Arc<dyn LanguageModel>, CredentialError> {
        let api_key = check_key_format(api_key)?;
        let client = LlmClient::new(api_key.to_string(), self.settings.clone())
            .map_err(|e| CredentialError::Unknown(e.to_string()))?;

        client.probe().await.map_err(|e| {
            warn!("Credential probe failed: {e}");
            CredentialError::from(e)
        })?;

        info!("Credential validated against {}", self.settings.api_base);
        let llm: Arc<dyn LanguageModel> = Arc::new(client);
        Ok(llm)
    }
}

/// Cheap local check performed before any request is spent on the key.
pub fn check_key_format(api_key: &str) -> Result<&str, CredentialError> {
    let key = api_key.trim();
    match key.strip_prefix(API_KEY_PREFIX) {
        Some(rest) if !rest.is_empty() && !rest.contains(char::is_whitespace) => Ok(key),
        _ => Err(CredentialError::MalformedFormat),
    }
}

/// Maps a failed response to a gateway error class from its status and
/// the service's own error code/message.
pub fn classify_failure(status: u16, signal: &str) -> LlmError {
    let lower = signal.to_lowercase();
    let message = signal.to_string();

    if status == 401
        || status == 403
        || lower.contains("invalid_api_key")
        || lower.contains("incorrect api key")
    {
        LlmError::AuthenticationFailed(message)
    } else if status == 402
        || lower.contains("insufficient_quota")
        || lower.contains("exceeded your current quota")
        || lower.contains("billing")
    {
        LlmError::QuotaExceeded(message)
    } else if status == 429 || lower.contains("rate limit") || lower.contains("rate_limit") {
        LlmError::RateLimited(message)
    } else if status >= 500 {
        LlmError::ServiceUnavailable(message)
    } else {
        LlmError::Api { status, message }
    }
}

/// Flattens an error body into "code type: message", falling back to the raw body.
fn error_signal(body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => {
            let err = envelope.error;
            let prefix = [err.code, err.error_type]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if prefix.is_empty() {
                err.message
            } else {
                format!("{prefix}: {}", err.message)
            }
        }
        Err(_) => body.to_string(),
    }
}
