//! In-memory language model for tests. Replies are scripted in order and
//! every prompt is recorded so tests can assert on call counts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{CredentialError, LanguageModel, LlmConnector, LlmError};

#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    fallback: Option<String>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        let llm = Self::default();
        for reply in replies {
            llm.push_reply(reply);
        }
        llm
    }

    /// Answers with `text` once the script runs out instead of failing.
    pub fn with_fallback(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, err: LlmError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => Err(LlmError::ServiceUnavailable(
                    "scripted model has no reply left".to_string(),
                )),
            },
        }
    }
}

/// Hands out the same scripted model for every accepted key.
pub struct ScriptedConnector {
    pub llm: Arc<ScriptedLlm>,
    pub rejection: Option<CredentialError>,
}

impl ScriptedConnector {
    pub fn accepting(llm: Arc<ScriptedLlm>) -> Self {
        Self {
            llm,
            rejection: None,
        }
    }

    pub fn rejecting(rejection: CredentialError) -> Self {
        Self {
            llm: Arc::new(ScriptedLlm::default()),
            rejection: Some(rejection),
        }
    }
}

#[async_trait]
impl LlmConnector for ScriptedConnector {
    async fn connect(&self, api_key: &str) -> Result<Arc<dyn LanguageModel>, CredentialError> {
        super::check_key_format(api_key)?;
        if let Some(rejection) = &self.rejection {
            return Err(rejection.clone());
        }
        let llm: Arc<dyn LanguageModel> = self.llm.clone();
        Ok(llm)
    }
}
