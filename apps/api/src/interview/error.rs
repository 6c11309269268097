//! Error type for every interview operation below the HTTP layer.

use thiserror::Error;

use crate::interview::profile::MissingProfileFields;
use crate::interview::session::Stage;
use crate::interview::templates::RenderError;
use crate::llm_client::LlmError;

#[derive(Debug, Error)]
pub enum InterviewError {
    /// The action is not valid in the session's current stage. No state changed.
    #[error("cannot {action} while the session is in stage {stage:?}")]
    StageConflict { action: &'static str, stage: Stage },

    #[error("{0}")]
    InvalidProfile(MissingProfileFields),

    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    #[error("language model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("prompt bundle does not match the interview: {0}")]
    Render(#[from] RenderError),

    #[error("snapshot rejected: {0}")]
    InvalidSnapshot(String),
}
