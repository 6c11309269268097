use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::interview::error::InterviewError;
use crate::llm_client::{CredentialError, LlmError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Credential rejected: {0}")]
    Credential(#[from] CredentialError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt bundle error: {0}")]
    Prompt(String),
}

impl From<InterviewError> for AppError {
    fn from(err: InterviewError) -> Self {
        match err {
            InterviewError::StageConflict { .. } => AppError::Conflict(err.to_string()),
            InterviewError::InvalidProfile(_) | InterviewError::EmptyInput(_) => {
                AppError::Validation(err.to_string())
            }
            InterviewError::Llm(e) => AppError::Llm(e),
            InterviewError::Render(e) => AppError::Prompt(e.to_string()),
            InterviewError::InvalidSnapshot(_) => AppError::UnprocessableEntity(err.to_string()),
        }
    }
}

impl AppError {
    fn llm_status(err: &LlmError) -> (StatusCode, &'static str) {
        match err {
            LlmError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "LLM_RATE_LIMITED"),
            LlmError::QuotaExceeded(_) => (StatusCode::PAYMENT_REQUIRED, "LLM_QUOTA_EXCEEDED"),
            LlmError::ServiceUnavailable(_) | LlmError::Http(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "LLM_UNAVAILABLE")
            }
            LlmError::AuthenticationFailed(_) | LlmError::Api { .. } | LlmError::EmptyContent => {
                (StatusCode::BAD_GATEWAY, "LLM_ERROR")
            }
        }
    }

    fn credential_status(err: &CredentialError) -> StatusCode {
        match err {
            CredentialError::MalformedFormat => StatusCode::BAD_REQUEST,
            CredentialError::AuthenticationRejected => StatusCode::UNAUTHORIZED,
            CredentialError::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
            CredentialError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            CredentialError::Unknown(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "STAGE_CONFLICT", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Credential(e) => {
                tracing::warn!("Credential rejected: {}", e.reason());
                (Self::credential_status(e), "INVALID_CREDENTIAL", e.to_string())
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                let (status, code) = Self::llm_status(e);
                (
                    status,
                    code,
                    "The language model could not complete the request, please retry".to_string(),
                )
            }
            AppError::Prompt(msg) => {
                tracing::error!("Prompt bundle error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROMPT_BUNDLE_ERROR",
                    "The interview configuration is inconsistent".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let AppError::Credential(e) = &self {
            error["reason"] = json!(e.reason());
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::session::Stage;

    #[test]
    fn test_interview_errors_map_to_http_classes() {
        let conflict = AppError::from(InterviewError::StageConflict {
            action: "submit an answer",
            stage: Stage::Feedback,
        });
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let empty = AppError::from(InterviewError::EmptyInput("answer"));
        assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);

        let snapshot = AppError::from(InterviewError::InvalidSnapshot("bad".to_string()));
        assert_eq!(
            snapshot.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_gateway_failures_map_by_class() {
        let cases = [
            (LlmError::RateLimited("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (LlmError::QuotaExceeded("x".into()), StatusCode::PAYMENT_REQUIRED),
            (
                LlmError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (LlmError::EmptyContent, StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            let app = AppError::from(InterviewError::Llm(err));
            assert_eq!(app.into_response().status(), expected);
        }
    }

    #[test]
    fn test_credential_errors_carry_reason() {
        assert_eq!(
            AppError::from(CredentialError::MalformedFormat)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CredentialError::AuthenticationRejected)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
