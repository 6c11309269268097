use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::profile::{Profile, ProfileForm};
use crate::interview::session::{
    parse_snapshot, AnswerOutcome, CurrentQuestion, InterviewSession, SessionState, Stage,
};
use crate::interview::transcript::Turn;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct CreateSessionRequest {
    /// Falls back to the server-wide key when omitted.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Deserialize)]
pub struct ImportSessionRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    pub snapshot: serde_json::Value,
}

#[derive(Deserialize)]
pub struct TextInput {
    pub text: String,
}

#[derive(Deserialize, Default)]
pub struct RestartRequest {
    #[serde(default)]
    pub preserve_profile: bool,
}

/// What a client needs to draw the interview screen.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub stage: Stage,
    pub question_index: usize,
    pub total_questions: usize,
    /// 1-based position for a progress bar, capped at `total_questions`.
    pub progress: usize,
    pub current_title: Option<String>,
    pub followup_depth: u32,
    pub interrupted: bool,
    pub has_report: bool,
    pub profile: Option<Profile>,
}

impl SessionView {
    pub fn of(session: &InterviewSession) -> Self {
        let state = session.state();
        let total_questions = session.bundle().catalog.len();
        Self {
            id: session.id(),
            created_at: session.created_at(),
            last_active: session.last_active(),
            stage: state.stage,
            question_index: state.question_index,
            total_questions,
            progress: (state.question_index + 1).min(total_questions),
            current_title: session.current_spec().map(|spec| spec.title.clone()),
            followup_depth: state.followup_depth,
            interrupted: state.interrupted,
            has_report: state.feedback_report.is_some(),
            profile: state.profile.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct AnswerResponse {
    pub result: AnswerOutcome,
    pub session: SessionView,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    pub report: String,
    pub interrupted: bool,
}

#[derive(Serialize)]
pub struct TranscriptResponse {
    pub text: String,
    pub turns: Vec<Turn>,
}

async fn open(state: &AppState, id: Uuid) -> Result<OwnedMutexGuard<InterviewSession>, AppError> {
    state
        .sessions
        .open(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

fn resolve_api_key(state: &AppState, supplied: Option<String>) -> Result<String, AppError> {
    supplied
        .filter(|key| !key.trim().is_empty())
        .or_else(|| state.config.openai_api_key.clone())
        .ok_or_else(|| AppError::Validation("api_key is required".to_string()))
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    req: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let api_key = resolve_api_key(&state, req.api_key)?;
    let llm = state.connector.connect(&api_key).await?;

    let session = InterviewSession::new(state.bundle.clone(), llm);
    let view = SessionView::of(&session);
    state.sessions.insert(session).await;
    info!("Live sessions: {}", state.sessions.count().await);
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/v1/sessions/import
pub async fn handle_import_session(
    State(state): State<AppState>,
    Json(req): Json<ImportSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let snapshot = parse_snapshot(req.snapshot)?;
    let api_key = resolve_api_key(&state, req.api_key)?;
    let llm = state.connector.connect(&api_key).await?;

    let session = InterviewSession::from_snapshot(snapshot, state.bundle.clone(), llm)?;
    let view = SessionView::of(&session);
    state.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = open(&state, id).await?;
    Ok(Json(SessionView::of(&session)))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.sessions.remove(id).await {
        return Err(AppError::NotFound(format!("Session {id} not found")));
    }
    info!("Session {id} closed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/profile
pub async fn handle_submit_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<ProfileForm>,
) -> Result<Json<SessionView>, AppError> {
    let mut session = open(&state, id).await?;
    session.submit_profile(form)?;
    Ok(Json(SessionView::of(&session)))
}

/// POST /api/v1/sessions/:id/introduction
pub async fn handle_submit_introduction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TextInput>,
) -> Result<Json<SessionView>, AppError> {
    let mut session = open(&state, id).await?;
    session.submit_introduction(&input.text)?;
    Ok(Json(SessionView::of(&session)))
}

/// GET /api/v1/sessions/:id/question
pub async fn handle_current_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CurrentQuestion>, AppError> {
    let mut session = open(&state, id).await?;
    Ok(Json(session.current_question().await?))
}

/// POST /api/v1/sessions/:id/answer
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TextInput>,
) -> Result<Json<AnswerResponse>, AppError> {
    let mut session = open(&state, id).await?;
    let result = session.submit_answer(&input.text).await?;
    Ok(Json(AnswerResponse {
        result,
        session: SessionView::of(&session),
    }))
}

/// POST /api/v1/sessions/:id/skip
pub async fn handle_skip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let mut session = open(&state, id).await?;
    session.skip_to_feedback()?;
    Ok(Json(SessionView::of(&session)))
}

/// POST /api/v1/sessions/:id/restart
pub async fn handle_restart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<RestartRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let mut session = open(&state, id).await?;
    session.restart(req.preserve_profile);
    Ok(Json(SessionView::of(&session)))
}

/// GET /api/v1/sessions/:id/feedback
pub async fn handle_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let mut session = open(&state, id).await?;
    let report = session.feedback().await?;
    Ok(Json(FeedbackResponse {
        report,
        interrupted: session.state().interrupted,
    }))
}

/// GET /api/v1/sessions/:id/transcript
pub async fn handle_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, AppError> {
    let session = open(&state, id).await?;
    Ok(Json(TranscriptResponse {
        text: session.transcript_text(),
        turns: session.state().transcript.turns().to_vec(),
    }))
}

/// GET /api/v1/sessions/:id/snapshot
pub async fn handle_snapshot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionState>, AppError> {
    let session = open(&state, id).await?;
    Ok(Json(session.state().clone()))
}
