//! Interview Session — the state machine that drives one interview.
//!
//! Stages: ProfileCollection → Introduction → Questioning → Feedback (terminal).
//! `restart` returns to ProfileCollection from anywhere.
//!
//! Every mutating action either fully applies or leaves `SessionState`
//! untouched: model calls run against a staged copy of the transcript and
//! results are committed only after the last call succeeded. The one
//! exception is the question cache, which is filled as soon as text exists
//! because regenerating it would cost another call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::interview::bundle::{PromptBundle, QuestionSpec};
use crate::interview::error::InterviewError;
use crate::interview::feedback::{add_newlines_by_period, compile_feedback};
use crate::interview::judge::{needs_followup, MAX_FOLLOWUPS};
use crate::interview::profile::{Profile, ProfileForm};
use crate::interview::question::{generate_question, QuestionKind};
use crate::interview::transcript::{Speaker, Transcript};
use crate::llm_client::LanguageModel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    ProfileCollection,
    Introduction,
    Questioning,
    Feedback,
}

/// Everything that makes up one interview. Also the snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub stage: Stage,
    pub profile: Option<Profile>,
    pub transcript: Transcript,
    /// Index into the catalog of the question being asked.
    pub question_index: usize,
    /// Follow-ups already asked for the current question.
    pub followup_depth: u32,
    /// Set only by an explicit skip.
    pub interrupted: bool,
    /// Cached text for `(question_index, followup_depth)`.
    pub pending_question_text: Option<String>,
    pub feedback_report: Option<String>,
}

/// What happened after an answer was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Followup { followup_depth: u32 },
    NextQuestion { question_index: usize },
    Completed,
}

/// The question currently put to the candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentQuestion {
    pub question_index: usize,
    pub total_questions: usize,
    pub title: String,
    pub followup_depth: u32,
    pub text: String,
    /// `text` with a line break after every sentence.
    pub display_text: String,
}

pub struct InterviewSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    state: SessionState,
    bundle: Arc<PromptBundle>,
    llm: Arc<dyn LanguageModel>,
}

impl InterviewSession {
    pub fn new(bundle: Arc<PromptBundle>, llm: Arc<dyn LanguageModel>) -> Self {
        let id = Uuid::new_v4();
        info!("Session {id} created");
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_active: now,
            state: SessionState::default(),
            bundle,
            llm,
        }
    }

    /// Resumes a session from a snapshot after checking it against the bundle.
    pub fn from_snapshot(
        state: SessionState,
        bundle: Arc<PromptBundle>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self, InterviewError> {
        validate_snapshot(&state, &bundle)?;
        let id = Uuid::new_v4();
        info!(
            "Session {id} resumed at stage {:?}, question {}, depth {}",
            state.stage, state.question_index, state.followup_depth
        );
        let now = Utc::now();
        Ok(Self {
            id,
            created_at: now,
            last_active: now,
            state,
            bundle,
            llm,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Marks the session as used now; idle expiry counts from here.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn bundle(&self) -> &PromptBundle {
        &self.bundle
    }

    pub fn transcript_text(&self) -> String {
        self.state.transcript.render(&self.bundle.labels)
    }

    /// Catalog questions that received at least one answer.
    pub fn answered_questions(&self) -> usize {
        let in_progress = usize::from(self.state.followup_depth > 0);
        (self.state.question_index + in_progress).min(self.bundle.catalog.len())
    }

    pub fn current_spec(&self) -> Option<&QuestionSpec> {
        match self.state.stage {
            Stage::Questioning => self.bundle.catalog.get(self.state.question_index),
            _ => None,
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Actions
    // ────────────────────────────────────────────────────────────────────

    pub fn submit_profile(&mut self, form: ProfileForm) -> Result<(), InterviewError> {
        self.require_stage(Stage::ProfileCollection, "submit a profile")?;
        let profile = form
            .into_profile(self.state.profile.as_ref())
            .map_err(InterviewError::InvalidProfile)?;
        self.state.profile = Some(profile);
        self.transition(Stage::Introduction);
        Ok(())
    }

    pub fn submit_introduction(&mut self, text: &str) -> Result<(), InterviewError> {
        self.require_stage(Stage::Introduction, "submit an introduction")?;
        let text = non_empty(text, "introduction")?;
        let prompt = self.bundle.introduction_prompt.clone();
        self.state.transcript.append(Speaker::Interviewer, prompt);
        self.state.transcript.append(Speaker::Candidate, text);
        self.transition(Stage::Questioning);
        Ok(())
    }

    /// Returns the current question, generating it only if nothing is cached.
    pub async fn current_question(&mut self) -> Result<CurrentQuestion, InterviewError> {
        self.require_stage(Stage::Questioning, "ask a question")?;
        let text = self.ensure_question().await?;
        let title = self
            .current_spec()
            .map(|spec| spec.title.clone())
            .unwrap_or_default();
        Ok(CurrentQuestion {
            question_index: self.state.question_index,
            total_questions: self.bundle.catalog.len(),
            title,
            followup_depth: self.state.followup_depth,
            display_text: add_newlines_by_period(&text),
            text,
        })
    }

    /// Records an answer, then either probes deeper or moves on.
    pub async fn submit_answer(&mut self, answer: &str) -> Result<AnswerOutcome, InterviewError> {
        self.require_stage(Stage::Questioning, "submit an answer")?;
        let answer = non_empty(answer, "answer")?;
        let question = self.ensure_question().await?;

        let llm = Arc::clone(&self.llm);
        let bundle = Arc::clone(&self.bundle);
        let depth = self.state.followup_depth;

        let mut transcript = self.state.transcript.clone();
        transcript.append_exchange(question, answer);

        if needs_followup(llm.as_ref(), &bundle, &transcript, depth).await? {
            let spec = self.spec_for_generation()?;
            let profile = self.profile_for_generation()?;
            let followup = generate_question(
                llm.as_ref(),
                &bundle,
                profile,
                spec,
                QuestionKind::Followup,
                &transcript,
            )
            .await?;

            self.state.transcript = transcript;
            self.state.followup_depth = depth + 1;
            self.state.pending_question_text = Some(followup);
            info!(
                "Session {}: follow-up {} on question {}",
                self.id, self.state.followup_depth, self.state.question_index
            );
            return Ok(AnswerOutcome::Followup {
                followup_depth: self.state.followup_depth,
            });
        }

        self.state.transcript = transcript;
        self.state.question_index += 1;
        self.state.followup_depth = 0;
        self.state.pending_question_text = None;

        if self.state.question_index >= self.bundle.catalog.len() {
            self.transition(Stage::Feedback);
            Ok(AnswerOutcome::Completed)
        } else {
            info!(
                "Session {}: advancing to question {}",
                self.id, self.state.question_index
            );
            Ok(AnswerOutcome::NextQuestion {
                question_index: self.state.question_index,
            })
        }
    }

    /// Ends the interview early. Progress counters are kept for partial feedback.
    pub fn skip_to_feedback(&mut self) -> Result<(), InterviewError> {
        match self.state.stage {
            Stage::Introduction | Stage::Questioning => {
                self.state.interrupted = true;
                self.state.pending_question_text = None;
                self.transition(Stage::Feedback);
                Ok(())
            }
            stage => Err(InterviewError::StageConflict {
                action: "skip to feedback",
                stage,
            }),
        }
    }

    /// Back to a fresh session. With `preserve_profile` the profile survives
    /// and pre-fills the next profile submission.
    pub fn restart(&mut self, preserve_profile: bool) {
        let profile = if preserve_profile {
            self.state.profile.take()
        } else {
            None
        };
        self.state = SessionState {
            profile,
            ..SessionState::default()
        };
        info!(
            "Session {} restarted (profile kept: {})",
            self.id,
            self.state.profile.is_some()
        );
    }

    /// The feedback report. Generated on first call, cached afterwards.
    pub async fn feedback(&mut self) -> Result<String, InterviewError> {
        self.require_stage(Stage::Feedback, "compile feedback")?;
        if let Some(report) = &self.state.feedback_report {
            return Ok(report.clone());
        }

        let report = compile_feedback(
            self.llm.as_ref(),
            &self.bundle,
            &self.state.transcript,
            self.state.interrupted,
            self.answered_questions(),
        )
        .await?;
        self.state.feedback_report = Some(report.clone());
        Ok(report)
    }

    // ────────────────────────────────────────────────────────────────────
    // Internals
    // ────────────────────────────────────────────────────────────────────

    async fn ensure_question(&mut self) -> Result<String, InterviewError> {
        if let Some(text) = &self.state.pending_question_text {
            return Ok(text.clone());
        }

        let llm = Arc::clone(&self.llm);
        let bundle = Arc::clone(&self.bundle);
        let kind = if self.state.followup_depth == 0 {
            QuestionKind::Primary
        } else {
            QuestionKind::Followup
        };
        let text = generate_question(
            llm.as_ref(),
            &bundle,
            self.profile_for_generation()?,
            self.spec_for_generation()?,
            kind,
            &self.state.transcript,
        )
        .await?;

        self.state.pending_question_text = Some(text.clone());
        Ok(text)
    }

    fn spec_for_generation(&self) -> Result<&QuestionSpec, InterviewError> {
        self.current_spec().ok_or(InterviewError::StageConflict {
            action: "ask a question",
            stage: self.state.stage,
        })
    }

    fn profile_for_generation(&self) -> Result<&Profile, InterviewError> {
        self.state
            .profile
            .as_ref()
            .ok_or(InterviewError::StageConflict {
                action: "ask a question without a profile",
                stage: self.state.stage,
            })
    }

    fn require_stage(&self, stage: Stage, action: &'static str) -> Result<(), InterviewError> {
        if self.state.stage == stage {
            Ok(())
        } else {
            Err(InterviewError::StageConflict {
                action,
                stage: self.state.stage,
            })
        }
    }

    fn transition(&mut self, to: Stage) {
        info!("Session {}: {:?} → {:?}", self.id, self.state.stage, to);
        self.state.stage = to;
    }
}

fn non_empty<'a>(text: &'a str, what: &'static str) -> Result<&'a str, InterviewError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(InterviewError::EmptyInput(what))
    } else {
        Ok(trimmed)
    }
}

fn validate_snapshot(state: &SessionState, bundle: &PromptBundle) -> Result<(), InterviewError> {
    let reject = |msg: String| Err(InterviewError::InvalidSnapshot(msg));
    let total = bundle.catalog.len();

    if state.question_index > total {
        return reject(format!(
            "question_index {} exceeds catalog length {total}",
            state.question_index
        ));
    }
    if state.followup_depth > MAX_FOLLOWUPS {
        return reject(format!(
            "followup_depth {} exceeds {MAX_FOLLOWUPS}",
            state.followup_depth
        ));
    }
    if state.interrupted && state.stage != Stage::Feedback {
        return reject("only a session in feedback can be interrupted".to_string());
    }

    if state.feedback_report.is_some() && state.stage != Stage::Feedback {
        return reject("only a session in feedback can carry a report".to_string());
    }

    match state.stage {
        Stage::ProfileCollection | Stage::Introduction => {
            if !state.transcript.is_empty()
                || state.question_index != 0
                || state.followup_depth != 0
                || state.pending_question_text.is_some()
            {
                return reject(format!(
                    "stage {:?} cannot carry interview progress",
                    state.stage
                ));
            }
            if state.stage == Stage::Introduction && !has_complete_profile(state) {
                return reject("stage Introduction requires a complete profile".to_string());
            }
        }
        stage => {
            if !has_complete_profile(state) {
                return reject(format!("stage {stage:?} requires a complete profile"));
            }
            if stage == Stage::Questioning && state.question_index >= total {
                return reject("questioning past the last question".to_string());
            }
            if stage == Stage::Feedback && !state.interrupted && state.question_index != total {
                return reject("completed session has unanswered questions".to_string());
            }
        }
    }
    Ok(())
}

fn has_complete_profile(state: &SessionState) -> bool {
    state.profile.as_ref().is_some_and(Profile::is_complete)
}

/// Parses snapshot JSON. Malformed turns fail here rather than later.
pub fn parse_snapshot(value: serde_json::Value) -> Result<SessionState, InterviewError> {
    serde_json::from_value(value).map_err(|e| InterviewError::InvalidSnapshot(e.to_string()))
}
