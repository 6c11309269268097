//! Follow-up Judge — decides whether the current question gets another probing question.
//!
//! Policy:
//! - depth 0: always probe once, no model call.
//! - depth 1..MAX_FOLLOWUPS: ask the model with the judge template; only a
//!   reply of exactly "Yes" (surrounding whitespace ignored) means probe.
//! - depth >= MAX_FOLLOWUPS: never, no model call.

use tracing::debug;

use crate::interview::bundle::PromptBundle;
use crate::interview::error::InterviewError;
use crate::interview::prompts::JUDGE_AFFIRMATIVE;
use crate::interview::templates::{PromptValues, TemplateId};
use crate::interview::transcript::Transcript;
use crate::llm_client::{LanguageModel, LlmError};

/// Hard cap on follow-up questions per catalog question.
pub const MAX_FOLLOWUPS: u32 = 3;

pub async fn needs_followup(
    llm: &dyn LanguageModel,
    bundle: &PromptBundle,
    transcript: &Transcript,
    followup_depth: u32,
) -> Result<bool, InterviewError> {
    if followup_depth == 0 {
        debug!("First follow-up is mandatory");
        return Ok(true);
    }
    if followup_depth >= MAX_FOLLOWUPS {
        debug!("Follow-up cap of {MAX_FOLLOWUPS} reached");
        return Ok(false);
    }

    let history = transcript.render(&bundle.labels);
    let values: PromptValues = [("history", history.as_str())].into_iter().collect();
    let prompt = bundle.render(TemplateId::Judge, &values)?;

    // A blank verdict is just another "not Yes".
    let verdict = match llm.generate(&prompt).await {
        Ok(verdict) => verdict,
        Err(LlmError::EmptyContent) => String::new(),
        Err(e) => return Err(e.into()),
    };
    let probe = is_affirmative(&verdict);
    debug!("Judge at depth {followup_depth} replied {verdict:?} → follow-up={probe}");
    Ok(probe)
}

fn is_affirmative(verdict: &str) -> bool {
    verdict.trim() == JUDGE_AFFIRMATIVE
}
