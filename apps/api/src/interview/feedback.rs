//! Feedback Compiler — evaluation points + transcript → formatted report.
//!
//! Interrupted sessions use the partial template. Axes that belong only to
//! questions the candidate never answered are marked as not evaluated in the
//! request, so the report cannot invent a score for them.

use std::collections::HashSet;

use tracing::info;

use crate::interview::bundle::PromptBundle;
use crate::interview::error::InterviewError;
use crate::interview::prompts::NOT_EVALUATED_MARKER;
use crate::interview::templates::{PromptValues, TemplateId};
use crate::interview::transcript::Transcript;
use crate::llm_client::LanguageModel;

const SENTENCE_TERMINALS: [char; 3] = ['。', '？', '！'];

/// Shown in `not_evaluated` when every axis has evidence.
const NOTHING_SKIPPED: &str = "なし";

/// Inserts a line break right after every sentence-terminal mark.
///
/// Not idempotent: a second pass adds another break after each terminator.
pub fn add_newlines_by_period(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        out.push(c);
        if SENTENCE_TERMINALS.contains(&c) {
            out.push('\n');
        }
    }
    out
}

/// Evaluation-point keys with evidence: those of the first
/// `answered_questions` catalog entries.
pub fn covered_keys(bundle: &PromptBundle, answered_questions: usize) -> HashSet<&str> {
    bundle
        .catalog
        .iter()
        .take(answered_questions)
        .flat_map(|q| q.evaluation_point_keys.iter().map(String::as_str))
        .collect()
}

pub fn build_feedback_prompt(
    bundle: &PromptBundle,
    transcript: &Transcript,
    interrupted: bool,
    answered_questions: usize,
) -> Result<String, InterviewError> {
    let history = transcript.render(&bundle.labels);

    if !interrupted {
        let points = bundle.evaluation_points.render_all_with(|_, d| d.to_string());
        let values: PromptValues = [
            ("evaluation_points_list", points.as_str()),
            ("evaluation_format", bundle.templates.evaluation_format.as_str()),
            ("history", history.as_str()),
        ]
        .into_iter()
        .collect();
        return Ok(bundle.render(TemplateId::Feedback, &values)?);
    }

    let covered = covered_keys(bundle, answered_questions);
    let points = bundle.evaluation_points.render_all_with(|k, d| {
        if covered.contains(k) {
            d.to_string()
        } else {
            format!("{d}（{NOT_EVALUATED_MARKER}）")
        }
    });
    let skipped: Vec<&str> = bundle
        .evaluation_points
        .keys()
        .filter(|k| !covered.contains(k))
        .collect();
    let not_evaluated = if skipped.is_empty() {
        NOTHING_SKIPPED.to_string()
    } else {
        skipped.join("、")
    };

    let values: PromptValues = [
        ("evaluation_points_list", points.as_str()),
        (
            "evaluation_format",
            bundle.templates.partial_evaluation_format.as_str(),
        ),
        ("not_evaluated", not_evaluated.as_str()),
        ("history", history.as_str()),
    ]
    .into_iter()
    .collect();
    Ok(bundle.render(TemplateId::PartialFeedback, &values)?)
}

/// Runs the single feedback generation call for a session.
pub async fn compile_feedback(
    llm: &dyn LanguageModel,
    bundle: &PromptBundle,
    transcript: &Transcript,
    interrupted: bool,
    answered_questions: usize,
) -> Result<String, InterviewError> {
    let prompt = build_feedback_prompt(bundle, transcript, interrupted, answered_questions)?;
    let raw = llm.generate(&prompt).await?;
    info!(
        "Feedback compiled ({} mode, {} turns)",
        if interrupted { "partial" } else { "full" },
        transcript.len()
    );
    Ok(add_newlines_by_period(&raw))
}
