//! Question generation — rules + catalog entry + history → one interviewer line.

use tracing::debug;

use crate::interview::bundle::{PromptBundle, QuestionSpec};
use crate::interview::error::InterviewError;
use crate::interview::profile::Profile;
use crate::interview::prompts::FOLLOWUP_INSTRUCTION;
use crate::interview::sanitize::sanitize_question_text;
use crate::interview::templates::{PromptValues, TemplateId};
use crate::interview::transcript::Transcript;
use crate::llm_client::LanguageModel;

/// What the interviewer is being asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// The catalog question itself.
    Primary,
    /// One more probing question on what was just said.
    Followup,
}

/// Renders the rules template from the candidate profile.
pub fn build_rules(bundle: &PromptBundle, profile: &Profile) -> Result<String, InterviewError> {
    let values: PromptValues = profile.fields().into_iter().collect();
    Ok(bundle.render(TemplateId::Rules, &values)?)
}

pub fn build_question_prompt(
    bundle: &PromptBundle,
    profile: &Profile,
    spec: &QuestionSpec,
    kind: QuestionKind,
    transcript: &Transcript,
) -> Result<String, InterviewError> {
    let rules = build_rules(bundle, profile)?;
    let evaluation_points = bundle
        .evaluation_points
        .render_for(&spec.evaluation_point_keys);
    let history = transcript.render(&bundle.labels);
    let question = match kind {
        QuestionKind::Primary => spec.content.as_str(),
        QuestionKind::Followup => FOLLOWUP_INSTRUCTION,
    };

    let values: PromptValues = [
        ("rules", rules.as_str()),
        ("question", question),
        ("evaluation_points", evaluation_points.as_str()),
        ("history", history.as_str()),
    ]
    .into_iter()
    .collect();

    Ok(bundle.render(TemplateId::Question, &values)?)
}

/// Asks the model for the next interviewer line and cleans it up.
pub async fn generate_question(
    llm: &dyn LanguageModel,
    bundle: &PromptBundle,
    profile: &Profile,
    spec: &QuestionSpec,
    kind: QuestionKind,
    transcript: &Transcript,
) -> Result<String, InterviewError> {
    let prompt = build_question_prompt(bundle, profile, spec, kind, transcript)?;
    let raw = llm.generate(&prompt).await?;
    let text = sanitize_question_text(&raw, &bundle.labels);
    debug!(
        "Generated {:?} question for '{}' ({} chars)",
        kind,
        spec.title,
        text.chars().count()
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::bundle::sample_bundle;
    use crate::interview::profile::sample_profile;
    use crate::llm_client::mock::ScriptedLlm;

    #[test]
    fn test_rules_use_every_profile_field() {
        let rules = build_rules(&sample_bundle(), &sample_profile()).unwrap();
        assert_eq!(
            rules,
            "候補者: 30歳 IT/エンジニア/リーダー 5年 → コンサルティング/データサイエンティスト"
        );
    }

    #[test]
    fn test_primary_prompt_uses_catalog_content() {
        let bundle = sample_bundle();
        let prompt = build_question_prompt(
            &bundle,
            &sample_profile(),
            &bundle.catalog[0],
            QuestionKind::Primary,
            &Transcript::new(),
        )
        .unwrap();
        assert!(prompt.contains("Q[志望動機を尋ねる]"));
        assert!(prompt.contains("POINTS[- 定着性：長く働いてくれそうか]"));
        assert!(prompt.ends_with("HISTORY[]"));
    }

    #[test]
    fn test_followup_prompt_uses_fixed_instruction_and_history() {
        let bundle = sample_bundle();
        let mut transcript = Transcript::new();
        transcript.append_exchange("志望理由は？", "成長したいです。");
        let prompt = build_question_prompt(
            &bundle,
            &sample_profile(),
            &bundle.catalog[1],
            QuestionKind::Followup,
            &transcript,
        )
        .unwrap();
        assert!(prompt.contains(&format!("Q[{FOLLOWUP_INSTRUCTION}]")));
        assert!(prompt.contains("HISTORY[面接官：志望理由は？\nあなた：成長したいです。]"));
    }

    #[test]
    fn test_template_with_unknown_placeholder_fails() {
        let mut bundle = sample_bundle();
        bundle.templates.question = "{rules} {company}".to_string();
        let err = build_question_prompt(
            &bundle,
            &sample_profile(),
            &bundle.catalog[0].clone(),
            QuestionKind::Primary,
            &Transcript::new(),
        )
        .unwrap_err();
        assert!(matches!(err, InterviewError::Render(_)));
    }

    #[tokio::test]
    async fn test_generated_question_is_sanitized() {
        let bundle = sample_bundle();
        let llm = ScriptedLlm::new(&["あなた：前の回答\n面接官：「次の質問です。」"]);
        let text = generate_question(
            &llm,
            &bundle,
            &sample_profile(),
            &bundle.catalog[0],
            QuestionKind::Primary,
            &Transcript::new(),
        )
        .await
        .unwrap();
        assert_eq!(text, "次の質問です。");
        assert_eq!(llm.calls(), 1);
    }
}
