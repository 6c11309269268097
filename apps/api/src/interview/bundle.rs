//! Prompt bundle — templates, question catalog and evaluation points,
//! loaded once from a TOML file and validated before any session starts.
//!
//! File layout (keys match the `[prompts]` table of the deployment secrets):
//!
//! ```toml
//! [prompts]
//! RULES_TEMPLATE = "..."
//! QUESTION_TEMPLATE = "..."
//! JUDGE_TEMPLATE = "..."
//! FEEDBACK_TEMPLATE = "..."
//! EVALUATION_FORMAT = "..."
//! PARTIAL_FEEDBACK_TEMPLATE = "..."
//! PARTIAL_EVALUATION_FORMAT = "..."
//!
//! [[prompts.questions_list]]
//! title = "志望動機"
//! point_keys = ["定着性"]
//! content = "..."
//!
//! [prompts.evaluation_points_list]
//! "定着性" = "..."
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::interview::prompts::INTRODUCTION_PROMPT;
use crate::interview::templates::{render, PromptValues, RenderError, TemplateId};
use crate::interview::transcript::SpeakerLabels;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Cannot read prompt bundle '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid prompt bundle TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} is empty")]
    EmptyTemplate(&'static str),

    #[error("questions_list has no questions")]
    EmptyCatalog,

    #[error("question {index} ('{title}') has an empty title or content")]
    IncompleteQuestion { index: usize, title: String },

    #[error("question {index} ('{title}') lists no point_keys")]
    QuestionWithoutPoints { index: usize, title: String },

    #[error("question '{title}' references unknown evaluation point '{key}'")]
    UnknownEvaluationPoint { title: String, key: String },

    #[error("question '{title}' lists evaluation point '{key}' twice")]
    DuplicateEvaluationPoint { title: String, key: String },

    #[error("speaker labels must not be empty")]
    EmptyLabel,
}

// ────────────────────────────────────────────────────────────────────────────
// File shape
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BundleFile {
    prompts: RawPrompts,
}

#[derive(Debug, Deserialize)]
struct RawPrompts {
    #[serde(rename = "RULES_TEMPLATE")]
    rules: String,
    #[serde(rename = "QUESTION_TEMPLATE")]
    question: String,
    #[serde(rename = "JUDGE_TEMPLATE")]
    judge: String,
    #[serde(rename = "FEEDBACK_TEMPLATE")]
    feedback: String,
    #[serde(rename = "EVALUATION_FORMAT")]
    evaluation_format: String,
    #[serde(rename = "PARTIAL_FEEDBACK_TEMPLATE")]
    partial_feedback: String,
    #[serde(rename = "PARTIAL_EVALUATION_FORMAT")]
    partial_evaluation_format: String,
    #[serde(rename = "INTERVIEWER_LABEL", default)]
    interviewer_label: Option<String>,
    #[serde(rename = "CANDIDATE_LABEL", default)]
    candidate_label: Option<String>,
    #[serde(rename = "INTRODUCTION_PROMPT", default)]
    introduction_prompt: Option<String>,
    #[serde(default)]
    questions_list: Vec<RawQuestion>,
    #[serde(default)]
    evaluation_points_list: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    title: String,
    point_keys: Vec<String>,
    content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Typed bundle
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Templates {
    pub rules: String,
    pub question: String,
    pub judge: String,
    pub feedback: String,
    pub evaluation_format: String,
    pub partial_feedback: String,
    pub partial_evaluation_format: String,
}

impl Templates {
    pub fn body(&self, id: TemplateId) -> &str {
        match id {
            TemplateId::Rules => &self.rules,
            TemplateId::Question => &self.question,
            TemplateId::Judge => &self.judge,
            TemplateId::Feedback => &self.feedback,
            TemplateId::PartialFeedback => &self.partial_feedback,
        }
    }
}

/// One interview question category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSpec {
    pub title: String,
    /// Instruction text handed to the model, not shown to the candidate.
    pub content: String,
    pub evaluation_point_keys: Vec<String>,
}

/// Axis key → description, in file order.
#[derive(Debug, Clone, Default)]
pub struct EvaluationPoints(IndexMap<String, String>);

impl EvaluationPoints {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `- key：description` lines for the given keys, in the given order.
    /// Keys are checked at load time, so every key resolves.
    pub fn render_for(&self, keys: &[String]) -> String {
        keys.iter()
            .filter_map(|k| self.0.get_key_value(k))
            .map(|(k, d)| format!("- {k}：{d}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every axis, each rendered through `describe` (used to mark gaps).
    pub fn render_all_with<F>(&self, describe: F) -> String
    where
        F: Fn(&str, &str) -> String,
    {
        self.0
            .iter()
            .map(|(k, d)| format!("- {k}：{}", describe(k, d)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct PromptBundle {
    pub templates: Templates,
    pub catalog: Vec<QuestionSpec>,
    pub evaluation_points: EvaluationPoints,
    pub labels: SpeakerLabels,
    pub introduction_prompt: String,
}

impl PromptBundle {
    /// Fills the named template with `values`.
    pub fn render(&self, id: TemplateId, values: &PromptValues<'_>) -> Result<String, RenderError> {
        render(id, self.templates.body(id), values)
    }

    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let content = std::fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle = Self::from_toml_str(&content)?;
        info!(
            "Prompt bundle loaded from {}: {} questions, {} evaluation points",
            path.display(),
            bundle.catalog.len(),
            bundle.evaluation_points.len()
        );
        Ok(bundle)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BundleError> {
        let file: BundleFile = toml::from_str(content)?;
        Self::from_raw(file.prompts)
    }

    fn from_raw(raw: RawPrompts) -> Result<Self, BundleError> {
        let templates = Templates {
            rules: non_empty("RULES_TEMPLATE", raw.rules)?,
            question: non_empty("QUESTION_TEMPLATE", raw.question)?,
            judge: non_empty("JUDGE_TEMPLATE", raw.judge)?,
            feedback: non_empty("FEEDBACK_TEMPLATE", raw.feedback)?,
            evaluation_format: non_empty("EVALUATION_FORMAT", raw.evaluation_format)?,
            partial_feedback: non_empty("PARTIAL_FEEDBACK_TEMPLATE", raw.partial_feedback)?,
            partial_evaluation_format: non_empty(
                "PARTIAL_EVALUATION_FORMAT",
                raw.partial_evaluation_format,
            )?,
        };

        if raw.questions_list.is_empty() {
            return Err(BundleError::EmptyCatalog);
        }

        let evaluation_points = EvaluationPoints(raw.evaluation_points_list);
        let mut catalog = Vec::with_capacity(raw.questions_list.len());

        for (index, q) in raw.questions_list.into_iter().enumerate() {
            if q.title.trim().is_empty() || q.content.trim().is_empty() {
                return Err(BundleError::IncompleteQuestion {
                    index,
                    title: q.title,
                });
            }
            if q.point_keys.is_empty() {
                return Err(BundleError::QuestionWithoutPoints {
                    index,
                    title: q.title,
                });
            }
            let mut seen = HashSet::new();
            for key in &q.point_keys {
                if evaluation_points.get(key).is_none() {
                    return Err(BundleError::UnknownEvaluationPoint {
                        title: q.title.clone(),
                        key: key.clone(),
                    });
                }
                if !seen.insert(key.as_str()) {
                    return Err(BundleError::DuplicateEvaluationPoint {
                        title: q.title.clone(),
                        key: key.clone(),
                    });
                }
            }
            catalog.push(QuestionSpec {
                title: q.title,
                content: q.content,
                evaluation_point_keys: q.point_keys,
            });
        }

        let defaults = SpeakerLabels::default();
        let labels = SpeakerLabels {
            interviewer: raw.interviewer_label.unwrap_or(defaults.interviewer),
            candidate: raw.candidate_label.unwrap_or(defaults.candidate),
        };
        if labels.interviewer.trim().is_empty() || labels.candidate.trim().is_empty() {
            return Err(BundleError::EmptyLabel);
        }

        let introduction_prompt = raw
            .introduction_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| INTRODUCTION_PROMPT.to_string());

        Ok(Self {
            templates,
            catalog,
            evaluation_points,
            labels,
            introduction_prompt,
        })
    }
}

fn non_empty(name: &'static str, value: String) -> Result<String, BundleError> {
    if value.trim().is_empty() {
        Err(BundleError::EmptyTemplate(name))
    } else {
        Ok(value)
    }
}

/// Small but complete bundle used across the test suite. Template bodies are
/// terse so tests can assert on the exact prompts sent to the model.
#[cfg(test)]
pub(crate) const SAMPLE_BUNDLE_TOML: &str = r#"
[prompts]
RULES_TEMPLATE = "候補者: {age}歳 {current_industry}/{current_role}/{current_title} {years_experience} → {target_industry}/{target_role}"
QUESTION_TEMPLATE = "RULES[{rules}] Q[{question}] POINTS[{evaluation_points}] HISTORY[{history}]"
JUDGE_TEMPLATE = "JUDGE[{history}]"
FEEDBACK_TEMPLATE = "FEEDBACK POINTS[{evaluation_points_list}] FORMAT[{evaluation_format}] HISTORY[{history}]"
EVALUATION_FORMAT = "全項目を5段階で評価"
PARTIAL_FEEDBACK_TEMPLATE = "PARTIAL POINTS[{evaluation_points_list}] SKIPPED[{not_evaluated}] FORMAT[{evaluation_format}] HISTORY[{history}]"
PARTIAL_EVALUATION_FORMAT = "回答済みの項目のみ評価"

[[prompts.questions_list]]
title = "志望動機"
point_keys = ["定着性"]
content = "志望動機を尋ねる"

[[prompts.questions_list]]
title = "課題解決"
point_keys = ["問題解決力", "論理性"]
content = "困難を乗り越えた経験を尋ねる"

[prompts.evaluation_points_list]
"定着性" = "長く働いてくれそうか"
"問題解決力" = "課題を自力で解決できるか"
"論理性" = "筋道立てて話せるか"
"#;

#[cfg(test)]
pub(crate) fn sample_bundle() -> PromptBundle {
    PromptBundle::from_toml_str(SAMPLE_BUNDLE_TOML).unwrap()
}
