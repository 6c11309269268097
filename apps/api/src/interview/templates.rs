//! Prompt Renderer — placeholder substitution over configuration-owned template bodies.
//!
//! Syntax: `{name}` with an ASCII identifier is a placeholder, `{{` and `}}`
//! are literal braces. Everything else in the body is opaque and copied as-is.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Rules,
    Question,
    Judge,
    Feedback,
    PartialFeedback,
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateId::Rules => "RULES_TEMPLATE",
            TemplateId::Question => "QUESTION_TEMPLATE",
            TemplateId::Judge => "JUDGE_TEMPLATE",
            TemplateId::Feedback => "FEEDBACK_TEMPLATE",
            TemplateId::PartialFeedback => "PARTIAL_FEEDBACK_TEMPLATE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("{template} references '{{{field}}}' but no value was supplied")]
    MissingField { template: TemplateId, field: String },
}

/// Named values available to a template. Extra entries are ignored.
pub type PromptValues<'a> = HashMap<&'a str, &'a str>;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Substitutes every placeholder in `body`.
///
/// Fails on the first placeholder with no value; nothing is sent to the
/// model with a hole in it.
pub fn render(
    template: TemplateId,
    body: &str,
    values: &PromptValues<'_>,
) -> Result<String, RenderError> {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;

    for caps in placeholder_pattern().captures_iter(body) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&body[last..whole.start()]);
        last = whole.end();

        match caps.get(1) {
            Some(name) => {
                let value = values.get(name.as_str()).ok_or_else(|| RenderError::MissingField {
                    template,
                    field: name.as_str().to_string(),
                })?;
                out.push_str(value);
            }
            None if whole.as_str() == "{{" => out.push('{'),
            None => out.push('}'),
        }
    }

    out.push_str(&body[last..]);
    Ok(out)
}
