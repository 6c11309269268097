//! Question-text cleanup for model output.
//!
//! The question template feeds the whole conversation history to the model,
//! and the model sometimes answers by continuing the transcript instead of
//! writing only the next question. This is best-effort pattern matching over
//! free text, so it is kept behind one function and pinned by example tests.
//!
//! Heuristics, applied in order:
//! 1. A line "starts with a speaker label" when, after leading whitespace, it
//!    begins with a configured label followed by `：` or `:`.
//! 2. If any such line exists, the output is a transcript echo. Keep the
//!    block that starts at the last interviewer-labelled line (label removed)
//!    and runs until the next candidate-labelled line. With no interviewer
//!    line, keep the unlabelled lines after the last candidate-labelled line.
//! 3. Strip one pair of wrapping quotes (`「」`, `『』`, `""`, `“”`).
//! 4. Trim. If nothing is left, return the trimmed raw text unchanged.

use crate::interview::transcript::SpeakerLabels;

const QUOTE_PAIRS: &[(char, char)] = &[('「', '」'), ('『', '』'), ('"', '"'), ('“', '”')];

pub fn sanitize_question_text(raw: &str, labels: &SpeakerLabels) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    let tagged: Vec<Option<Tag>> = lines.iter().map(|l| tag_line(l, labels)).collect();

    let extracted = if tagged.iter().any(Option::is_some) {
        extract_last_question(&lines, &tagged)
    } else {
        trimmed.to_string()
    };

    let cleaned = strip_wrapping_quotes(extracted.trim()).trim().to_string();
    if cleaned.is_empty() {
        trimmed.to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag<'a> {
    Interviewer(&'a str),
    Candidate,
}

fn tag_line<'a>(line: &'a str, labels: &SpeakerLabels) -> Option<Tag<'a>> {
    let line = line.trim_start();
    if let Some(rest) = strip_label(line, &labels.interviewer) {
        return Some(Tag::Interviewer(rest));
    }
    strip_label(line, &labels.candidate).map(|_| Tag::Candidate)
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(label)?;
    rest.strip_prefix('：')
        .or_else(|| rest.strip_prefix(':'))
        .map(str::trim_start)
}

fn extract_last_question(lines: &[&str], tagged: &[Option<Tag<'_>>]) -> String {
    let last_interviewer = tagged
        .iter()
        .rposition(|t| matches!(t, Some(Tag::Interviewer(_))));

    let (start, first_line) = match last_interviewer {
        Some(i) => match tagged[i] {
            Some(Tag::Interviewer(rest)) => (i + 1, Some(rest)),
            _ => (i + 1, None),
        },
        None => {
            // Candidate lines only: whatever follows the last one.
            let last_candidate = tagged
                .iter()
                .rposition(|t| matches!(t, Some(Tag::Candidate)))
                .map_or(0, |i| i + 1);
            (last_candidate, None)
        }
    };

    let mut block: Vec<&str> = first_line.into_iter().collect();
    for (line, tag) in lines.iter().zip(tagged).skip(start) {
        if tag.is_some() {
            break;
        }
        block.push(*line);
    }
    block.join("\n")
}

fn strip_wrapping_quotes(text: &str) -> &str {
    for &(open, close) in QUOTE_PAIRS {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            if !inner.contains(open) && !inner.contains(close) {
                return inner;
            }
        }
    }
    text
}
