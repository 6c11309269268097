//! Transcript — the ordered, append-only record of the interview conversation.
//!
//! Rendering is the history text fed into every prompt, so its shape is fixed:
//! one `"<label>：<text>"` line per turn, joined by `\n`, no trailing newline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Full-width colon between a speaker label and the utterance.
pub const LABEL_SEPARATOR: char = '：';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Display names used when rendering. Deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerLabels {
    pub interviewer: String,
    pub candidate: String,
}

impl Default for SpeakerLabels {
    fn default() -> Self {
        Self {
            interviewer: "面接官".to_string(),
            candidate: "あなた".to_string(),
        }
    }
}

impl SpeakerLabels {
    pub fn label(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::Interviewer => &self.interviewer,
            Speaker::Candidate => &self.candidate,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("turn {index} has no speaker")]
    MalformedTurn { index: usize },

    #[error("turn {index} repeats the previous speaker")]
    OutOfOrder { index: usize },
}

/// A turn as it appears in imported data, before the speaker is checked.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRecord {
    #[serde(default, alias = "role")]
    pub speaker: Option<Speaker>,
    #[serde(alias = "content")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TurnRecord>", into = "Vec<Turn>")]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a transcript from loosely-typed records.
    ///
    /// A record without a speaker is a caller bug and fails the whole import;
    /// no speaker is ever guessed. Consecutive turns by the same speaker are
    /// rejected as well. A resumed transcript may start with either speaker.
    pub fn from_records(records: Vec<TurnRecord>) -> Result<Self, TranscriptError> {
        let mut turns: Vec<Turn> = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let speaker = record
                .speaker
                .ok_or(TranscriptError::MalformedTurn { index })?;
            if turns.last().is_some_and(|prev| prev.speaker == speaker) {
                return Err(TranscriptError::OutOfOrder { index });
            }
            turns.push(Turn {
                speaker,
                text: record.text,
            });
        }
        Ok(Self { turns })
    }

    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.turns.push(Turn {
            speaker,
            text: text.into(),
        });
    }

    /// Appends an interviewer line and the candidate's reply, in that order.
    pub fn append_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.append(Speaker::Interviewer, question);
        self.append(Speaker::Candidate, answer);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn render(&self, labels: &SpeakerLabels) -> String {
        self.turns
            .iter()
            .map(|turn| {
                format!(
                    "{}{}{}",
                    labels.label(turn.speaker),
                    LABEL_SEPARATOR,
                    turn.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TryFrom<Vec<TurnRecord>> for Transcript {
    type Error = TranscriptError;

    fn try_from(records: Vec<TurnRecord>) -> Result<Self, Self::Error> {
        Self::from_records(records)
    }
}

impl From<Transcript> for Vec<Turn> {
    fn from(transcript: Transcript) -> Self {
        transcript.turns
    }
}
