//! Interview role-play: profile → introduction → questions with follow-ups →
//! feedback. Everything here is driven by the prompt bundle and a
//! `LanguageModel`; the HTTP surface lives in `handlers`.

pub mod bundle;
pub mod error;
pub mod feedback;
pub mod handlers;
pub mod judge;
pub mod profile;
pub mod prompts;
pub mod question;
pub mod sanitize;
pub mod session;
pub mod templates;
pub mod transcript;
