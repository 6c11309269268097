// Shared prompt constants for the gateway itself.
// Interview prompts are configuration (see interview::bundle); only the
// wording the service owns lives in code.

/// Sent once per credential with a one-token budget.
pub const PROBE_PROMPT: &str = "ping";
