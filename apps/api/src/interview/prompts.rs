// Fixed interviewer wording owned by the service.
// Everything else the model sees comes from the prompt bundle.

/// Asked before the first catalog question. Overridable via `INTRODUCTION_PROMPT`.
pub const INTRODUCTION_PROMPT: &str = "それでは、最初にあなたの自己紹介を1分（400字程度）でお願いします。
これまでのご経歴やスキルについても触れていただければと思います。";

/// Question content used when the judge asks for one more probing question.
pub const FOLLOWUP_INSTRUCTION: &str = "上記に対する深掘り質問を1つ出力してください。";

/// Substituted for an axis the interview never reached.
pub const NOT_EVALUATED_MARKER: &str = "未評価";

/// Judge reply that means "probe deeper". Compared after trimming whitespace.
pub const JUDGE_AFFIRMATIVE: &str = "Yes";
