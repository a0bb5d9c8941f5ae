// Shared prompt fragments.
// Each feature that needs LLM calls defines its own prompts.rs alongside it.

/// Closing line for user prompts whose reply is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "Return ONLY JSON in the specified format.";
