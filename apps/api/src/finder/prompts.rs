// Prompt construction for the pajama finder. Pure: the same request always renders
// byte-identical prompts.

use crate::finder::models::{Kit, KitForModel};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::PromptPair;

/// Upper bound on kits echoed into the prompt. Extra kits are dropped silently.
pub const MAX_KITS_IN_PROMPT: usize = 100;

/// System prompt for kit selection.
pub const SYSTEM_PROMPT: &str = r#"You are a Shopify "Family Pajama Finder" assistant.
The user gives you a description of their family and preferences.
You get a list of available family pajama kits ("kits").
Pick 1–4 kits that best match their needs.

IMPORTANT:
- Only recommend kits whose "handle" exists in the given kits list.
- For each kit, return: handle, title, and a short reason.
- Output MUST be valid JSON with this shape:

{
  "recommendations": [
    { "handle": "...", "title": "...", "reason": "..." }
  ]
}"#;

/// Returns the prefix of `kits` that is allowed into the prompt.
pub fn truncate_kits(kits: &[Kit]) -> &[Kit] {
    &kits[..kits.len().min(MAX_KITS_IN_PROMPT)]
}

/// Renders the system and user messages for one request. `kits` is expected to be
/// already truncated with [`truncate_kits`].
pub fn build_prompt(question: &str, kits: &[Kit]) -> PromptPair {
    let kits_for_model: Vec<KitForModel<'_>> = kits.iter().map(KitForModel::from).collect();
    // Serializing borrowed strings into a Vec cannot fail.
    let kits_json = serde_json::to_string_pretty(&kits_for_model).unwrap_or_else(|_| "[]".into());

    let user = format!(
        "Customer description:\n{question}\n\nAvailable kits (JSON):\n{kits_json}\n\n{JSON_ONLY_INSTRUCTION}"
    );

    PromptPair {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
