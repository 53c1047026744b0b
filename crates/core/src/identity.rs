//! Agent identity — the persona injected as the turn's System message.
//!
//! The orchestrator prepends `system_prompt` to every turn; callers never
//! supply the System message themselves. The built-in default keeps the
//! agent terse and tool-aware; deployments override it via configuration.

use serde::{Deserialize, Serialize};

const DEFAULT_NAME: &str = "gramclaw";

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are gramclaw, a concise conversational assistant reachable over chat.

Rules:
1. Answer in at most two sentences.
2. Use the available tools whenever they help; incorporate their results.
3. Never fabricate tool output.";

/// The agent's identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// The agent's name
    pub name: String,

    /// System prompt injected at the start of every turn
    pub system_prompt: String,
}

impl Identity {
    /// Build an identity, applying an optional system prompt override.
    pub fn with_override(system_prompt_override: Option<&str>) -> Self {
        Self {
            name: DEFAULT_NAME.into(),
            system_prompt: system_prompt_override
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into()),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::with_override(None)
    }
}
