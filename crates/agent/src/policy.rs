//! Routing between inference and tool execution.

use gramclaw_core::message::{Conversation, Role};

/// What the turn loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The last assistant message requested tools; execute them and
    /// run inference again.
    Continue,
    /// The turn is complete.
    Stop,
}

/// Pure routing policy over the conversation transcript.
///
/// Only the last message is consulted: earlier tool requests have
/// already been answered by the time the policy runs again.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoutingPolicy;

impl RoutingPolicy {
    pub fn decide(&self, conversation: &Conversation) -> Decision {
        match conversation.last() {
            Some(last) if last.role == Role::Assistant && last.has_tool_calls() => {
                Decision::Continue
            }
            _ => Decision::Stop,
        }
    }
}
