//! # gramclaw Core
//!
//! Domain types, traits, and error definitions for the gramclaw agent runtime.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! The runtime is a single-purpose conversational agent: one inbound chat
//! message becomes one *turn* of the orchestration loop (model call,
//! optional tool execution, repeat), and the final assistant message is
//! delivered back through a rate-limited channel. Everything a turn touches
//! is defined here as a trait; implementations live in their own crates and
//! depend inward on core.

pub mod error;
pub mod event;
pub mod identity;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, ChannelError, Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use identity::Identity;
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
