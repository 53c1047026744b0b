//! Error types for the gramclaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level `Error`
//! aggregates them for callers that cross context boundaries.

use thiserror::Error;

/// The top-level error type for all gramclaw operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of one orchestration turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model backend was unreachable even after its own internal retry.
    #[error("Upstream model failure: {0}")]
    UpstreamModel(#[from] ProviderError),

    /// The tools state was entered with zero pending tool calls.
    /// The routing policy guards against this; seeing it means an
    /// invariant was violated upstream.
    #[error("No tool calls found in assistant message")]
    NoToolCalls,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The tool call's argument string was not a valid JSON object.
    /// The offending call id is carried so the failure can be reported
    /// against the exact invocation that produced it.
    #[error("Malformed arguments for tool call {call_id}: {reason}")]
    ArgumentDecode { call_id: String, reason: String },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures of the outbound message channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Message delivery failed: {reason}")]
    DeliveryFailed { reason: String },

    /// The channel API rejected the request with quota-exceeded semantics
    /// (HTTP 429). May carry a server-suggested wait.
    #[error("Too many requests, retry after {retry_after_secs:?}s")]
    TooManyRequests { retry_after_secs: Option<u64> },

    /// The retry budget for a rate-limited send was exhausted.
    #[error("Retry budget exceeded after {attempts} attempts")]
    RetryBudgetExceeded { attempts: u32 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_error_wraps_provider_error() {
        let err = AgentError::UpstreamModel(ProviderError::ApiError {
            status_code: 503,
            message: "Service Unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Upstream model"));
    }

    #[test]
    fn argument_decode_names_the_call() {
        let err = ToolError::ArgumentDecode {
            call_id: "call_42".into(),
            reason: "expected value at line 1".into(),
        };
        assert!(err.to_string().contains("call_42"));
    }

    #[test]
    fn too_many_requests_displays_hint() {
        let err = ChannelError::TooManyRequests {
            retry_after_secs: Some(7),
        };
        assert!(err.to_string().contains("retry after"));
    }
}
