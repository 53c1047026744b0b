//! Concurrent tool execution for a single assistant turn.

use futures::future::join_all;
use gramclaw_core::error::{AgentError, ToolError};
use gramclaw_core::event::{DomainEvent, EventBus};
use gramclaw_core::message::{Message, MessageToolCall};
use gramclaw_core::tool::{ToolCall, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes the tool calls of an assistant message.
///
/// All calls in a message run concurrently; results come back in call
/// order, one tool-role message per call. A failing call never aborts
/// its siblings: the failure is reported back to the model as an
/// `Error: ...` result so it can recover or rephrase.
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            event_bus,
        }
    }

    /// Run every tool call in `assistant` and return the result
    /// messages, in the same order as the calls.
    pub async fn invoke(&self, assistant: &Message) -> Result<Vec<Message>, AgentError> {
        if assistant.tool_calls.is_empty() {
            return Err(AgentError::NoToolCalls);
        }

        let futures = assistant
            .tool_calls
            .iter()
            .map(|call| self.invoke_one(call));

        Ok(join_all(futures).await)
    }

    async fn invoke_one(&self, call: &MessageToolCall) -> Message {
        let start = std::time::Instant::now();
        let outcome = self.try_invoke(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                debug!(
                    tool = %call.name,
                    call_id = %call.id,
                    success = result.success,
                    duration_ms,
                    "Tool call finished"
                );
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: result.success,
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });
                Message::tool_result(&call.id, &call.name, &result.output)
            }
            Err(e) => {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    error = %e,
                    "Tool call failed"
                );
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: false,
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });
                Message::tool_result(&call.id, &call.name, &format!("Error: {e}"))
            }
        }
    }

    async fn try_invoke(
        &self,
        call: &MessageToolCall,
    ) -> Result<gramclaw_core::ToolResult, ToolError> {
        let arguments = decode_arguments(&call.id, &call.arguments)?;
        self.registry
            .execute(&ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments,
            })
            .await
    }
}

/// Decode the raw argument string a model attached to a tool call.
///
/// Malformed arguments are an error, not an empty object: silently
/// substituting `{}` would run the tool with inputs the model never
/// asked for.
pub fn decode_arguments(call_id: &str, raw: &str) -> Result<serde_json::Value, ToolError> {
    let trimmed = raw.trim();
    // An absent payload is not a malformed one: OpenAI-compatible
    // backends send "" for tool calls that take no arguments.
    if trimmed.is_empty() {
        return Ok(serde_json::json!({}));
    }

    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| ToolError::ArgumentDecode {
            call_id: call_id.to_string(),
            reason: e.to_string(),
        })?;

    if !value.is_object() {
        return Err(ToolError::ArgumentDecode {
            call_id: call_id.to_string(),
            reason: format!("expected a JSON object, got {value}"),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gramclaw_core::message::Role;
    use gramclaw_core::tool::{Tool, ToolResult};
    use std::time::Duration;

    struct SleepEchoTool {
        delay: Duration,
    }

    #[async_trait]
    impl Tool for SleepEchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(self.delay).await;
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: arguments["text"].as_str().unwrap_or("").to_string(),
            })
        }
    }

    fn invoker_with(delay: Duration) -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SleepEchoTool { delay }));
        ToolInvoker::new(Arc::new(registry), Arc::new(EventBus::default()))
    }

    fn echo_call(id: &str, text: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: "echo".into(),
            arguments: format!(r#"{{"text":"{text}"}}"#),
        }
    }

    #[tokio::test]
    async fn rejects_message_without_tool_calls() {
        let invoker = invoker_with(Duration::ZERO);
        let err = invoker
            .invoke(&Message::assistant("no tools here"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NoToolCalls));
    }

    #[tokio::test(start_paused = true)]
    async fn results_preserve_call_order() {
        let invoker = invoker_with(Duration::from_millis(50));
        let msg = Message::assistant_with_tools(
            "",
            vec![echo_call("call_a", "first"), echo_call("call_b", "second")],
        );

        let results = invoker.invoke(&msg).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(results[0].content, "first");
        assert_eq!(results[1].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(results[1].content, "second");
        assert!(results.iter().all(|m| m.role == Role::Tool));
    }

    #[tokio::test]
    async fn unknown_tool_reported_as_error_result() {
        let invoker = invoker_with(Duration::ZERO);
        let msg = Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "call_x".into(),
                name: "no_such_tool".into(),
                arguments: "{}".into(),
            }],
        );

        let results = invoker.invoke(&msg).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.starts_with("Error: "));
        assert!(results[0].content.contains("no_such_tool"));
    }

    #[tokio::test]
    async fn malformed_arguments_reported_as_error_result() {
        let invoker = invoker_with(Duration::ZERO);
        let msg = Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "call_bad".into(),
                name: "echo".into(),
                arguments: "{not json".into(),
            }],
        );

        let results = invoker.invoke(&msg).await.unwrap();
        assert!(results[0].content.starts_with("Error: "));
        assert!(results[0].content.contains("call_bad"));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_siblings() {
        let invoker = invoker_with(Duration::ZERO);
        let msg = Message::assistant_with_tools(
            "",
            vec![
                MessageToolCall {
                    id: "call_bad".into(),
                    name: "echo".into(),
                    arguments: "???".into(),
                },
                echo_call("call_ok", "still ran"),
            ],
        );

        let results = invoker.invoke(&msg).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].content.starts_with("Error: "));
        assert_eq!(results[1].content, "still ran");
    }

    #[test]
    fn decode_empty_string_is_empty_object() {
        assert_eq!(
            decode_arguments("c", "").unwrap(),
            serde_json::json!({})
        );
        assert_eq!(
            decode_arguments("c", "  ").unwrap(),
            serde_json::json!({})
        );
    }

    #[test]
    fn decode_rejects_non_object() {
        let err = decode_arguments("call_9", "[1,2]").unwrap_err();
        match err {
            ToolError::ArgumentDecode { call_id, reason } => {
                assert_eq!(call_id, "call_9");
                assert!(reason.contains("JSON object"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(matches!(
            decode_arguments("c", "{oops"),
            Err(ToolError::ArgumentDecode { .. })
        ));
    }

    #[test]
    fn decode_accepts_object() {
        let value = decode_arguments("c", r#"{"expression": "2+2"}"#).unwrap();
        assert_eq!(value["expression"], "2+2");
    }
}
