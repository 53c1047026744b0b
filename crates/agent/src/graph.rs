//! The turn graph: drives inference and tool execution to completion.

use crate::invoker::ToolInvoker;
use crate::policy::{Decision, RoutingPolicy};
use crate::stream::TokenSink;
use gramclaw_core::error::AgentError;
use gramclaw_core::event::{DomainEvent, EventBus};
use gramclaw_core::identity::Identity;
use gramclaw_core::message::{Conversation, Message};
use gramclaw_core::provider::{Provider, ProviderRequest, ProviderResponse};
use gramclaw_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shown when a turn burns through its iteration budget without the
/// model settling on a text answer.
const ITERATION_EXHAUSTED_REPLY: &str =
    "I wasn't able to finish that request. Could you rephrase or break it into smaller steps?";

/// Orchestrates one conversational turn.
pub struct TurnGraph {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    identity: Identity,
    policy: RoutingPolicy,
    invoker: ToolInvoker,
    max_iterations: u32,
    event_bus: Arc<EventBus>,
    token_sink: Option<Arc<dyn TokenSink>>,
}

impl TurnGraph {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        identity: Identity,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let invoker = ToolInvoker::new(tools.clone(), event_bus.clone());
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            identity,
            policy: RoutingPolicy,
            invoker,
            max_iterations: 10,
            event_bus,
            token_sink: None,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Stream assistant tokens into `sink` as they arrive instead of
    /// waiting for complete responses.
    pub fn with_token_sink(mut self, sink: Arc<dyn TokenSink>) -> Self {
        self.token_sink = Some(sink);
        self
    }

    /// Run a complete turn for a fresh conversation.
    pub async fn run(&self, user_message: &str) -> Result<Conversation, AgentError> {
        let mut conversation = Conversation::new();
        conversation.push(Message::system(&self.identity.system_prompt));
        conversation.push(Message::user(user_message));
        self.process(&mut conversation).await?;
        Ok(conversation)
    }

    /// Drive an existing conversation to the end of its current turn.
    ///
    /// The conversation must end with a user message. Returns the text
    /// of the final assistant reply.
    pub async fn process(&self, conversation: &mut Conversation) -> Result<String, AgentError> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Starting turn"
        );

        let tool_definitions = self.tools.definitions();

        for iteration in 1..=self.max_iterations {
            debug!(conversation_id = %conversation.id, iteration, "Inference step");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.infer(request).await?;

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    conversation_id: conversation.id.to_string(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: chrono::Utc::now(),
                });
            }

            let assistant = response.message;
            conversation.push(assistant.clone());

            match self.policy.decide(conversation) {
                Decision::Stop => {
                    if let Some(sink) = &self.token_sink {
                        sink.on_complete(&assistant.content).await;
                    }
                    return Ok(assistant.content);
                }
                Decision::Continue => {
                    debug!(
                        conversation_id = %conversation.id,
                        tool_count = assistant.tool_calls.len(),
                        "Executing tool calls"
                    );
                    for result in self.invoker.invoke(&assistant).await? {
                        conversation.push(result);
                    }
                }
            }
        }

        warn!(
            conversation_id = %conversation.id,
            max_iterations = self.max_iterations,
            "Iteration budget exhausted, ending turn"
        );
        conversation.push(Message::assistant(ITERATION_EXHAUSTED_REPLY));
        if let Some(sink) = &self.token_sink {
            sink.on_complete(ITERATION_EXHAUSTED_REPLY).await;
        }
        Ok(ITERATION_EXHAUSTED_REPLY.into())
    }

    /// One inference step, streaming through the token sink when one
    /// is attached.
    async fn infer(&self, request: ProviderRequest) -> Result<ProviderResponse, AgentError> {
        let Some(sink) = &self.token_sink else {
            return Ok(self.provider.complete(request).await?);
        };

        let mut rx = self.provider.stream(request).await?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = None;

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(token) = &chunk.content {
                sink.on_token(token).await;
                content.push_str(token);
            }
            tool_calls.extend(chunk.tool_calls);
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        let message = if tool_calls.is_empty() {
            Message::assistant(&content)
        } else {
            Message::assistant_with_tools(content, tool_calls)
        };

        Ok(ProviderResponse {
            message,
            usage,
            model: self.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::CollectingSink;
    use async_trait::async_trait;
    use gramclaw_core::error::ProviderError;
    use gramclaw_core::message::{MessageToolCall, Role};
    use gramclaw_core::provider::Usage;
    use gramclaw_core::tool::ToolRegistry;
    use gramclaw_tools::CalculatorTool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed sequence of responses, one per `complete` call.
    struct ScriptedProvider {
        responses: Vec<Message>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Message>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let message = self
                .responses
                .get(n)
                .cloned()
                .unwrap_or_else(|| Message::assistant("script exhausted"));
            Ok(ProviderResponse {
                message,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "scripted-model".into(),
            })
        }

        async fn health_check(&self) -> Result<bool, ProviderError> {
            Ok(true)
        }
    }

    fn graph(provider: Arc<dyn Provider>, tools: ToolRegistry) -> TurnGraph {
        TurnGraph::new(
            provider,
            "scripted-model",
            0.7,
            Arc::new(tools),
            Identity::default(),
            Arc::new(EventBus::default()),
        )
    }

    fn calc_call(id: &str, expression: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: "calculator".into(),
            arguments: format!(r#"{{"expression":"{expression}"}}"#),
        }
    }

    #[tokio::test]
    async fn plain_reply_is_a_single_step_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![Message::assistant("Hi there!")]));
        let graph = graph(provider.clone(), ToolRegistry::new());

        let conversation = graph.run("Hello").await.unwrap();

        // system, user, assistant
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.messages[0].role, Role::System);
        assert_eq!(conversation.messages[2].content, "Hi there!");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tool_turn_runs_calculator_and_loops_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Message::assistant_with_tools("", vec![calc_call("call_1", "2 + 2")]),
            Message::assistant("It's 4."),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CalculatorTool));
        let graph = graph(provider.clone(), tools);

        let conversation = graph.run("What is 2+2?").await.unwrap();

        // system, user, assistant(tool call), tool result, assistant
        assert_eq!(conversation.len(), 5);
        assert_eq!(conversation.messages[3].role, Role::Tool);
        assert_eq!(conversation.messages[3].content, "The result is: 4");
        assert_eq!(
            conversation.messages[3].tool_call_id.as_deref(),
            Some("call_1")
        );
        assert_eq!(conversation.messages[4].content, "It's 4.");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parallel_tool_calls_produce_ordered_results() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Message::assistant_with_tools(
                "",
                vec![calc_call("call_a", "1 + 1"), calc_call("call_b", "3 * 3")],
            ),
            Message::assistant("2 and 9."),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CalculatorTool));
        let graph = graph(provider, tools);

        let conversation = graph.run("Compute both").await.unwrap();

        // system, user, assistant, tool x2, assistant
        assert_eq!(conversation.len(), 6);
        assert_eq!(conversation.messages[3].content, "The result is: 2");
        assert_eq!(conversation.messages[4].content, "The result is: 9");
    }

    #[tokio::test]
    async fn iteration_budget_yields_fallback_reply() {
        // The model keeps asking for tools forever.
        let endless: Vec<Message> = (0..20)
            .map(|i| Message::assistant_with_tools("", vec![calc_call(&format!("call_{i}"), "1")]))
            .collect();
        let provider = Arc::new(ScriptedProvider::new(endless));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CalculatorTool));
        let graph = graph(provider.clone(), tools).with_max_iterations(3);

        let conversation = graph.run("loop forever").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        let last = conversation.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, ITERATION_EXHAUSTED_REPLY);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        struct FailingProvider;

        #[async_trait]
        impl Provider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> Result<ProviderResponse, ProviderError> {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "upstream down".into(),
                })
            }
            async fn health_check(&self) -> Result<bool, ProviderError> {
                Ok(false)
            }
        }

        let graph = graph(Arc::new(FailingProvider), ToolRegistry::new());
        let err = graph.run("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::UpstreamModel(_)));
    }

    #[tokio::test]
    async fn sink_receives_streamed_tokens() {
        // Default stream() wraps complete() in a single done chunk, so
        // the whole reply arrives as one token.
        let provider = Arc::new(ScriptedProvider::new(vec![Message::assistant("Hello!")]));
        let sink = Arc::new(CollectingSink::default());
        let graph = graph(provider, ToolRegistry::new()).with_token_sink(sink.clone());

        let conversation = graph.run("Hi").await.unwrap();

        assert_eq!(conversation.last().unwrap().content, "Hello!");
        assert_eq!(sink.tokens().await, vec!["Hello!"]);
    }
}
