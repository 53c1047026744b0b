//! Processing inbound updates end to end.
//!
//! For each text message the handler either runs a full agent turn or,
//! for obvious image requests, goes straight to the image API without
//! involving the model. Failures turn into a short human-readable
//! reply in the chat before propagating to the gateway.

use crate::delivery::DeliveryAdapter;
use crate::update::Update;
use gramclaw_agent::TurnGraph;
use gramclaw_core::error::{AgentError, Error, ProviderError};
use gramclaw_core::event::{DomainEvent, EventBus};
use gramclaw_core::identity::Identity;
use gramclaw_core::provider::Provider;
use gramclaw_core::tool::ToolRegistry;
use gramclaw_tools::FluxClient;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const IMAGE_STATUS_NOTICE: &str = "Generating your image, hang tight...";
const IMAGE_FAILED_REPLY: &str = "I couldn't generate that image. Please try again.";

pub struct UpdateHandler {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    tools: Arc<ToolRegistry>,
    identity: Identity,
    event_bus: Arc<EventBus>,
    delivery: Arc<DeliveryAdapter>,
    image_client: Option<FluxClient>,
}

impl UpdateHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        identity: Identity,
        event_bus: Arc<EventBus>,
        delivery: Arc<DeliveryAdapter>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_iterations: 10,
            tools,
            identity,
            event_bus,
            delivery,
            image_client: None,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable the direct image-generation shortcut.
    pub fn with_image_client(mut self, client: FluxClient) -> Self {
        self.image_client = Some(client);
        self
    }

    /// Handle one webhook update. Non-text updates are ignored.
    pub async fn handle(&self, update: Update) -> Result<(), Error> {
        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "Update without message, ignoring");
            return Ok(());
        };
        let Some(text) = message.text else {
            debug!(
                update_id = update.update_id,
                chat_id = message.chat.id,
                "Non-text message, ignoring"
            );
            return Ok(());
        };

        let chat_id = message.chat.id;
        info!(
            update_id = update.update_id,
            chat_id,
            message_id = message.message_id,
            "Handling inbound message"
        );
        self.event_bus.publish(DomainEvent::TurnStarted {
            chat_id,
            update_id: update.update_id,
            timestamp: chrono::Utc::now(),
        });

        if let Some(image_client) = &self.image_client {
            if is_image_request(&text) {
                return self.handle_image_request(image_client, chat_id, &text).await;
            }
        }

        self.handle_turn(chat_id, &text).await
    }

    async fn handle_turn(&self, chat_id: i64, text: &str) -> Result<(), Error> {
        let session = self.delivery.begin_stream(chat_id);

        let mut graph = TurnGraph::new(
            self.provider.clone(),
            &self.model,
            self.temperature,
            self.tools.clone(),
            self.identity.clone(),
            self.event_bus.clone(),
        )
        .with_max_iterations(self.max_iterations)
        .with_token_sink(session.clone());
        if let Some(max) = self.max_tokens {
            graph = graph.with_max_tokens(max);
        }

        match graph.run(text).await {
            Ok(conversation) => {
                if let Err(e) = session.finalize().await {
                    error!(chat_id, error = %e, "Final delivery failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "delivery".into(),
                        error_message: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    return Err(e.into());
                }
                debug!(
                    chat_id,
                    conversation_id = %conversation.id,
                    messages = conversation.len(),
                    "Turn complete"
                );
                Ok(())
            }
            Err(e) => {
                error!(chat_id, error = %e, "Turn failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "turn".into(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                // A half-streamed provisional message would otherwise
                // linger next to the apology.
                if let Some(message_id) = session.provisional_message_id().await {
                    self.delivery.delete_best_effort(chat_id, message_id).await;
                }
                if let Err(send_err) = self.delivery.send_final(chat_id, error_reply(&e)).await {
                    warn!(chat_id, error = %send_err, "Could not deliver error reply");
                }
                Err(e.into())
            }
        }
    }

    async fn handle_image_request(
        &self,
        image_client: &FluxClient,
        chat_id: i64,
        prompt: &str,
    ) -> Result<(), Error> {
        info!(chat_id, "Image request shortcut");
        let status_id = match self.delivery.send_status(chat_id, IMAGE_STATUS_NOTICE).await {
            Ok(sent) => Some(sent.message_id),
            Err(e) => {
                warn!(chat_id, error = %e, "Could not send status notice");
                None
            }
        };

        let outcome = match image_client.generate(prompt).await {
            Ok(url) => self
                .delivery
                .send_photo(chat_id, &url, None)
                .await
                .map(|_| ())
                .map_err(Error::from),
            Err(e) => {
                error!(chat_id, error = %e, "Image generation failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "image".into(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                if let Err(send_err) = self.delivery.send_final(chat_id, IMAGE_FAILED_REPLY).await {
                    warn!(chat_id, error = %send_err, "Could not deliver error reply");
                }
                Err(e.into())
            }
        };

        if let Some(status_id) = status_id {
            self.delivery.delete_best_effort(chat_id, status_id).await;
        }

        outcome
    }
}

/// Heuristic for "draw me a picture" style requests that should skip
/// the model entirely.
pub fn is_image_request(text: &str) -> bool {
    const VERBS: [&str; 5] = ["generate", "create", "visualize", "make", "draw"];
    const NOUNS: [&str; 4] = ["image", "picture", "visual", "photo"];

    let lower = text.to_lowercase();
    VERBS.iter().any(|v| lower.contains(v)) && NOUNS.iter().any(|n| lower.contains(n))
}

/// What the user sees when a turn fails.
fn error_reply(error: &AgentError) -> &'static str {
    match error {
        AgentError::UpstreamModel(ProviderError::RateLimited { .. }) => {
            "I'm receiving too many requests right now. Please try again in a moment."
        }
        AgentError::UpstreamModel(ProviderError::AuthenticationFailed(_)) => {
            "There's a configuration problem on my end. Please contact the administrator."
        }
        AgentError::UpstreamModel(
            ProviderError::Network(_) | ProviderError::Timeout(_),
        ) => "I'm having trouble reaching my language model. Please try again.",
        _ => "Something went wrong while processing your message. Please try again.",
    }
}
