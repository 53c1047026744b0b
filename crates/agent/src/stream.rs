//! Token streaming seam between the turn loop and a delivery channel.

use async_trait::async_trait;

/// Receives assistant tokens as they arrive from the model.
///
/// Implementations decide what "showing" a token means: a terminal
/// prints it, a chat channel buffers and flushes on its own schedule.
/// Sinks are best-effort; a sink failure never fails the turn.
#[async_trait]
pub trait TokenSink: Send + Sync {
    /// A content token arrived.
    async fn on_token(&self, token: &str);

    /// The assistant message is complete. `full_text` is the
    /// assembled message content.
    async fn on_complete(&self, full_text: &str);
}

/// A sink that collects tokens into memory. Useful in tests.
#[derive(Default)]
pub struct CollectingSink {
    tokens: tokio::sync::Mutex<Vec<String>>,
}

impl CollectingSink {
    pub async fn tokens(&self) -> Vec<String> {
        self.tokens.lock().await.clone()
    }
}

#[async_trait]
impl TokenSink for CollectingSink {
    async fn on_token(&self, token: &str) {
        self.tokens.lock().await.push(token.to_string());
    }

    async fn on_complete(&self, _full_text: &str) {}
}
