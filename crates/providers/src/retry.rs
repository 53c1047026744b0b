//! Retry wrapper for providers.
//!
//! Wraps any [`Provider`] and retries transient failures (network errors,
//! timeouts, rate limits, 5xx responses) a bounded number of times before
//! giving up. Non-transient failures (auth errors, 4xx) propagate
//! immediately.

use async_trait::async_trait;
use gramclaw_core::error::ProviderError;
use gramclaw_core::provider::{ProviderRequest, ProviderResponse, StreamChunk};
use gramclaw_core::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A provider that retries transient failures of its inner provider.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    /// Retries after the first attempt (0 means a single attempt).
    max_retries: u32,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    fn backoff(attempt: u32, error: &ProviderError) -> Duration {
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs)
            }
            // 500ms, 1s, 2s, ...
            _ => Duration::from_millis(500 * (1 << attempt.min(4))),
        }
    }
}

/// Whether an error is worth retrying.
fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::Network(_)
        | ProviderError::Timeout(_)
        | ProviderError::RateLimited { .. }
        | ProviderError::StreamInterrupted(_) => true,
        ProviderError::ApiError { status_code, .. } => *status_code >= 500,
        ProviderError::AuthenticationFailed(_) => false,
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(attempt, "Completion succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    let delay = Self::backoff(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        // Only the initial connection is retried; once chunks are flowing
        // a mid-stream failure surfaces to the consumer.
        let mut attempt = 0;
        loop {
            match self.inner.stream(request.clone()).await {
                Ok(rx) => return Ok(rx),
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    let delay = Self::backoff(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        error = %e,
                        "Transient error opening stream, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
