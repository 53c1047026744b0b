//! Model backend implementations for gramclaw.
//!
//! All providers implement the `gramclaw_core::Provider` trait. The
//! orchestration loop talks to a `RetryProvider`-wrapped
//! `OpenAiCompatProvider` by default.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;

use gramclaw_config::AppConfig;
use gramclaw_core::Provider;
use std::sync::Arc;

/// Build the default provider stack from configuration:
/// an OpenAI-compatible client wrapped in a bounded internal retry.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let inner = OpenAiCompatProvider::new(
        "groq",
        &config.model.base_url,
        config.model.api_key.as_deref().unwrap_or_default(),
    );
    Arc::new(RetryProvider::new(
        Arc::new(inner),
        config.model.retry_attempts,
    ))
}
