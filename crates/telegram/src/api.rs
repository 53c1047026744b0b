//! Telegram Bot API client.
//!
//! Covers the handful of methods gramclaw needs: sending, editing and
//! deleting messages, sending photos, and `getMe`. HTTP 429 responses
//! surface as [`ChannelError::TooManyRequests`] carrying Telegram's
//! `retry_after` hint so the rate limiter can honor it.

use async_trait::async_trait;
use gramclaw_core::error::ChannelError;
use serde::Deserialize;
use tracing::{debug, warn};

/// The subset of the Bot API gramclaw talks to.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<SentMessage, ChannelError>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChannelError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChannelError>;

    /// Send a photo by URL; Telegram fetches it server-side.
    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: Option<&str>,
    ) -> Result<SentMessage, ChannelError>;

    async fn get_me(&self) -> Result<BotInfo, ChannelError>;
}

/// A successfully delivered message.
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

/// Identity of the bot, from `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    pub username: Option<String>,
}

/// Bot API client over HTTPS.
pub struct HttpBotApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBotApi {
    pub fn new(bot_token: &str) -> Self {
        Self::with_base_url("https://api.telegram.org", bot_token)
    }

    /// Point at a different API server (test servers, local mocks).
    pub fn with_base_url(api_root: &str, bot_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("{}/bot{}", api_root.trim_end_matches('/'), bot_token),
            client,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, ChannelError> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(method, "Calling Bot API");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("Bad API response: {e}")))?;

        if body.ok {
            return body.result.ok_or_else(|| {
                ChannelError::InvalidPayload("API response missing result".into())
            });
        }

        let description = body.description.unwrap_or_else(|| "unknown error".into());
        if status == 429 || body.error_code == Some(429) {
            let retry_after = body.parameters.and_then(|p| p.retry_after);
            warn!(method, ?retry_after, "Bot API rate limited");
            return Err(ChannelError::TooManyRequests {
                retry_after_secs: retry_after,
            });
        }

        warn!(method, status, description = %description, "Bot API call failed");
        Err(ChannelError::DeliveryFailed {
            reason: description,
        })
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<SentMessage, ChannelError> {
        self.call(
            "sendMessage",
            serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "disable_web_page_preview": true,
            }),
        )
        .await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChannelError> {
        // editMessageText returns the edited Message; we only need ok.
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                serde_json::json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "text": text,
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChannelError> {
        let _: serde_json::Value = self
            .call(
                "deleteMessage",
                serde_json::json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                }),
            )
            .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: Option<&str>,
    ) -> Result<SentMessage, ChannelError> {
        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "photo": photo_url,
        });
        if let Some(caption) = caption {
            payload["caption"] = serde_json::json!(caption);
        }
        self.call("sendPhoto", payload).await
    }

    async fn get_me(&self) -> Result<BotInfo, ChannelError> {
        self.call("getMe", serde_json::json!({})).await
    }
}

/// Every Bot API response wraps its payload in this envelope.
///
/// `result` must stay a plain `Option<T>` without a `default`
/// attribute: serde's derive would otherwise require `T: Default`,
/// which payload types like [`SentMessage`] do not implement. A
/// missing field already deserializes as `None`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}
