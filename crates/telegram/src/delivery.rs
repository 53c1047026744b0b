//! Turning agent output into chat messages.
//!
//! All outbound traffic funnels through the [`RateLimiter`]. For
//! streamed turns a [`StreamSession`] shows a provisional message that
//! grows as tokens arrive, then consolidates into a single final edit
//! so the chat ends up with exactly one clean reply.

use crate::api::{BotApi, SentMessage};
use crate::limiter::RateLimiter;
use async_trait::async_trait;
use gramclaw_agent::TokenSink;
use gramclaw_core::error::ChannelError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_FLUSH_THRESHOLD: usize = 64;

pub struct DeliveryAdapter {
    api: Arc<dyn BotApi>,
    limiter: Arc<RateLimiter>,
    flush_threshold: usize,
}

impl DeliveryAdapter {
    pub fn new(api: Arc<dyn BotApi>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            api,
            limiter,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }

    /// How many buffered characters trigger a provisional update.
    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    /// Send a complete reply.
    pub async fn send_final(&self, chat_id: i64, text: &str) -> Result<SentMessage, ChannelError> {
        self.limiter
            .schedule(|| self.api.send_message(chat_id, text))
            .await
    }

    /// Send a short status notice (e.g. "Generating image...").
    pub async fn send_status(&self, chat_id: i64, text: &str) -> Result<SentMessage, ChannelError> {
        self.send_final(chat_id, text).await
    }

    /// Send a photo by URL.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: Option<&str>,
    ) -> Result<SentMessage, ChannelError> {
        self.limiter
            .schedule(|| self.api.send_photo(chat_id, photo_url, caption))
            .await
    }

    /// Delete a message, swallowing failures. Status notices may
    /// already be gone; that is not worth failing a turn over.
    pub async fn delete_best_effort(&self, chat_id: i64, message_id: i64) {
        let result = self
            .limiter
            .schedule(|| self.api.delete_message(chat_id, message_id))
            .await;
        if let Err(e) = result {
            debug!(chat_id, message_id, error = %e, "Could not delete message");
        }
    }

    /// Open a streaming session for one turn in `chat_id`.
    pub fn begin_stream(self: &Arc<Self>, chat_id: i64) -> Arc<StreamSession> {
        Arc::new(StreamSession {
            adapter: self.clone(),
            chat_id,
            state: Mutex::new(SessionState {
                buffer: String::new(),
                message_id: None,
                flushed_len: 0,
            }),
        })
    }
}

/// One in-flight streamed reply.
pub struct StreamSession {
    adapter: Arc<DeliveryAdapter>,
    chat_id: i64,
    state: Mutex<SessionState>,
}

struct SessionState {
    buffer: String,
    /// Provisional message being edited in place, once one exists.
    message_id: Option<i64>,
    /// Buffer length at the last flush.
    flushed_len: usize,
}

impl StreamSession {
    /// Id of the provisional message, once one exists in the chat.
    pub async fn provisional_message_id(&self) -> Option<i64> {
        self.state.lock().await.message_id
    }

    /// Deliver the final reply: one consolidated send or edit.
    ///
    /// Unlike provisional updates this is the turn's actual output, so
    /// failures propagate instead of being logged away.
    pub async fn finalize(&self) -> Result<(), ChannelError> {
        let mut state = self.state.lock().await;

        if state.buffer.is_empty() {
            debug!(chat_id = self.chat_id, "Empty reply, nothing to deliver");
            return Ok(());
        }

        // Skip the edit when the provisional message already shows the
        // full text.
        if state.message_id.is_some() && state.flushed_len == state.buffer.len() {
            return Ok(());
        }

        self.flush(&mut state).await
    }

    /// Push the buffered text to the chat, creating or editing the
    /// provisional message.
    async fn flush(&self, state: &mut SessionState) -> Result<(), ChannelError> {
        let text = state.buffer.clone();
        if text.is_empty() {
            return Ok(());
        }

        match state.message_id {
            None => {
                let sent = self
                    .adapter
                    .limiter
                    .schedule(|| self.adapter.api.send_message(self.chat_id, &text))
                    .await?;
                state.message_id = Some(sent.message_id);
            }
            Some(message_id) => {
                self.adapter
                    .limiter
                    .schedule(|| {
                        self.adapter
                            .api
                            .edit_message_text(self.chat_id, message_id, &text)
                    })
                    .await?;
            }
        }

        state.flushed_len = state.buffer.len();
        Ok(())
    }
}

#[async_trait]
impl TokenSink for StreamSession {
    async fn on_token(&self, token: &str) {
        let mut state = self.state.lock().await;
        state.buffer.push_str(token);
        if state.buffer.len() - state.flushed_len >= self.adapter.flush_threshold {
            if let Err(e) = self.flush(&mut state).await {
                // Keep accumulating; finalize retries the full text.
                warn!(chat_id = self.chat_id, error = %e, "Provisional update failed");
            }
        }
    }

    async fn on_complete(&self, full_text: &str) {
        // Record the authoritative text; the network send happens in
        // `finalize`, where the caller can observe the outcome.
        let mut state = self.state.lock().await;
        state.buffer = full_text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BotInfo;
    use gramclaw_config::LimiterConfig;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Send { chat_id: i64, text: String },
        Edit { message_id: i64, text: String },
        Delete { message_id: i64 },
        Photo { url: String },
    }

    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<Call>>,
        next_id: AtomicI64,
    }

    impl RecordingApi {
        async fn calls(&self) -> Vec<Call> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl BotApi for RecordingApi {
        async fn send_message(
            &self,
            chat_id: i64,
            text: &str,
        ) -> Result<SentMessage, ChannelError> {
            self.calls.lock().await.push(Call::Send {
                chat_id,
                text: text.into(),
            });
            Ok(SentMessage {
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 100,
            })
        }

        async fn edit_message_text(
            &self,
            _chat_id: i64,
            message_id: i64,
            text: &str,
        ) -> Result<(), ChannelError> {
            self.calls.lock().await.push(Call::Edit {
                message_id,
                text: text.into(),
            });
            Ok(())
        }

        async fn delete_message(
            &self,
            _chat_id: i64,
            message_id: i64,
        ) -> Result<(), ChannelError> {
            self.calls.lock().await.push(Call::Delete { message_id });
            Ok(())
        }

        async fn send_photo(
            &self,
            _chat_id: i64,
            photo_url: &str,
            _caption: Option<&str>,
        ) -> Result<SentMessage, ChannelError> {
            self.calls.lock().await.push(Call::Photo {
                url: photo_url.into(),
            });
            Ok(SentMessage { message_id: 900 })
        }

        async fn get_me(&self) -> Result<BotInfo, ChannelError> {
            Ok(BotInfo {
                id: 1,
                username: Some("test_bot".into()),
            })
        }
    }

    fn adapter(api: Arc<RecordingApi>) -> Arc<DeliveryAdapter> {
        let limiter = Arc::new(RateLimiter::new(LimiterConfig::default()));
        Arc::new(DeliveryAdapter::new(api, limiter).with_flush_threshold(10))
    }

    #[tokio::test(start_paused = true)]
    async fn short_reply_is_a_single_send() {
        let api = Arc::new(RecordingApi::default());
        let session = adapter(api.clone()).begin_stream(7);

        session.on_token("Hi!").await;
        session.on_complete("Hi!").await;
        session.finalize().await.unwrap();

        assert_eq!(
            api.calls().await,
            vec![Call::Send {
                chat_id: 7,
                text: "Hi!".into()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn long_reply_edits_in_place() {
        let api = Arc::new(RecordingApi::default());
        let session = adapter(api.clone()).begin_stream(7);

        session.on_token("This crosses ").await; // 13 chars, flushes
        session.on_token("the threshold").await; // flushes again (edit)
        session.on_complete("This crosses the threshold, final form.").await;
        session.finalize().await.unwrap();

        let calls = api.calls().await;
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], Call::Send { .. }));
        assert!(matches!(calls[1], Call::Edit { .. }));
        match &calls[2] {
            Call::Edit { message_id, text } => {
                assert_eq!(*message_id, 100);
                assert_eq!(text, "This crosses the threshold, final form.");
            }
            other => panic!("expected final edit, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_skips_redundant_edit() {
        let api = Arc::new(RecordingApi::default());
        let session = adapter(api.clone()).begin_stream(7);

        session.on_token("exactly ten..").await; // flushes
        session.on_complete("exactly ten..").await; // identical
        session.finalize().await.unwrap(); // skipped

        assert_eq!(api.calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_sends_nothing() {
        let api = Arc::new(RecordingApi::default());
        let session = adapter(api.clone()).begin_stream(7);

        session.on_complete("").await;
        session.finalize().await.unwrap();

        assert!(api.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_propagates_send_failure() {
        struct FailingSend;

        #[async_trait]
        impl BotApi for FailingSend {
            async fn send_message(&self, _: i64, _: &str) -> Result<SentMessage, ChannelError> {
                Err(ChannelError::DeliveryFailed {
                    reason: "blocked by user".into(),
                })
            }
            async fn edit_message_text(&self, _: i64, _: i64, _: &str) -> Result<(), ChannelError> {
                Err(ChannelError::DeliveryFailed {
                    reason: "blocked by user".into(),
                })
            }
            async fn delete_message(&self, _: i64, _: i64) -> Result<(), ChannelError> {
                Ok(())
            }
            async fn send_photo(
                &self,
                _: i64,
                _: &str,
                _: Option<&str>,
            ) -> Result<SentMessage, ChannelError> {
                Err(ChannelError::DeliveryFailed {
                    reason: "blocked by user".into(),
                })
            }
            async fn get_me(&self) -> Result<BotInfo, ChannelError> {
                Ok(BotInfo {
                    id: 1,
                    username: None,
                })
            }
        }

        let limiter = Arc::new(RateLimiter::new(LimiterConfig::default()));
        let session = Arc::new(DeliveryAdapter::new(Arc::new(FailingSend), limiter))
            .begin_stream(7);

        session.on_complete("the reply").await;
        let err = session.finalize().await.unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_best_effort_swallows_errors() {
        struct FailingDelete(RecordingApi);

        #[async_trait]
        impl BotApi for FailingDelete {
            async fn send_message(
                &self,
                chat_id: i64,
                text: &str,
            ) -> Result<SentMessage, ChannelError> {
                self.0.send_message(chat_id, text).await
            }
            async fn edit_message_text(
                &self,
                chat_id: i64,
                message_id: i64,
                text: &str,
            ) -> Result<(), ChannelError> {
                self.0.edit_message_text(chat_id, message_id, text).await
            }
            async fn delete_message(&self, _: i64, _: i64) -> Result<(), ChannelError> {
                Err(ChannelError::DeliveryFailed {
                    reason: "message to delete not found".into(),
                })
            }
            async fn send_photo(
                &self,
                chat_id: i64,
                url: &str,
                caption: Option<&str>,
            ) -> Result<SentMessage, ChannelError> {
                self.0.send_photo(chat_id, url, caption).await
            }
            async fn get_me(&self) -> Result<BotInfo, ChannelError> {
                self.0.get_me().await
            }
        }

        let api = Arc::new(FailingDelete(RecordingApi::default()));
        let limiter = Arc::new(RateLimiter::new(LimiterConfig::default()));
        let adapter = DeliveryAdapter::new(api, limiter);

        // Must not panic or propagate.
        adapter.delete_best_effort(7, 42).await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_final_goes_through_limiter() {
        let api = Arc::new(RecordingApi::default());
        let adapter = adapter(api.clone());

        let sent = adapter.send_final(9, "done").await.unwrap();
        assert_eq!(sent.message_id, 100);
        assert_eq!(api.calls().await.len(), 1);
    }
}
