//! Adaptive pacing for outbound Bot API calls.
//!
//! Telegram enforces per-chat and global send limits. Instead of a
//! fixed interval, the limiter keeps a current delay that shrinks
//! toward [`LimiterConfig::min_delay_ms`] while sends succeed and
//! grows toward [`LimiterConfig::max_delay_ms`] when Telegram pushes
//! back with 429s. Each 429 also consumes one retry from a bounded
//! budget; exhausting it fails the operation.

use gramclaw_config::LimiterConfig;
use gramclaw_core::error::ChannelError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

pub struct RateLimiter {
    config: LimiterConfig,
    state: Mutex<RunState>,
}

struct RunState {
    /// Current inter-send delay.
    delay: Duration,
    /// When the next send slot opens.
    next_slot: Instant,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let state = RunState {
            delay: Duration::from_millis(config.min_delay_ms),
            next_slot: Instant::now(),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Current delay in milliseconds. Exposed for observability.
    pub async fn current_delay_ms(&self) -> u64 {
        self.state.lock().await.delay.as_millis() as u64
    }

    /// Run `op` under the limiter.
    ///
    /// Waits for the next send slot, then invokes `op`. On success the
    /// delay decays; on [`ChannelError::TooManyRequests`] it grows and
    /// the call is retried after Telegram's `retry_after` hint (or a
    /// configured default). The budget covers dispatches: with
    /// `max_retries` of 3, the third throttled attempt exhausts it.
    /// Any other error propagates untouched.
    pub async fn schedule<T, F, Fut>(&self, mut op: F) -> Result<T, ChannelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let mut attempts: u32 = 0;

        loop {
            self.pace().await;
            attempts += 1;

            match op().await {
                Ok(value) => {
                    self.on_success().await;
                    return Ok(value);
                }
                Err(ChannelError::TooManyRequests { retry_after_secs }) => {
                    self.on_throttle().await;

                    if attempts >= self.config.max_retries {
                        warn!(attempts, "Retry budget exhausted");
                        return Err(ChannelError::RetryBudgetExceeded { attempts });
                    }

                    let backoff = Duration::from_secs(
                        retry_after_secs.unwrap_or(self.config.default_retry_after_secs),
                    );
                    debug!(
                        attempts,
                        backoff_secs = backoff.as_secs(),
                        "Throttled, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Wait until the next send slot, reserving it before sleeping so
    /// concurrent callers queue up instead of bursting together.
    async fn pace(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let slot = state.next_slot.max(now);
            let wait = slot - now;
            state.next_slot = slot + state.delay;
            wait
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.lock().await;
        let decayed = state.delay.mul_f64(self.config.decay);
        state.delay = decayed.max(Duration::from_millis(self.config.min_delay_ms));
    }

    async fn on_throttle(&self) {
        let mut state = self.state.lock().await;
        let grown = state.delay.mul_f64(self.config.growth);
        state.delay = grown.min(Duration::from_millis(self.config.max_delay_ms));
    }
}
