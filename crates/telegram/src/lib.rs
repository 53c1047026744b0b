//! Telegram integration for gramclaw.
//!
//! [`api`] is a thin Bot API client, [`limiter`] paces outbound calls
//! with an adaptive delay, [`delivery`] turns agent output into chat
//! messages, and [`handler`] processes inbound webhook updates.

pub mod api;
pub mod delivery;
pub mod handler;
pub mod limiter;
pub mod update;

pub use api::{BotApi, BotInfo, HttpBotApi, SentMessage};
pub use delivery::{DeliveryAdapter, StreamSession};
pub use handler::UpdateHandler;
pub use limiter::RateLimiter;
pub use update::{IncomingMessage, Update};
