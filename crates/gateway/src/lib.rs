//! HTTP webhook gateway for gramclaw.
//!
//! Two routes: `GET /` reports liveness (handy for the uptime pings
//! hosting platforms send), and `POST /` receives Telegram webhook
//! updates. The webhook responds only after the turn finishes, so
//! Telegram's retry behavior doubles as a crude at-least-once queue.
//!
//! Built on Axum.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
};
use gramclaw_core::error::Error;
use gramclaw_core::event::EventBus;
use gramclaw_core::identity::Identity;
use gramclaw_telegram::{DeliveryAdapter, HttpBotApi, RateLimiter, Update, UpdateHandler};
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for the gateway routes.
pub struct GatewayState {
    pub handler: UpdateHandler,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(status_handler).post(webhook_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn status_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "gramclaw operational",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": (chrono::Utc::now() - state.started_at).num_seconds(),
    }))
}

async fn webhook_handler(
    State(state): State<SharedState>,
    Json(update): Json<Update>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.handler.handle(update).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "ok": true }))),
        Err(e) => {
            error!(error = %e, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

/// Log domain events as they happen. Runs until the bus closes.
fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            info!(?event, "domain event");
        }
    });
}

/// Wire up all subsystems and serve the gateway.
pub async fn start(config: gramclaw_config::AppConfig) -> Result<(), Error> {
    let bot_token = config
        .telegram
        .bot_token
        .as_deref()
        .ok_or_else(|| Error::Config {
            message: "No Telegram bot token configured — set GRAMCLAW_BOT_TOKEN".into(),
        })?;

    let provider = gramclaw_providers::build_from_config(&config);
    let tools = Arc::new(gramclaw_tools::default_registry(&config));
    let identity = Identity::with_override(config.agent.system_prompt.as_deref());
    let event_bus = Arc::new(EventBus::default());
    spawn_event_logger(&event_bus);

    let api = Arc::new(HttpBotApi::new(bot_token));
    let limiter = Arc::new(RateLimiter::new(config.limiter.clone()));
    let delivery = Arc::new(DeliveryAdapter::new(api, limiter));

    let mut handler = UpdateHandler::new(
        provider,
        &config.model.name,
        config.model.temperature,
        tools,
        identity,
        event_bus,
        delivery,
    )
    .with_max_iterations(config.agent.max_iterations);
    if let Some(max_tokens) = config.model.max_tokens {
        handler = handler.with_max_tokens(max_tokens);
    }
    if let Some(ref image_key) = config.image.api_key {
        let client = gramclaw_tools::FluxClient::new(&config.image.base_url, image_key)
            .with_dimensions(config.image.width, config.image.height)
            .with_steps(config.image.steps)
            .with_seed(config.image.seed);
        handler = handler.with_image_client(client);
    }

    let state = Arc::new(GatewayState {
        handler,
        started_at: chrono::Utc::now(),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Config {
            message: format!("Could not bind {addr}: {e}"),
        })?;
    axum::serve(listener, app).await.map_err(|e| Error::Config {
        message: format!("Server error: {e}"),
    })?;

    Ok(())
}
