//! `gramclaw serve` — Start the webhook gateway.

use gramclaw_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("  gramclaw gateway");
    println!("  Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("  Model:     {}", config.model.name);

    gramclaw_gateway::start(config).await?;

    Ok(())
}
