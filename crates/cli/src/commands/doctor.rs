//! `gramclaw doctor` — Diagnose configuration problems.

use gramclaw_config::AppConfig;
use gramclaw_telegram::{BotApi, HttpBotApi};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("  gramclaw doctor");
    println!("  ===============");
    println!();

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ok   Config file valid");

                if config.has_model_key() {
                    println!("  ok   Model API key configured");
                    let provider = gramclaw_providers::build_from_config(&config);
                    match provider.health_check().await {
                        Ok(true) => println!("  ok   Model API reachable"),
                        Ok(false) | Err(_) => {
                            println!("  !!   Model API unreachable (check key and network)");
                            issues += 1;
                        }
                    }
                } else {
                    println!("  !!   No model API key — set GRAMCLAW_API_KEY");
                    issues += 1;
                }

                match config.telegram.bot_token.as_deref().filter(|t| !t.is_empty()) {
                    Some(token) => {
                        println!("  ok   Telegram bot token configured");
                        match HttpBotApi::new(token).get_me().await {
                            Ok(me) => println!(
                                "  ok   Telegram API reachable (bot @{})",
                                me.username.unwrap_or_else(|| "unknown".into())
                            ),
                            Err(e) => {
                                println!("  !!   Telegram API check failed: {e}");
                                issues += 1;
                            }
                        }
                    }
                    None => {
                        println!("  !!   No bot token — set GRAMCLAW_BOT_TOKEN (needed for `serve`)");
                        issues += 1;
                    }
                }

                if config.image.api_key.is_some() {
                    println!("  ok   Image API key configured");
                } else {
                    println!("  --   No image API key (image generation disabled)");
                }

                if config.limiter.min_delay_ms > config.limiter.max_delay_ms {
                    println!("  !!   limiter.min_delay_ms exceeds max_delay_ms");
                    issues += 1;
                }
            }
            Err(e) => {
                println!("  !!   Config file invalid: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  !!   No config file — run `gramclaw init`");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
