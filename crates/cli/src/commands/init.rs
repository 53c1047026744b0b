//! `gramclaw init` — Write a starter config file.

use gramclaw_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("  Config already exists: {}", config_path.display());
        println!("  Delete it first if you want a fresh one.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;

    println!("  Wrote {}", config_path.display());
    println!();
    println!("  Next steps:");
    println!("    1. Set GRAMCLAW_BOT_TOKEN to your bot token from @BotFather");
    println!("    2. Set GRAMCLAW_API_KEY to your model API key");
    println!("    3. Run `gramclaw doctor` to verify, then `gramclaw serve`");

    Ok(())
}
