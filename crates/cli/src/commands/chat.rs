//! `gramclaw chat` — Talk to the agent from the terminal.

use gramclaw_agent::TurnGraph;
use gramclaw_config::AppConfig;
use gramclaw_core::event::EventBus;
use gramclaw_core::identity::Identity;
use gramclaw_core::message::{Conversation, Message};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_model_key() {
        eprintln!();
        eprintln!("  ERROR: No model API key configured!");
        eprintln!();
        eprintln!("  Set GRAMCLAW_API_KEY, or add api_key under [model] in:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = gramclaw_providers::build_from_config(&config);
    let tools = Arc::new(gramclaw_tools::default_registry(&config));
    let identity = Identity::with_override(config.agent.system_prompt.as_deref());
    let event_bus = Arc::new(EventBus::default());

    let mut graph = TurnGraph::new(
        provider,
        &config.model.name,
        config.model.temperature,
        tools.clone(),
        identity.clone(),
        event_bus,
    )
    .with_max_iterations(config.agent.max_iterations);
    if let Some(max_tokens) = config.model.max_tokens {
        graph = graph.with_max_tokens(max_tokens);
    }

    if let Some(msg) = message {
        // Single message mode
        let mut conv = Conversation::new();
        conv.push(Message::system(&identity.system_prompt));
        conv.push(Message::user(&msg));

        eprint!("  Thinking...");
        let response = graph.process(&mut conv).await?;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  gramclaw — interactive chat");
    println!("  Model: {}", config.model.name);
    println!("  Tools: {}", tools.names().join(", "));
    println!();
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();

    let mut conv = Conversation::new();
    conv.push(Message::system(&identity.system_prompt));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        conv.push(Message::user(input));
        eprint!("  ...");

        match graph.process(&mut conv).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  gramclaw > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");

    Ok(())
}
