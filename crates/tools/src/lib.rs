//! Built-in tools for gramclaw agents.
//!
//! Each tool implements the [`Tool`] trait from `gramclaw-core` and is
//! registered in a [`ToolRegistry`] at startup.

pub mod calculator;
pub mod image_gen;

pub use calculator::CalculatorTool;
pub use image_gen::{FluxClient, ImageGenTool};

use gramclaw_config::AppConfig;
use gramclaw_core::ToolRegistry;

/// Build the default tool registry from configuration.
///
/// The image generation tool is only registered when an image API key
/// is configured.
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool));

    if let Some(ref api_key) = config.image.api_key {
        let client = FluxClient::new(&config.image.base_url, api_key)
            .with_dimensions(config.image.width, config.image.height)
            .with_steps(config.image.steps)
            .with_seed(config.image.seed);
        registry.register(Box::new(ImageGenTool::new(client)));
    }

    registry
}
