//! Image generation via a Flux-compatible HTTP API.
//!
//! [`FluxClient`] talks to the novita.ai `flux-1-schnell` endpoint (or
//! any API with the same request/response shape). [`ImageGenTool`]
//! exposes it to the agent as a `generate_image` tool.

use async_trait::async_trait;
use gramclaw_core::error::ToolError;
use gramclaw_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Client for a Flux-style text-to-image API.
#[derive(Clone)]
pub struct FluxClient {
    base_url: String,
    api_key: String,
    width: u32,
    height: u32,
    steps: u32,
    seed: u64,
    client: reqwest::Client,
}

impl FluxClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            width: 1024,
            height: 1024,
            steps: 4,
            seed: 2024,
            client,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate a single image and return its URL.
    pub async fn generate(&self, prompt: &str) -> Result<String, ToolError> {
        debug!(prompt = %prompt, "Requesting image generation");

        let request = FluxRequest {
            prompt: prompt.to_string(),
            width: self.width,
            height: self.height,
            seed: self.seed,
            steps: self.steps,
            image_num: 1,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "generate_image".into(),
                reason: format!("Request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Image API returned error");
            return Err(ToolError::ExecutionFailed {
                tool_name: "generate_image".into(),
                reason: format!("Image API returned {status}"),
            });
        }

        let parsed: FluxResponse =
            response
                .json()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "generate_image".into(),
                    reason: format!("Invalid image API response: {e}"),
                })?;

        parsed
            .images
            .into_iter()
            .next()
            .map(|img| img.image_url)
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: "generate_image".into(),
                reason: "Image API returned no images".into(),
            })
    }
}

#[derive(Debug, Serialize)]
struct FluxRequest {
    prompt: String,
    width: u32,
    height: u32,
    seed: u64,
    steps: u32,
    image_num: u32,
}

#[derive(Debug, Deserialize)]
struct FluxResponse {
    #[serde(default)]
    images: Vec<FluxImage>,
}

#[derive(Debug, Deserialize)]
struct FluxImage {
    image_url: String,
}

/// Tool wrapper so the model can request images mid-conversation.
pub struct ImageGenTool {
    client: FluxClient,
}

impl ImageGenTool {
    pub fn new(client: FluxClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ImageGenTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generate an image from a text prompt. Returns a URL to the generated image."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "A description of the image to generate"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let prompt = arguments["prompt"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'prompt' argument".into()))?;

        match self.client.generate(prompt).await {
            Ok(url) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: format!("Image generated successfully: {url}"),
            }),
            Err(e) => Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: format!("Image generation failed: {e}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let request = FluxRequest {
            prompt: "a red fox".into(),
            width: 1024,
            height: 1024,
            seed: 2024,
            steps: 4,
            image_num: 1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "a red fox");
        assert_eq!(json["seed"], 2024);
        assert_eq!(json["image_num"], 1);
    }

    #[test]
    fn response_parsing() {
        let body = r#"{"images":[{"image_url":"https://cdn.example/img.jpg","image_type":"jpeg"}],"task":{"task_id":"t1"}}"#;
        let parsed: FluxResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.images[0].image_url, "https://cdn.example/img.jpg");
    }

    #[test]
    fn response_with_no_images() {
        let parsed: FluxResponse = serde_json::from_str(r#"{"images":[]}"#).unwrap();
        assert!(parsed.images.is_empty());
    }

    #[test]
    fn client_builder_defaults() {
        let client = FluxClient::new("https://api.example/v3beta/flux-1-schnell", "key");
        assert_eq!(client.width, 1024);
        assert_eq!(client.seed, 2024);
        assert_eq!(client.steps, 4);
    }

    #[tokio::test]
    async fn tool_rejects_missing_prompt() {
        let tool = ImageGenTool::new(FluxClient::new("https://api.example", "key"));
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn tool_definition() {
        let tool = ImageGenTool::new(FluxClient::new("https://api.example", "key"));
        let def = tool.to_definition();
        assert_eq!(def.name, "generate_image");
        assert!(def.parameters["properties"]["prompt"].is_object());
    }
}
