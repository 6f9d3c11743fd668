//! image_generation 工具：POST /api/tools/image-generation，返回图片 URL

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::client::GenerationClient;
use crate::core::ToolError;

use super::registry::{ToolCall, ToolDefinition, ToolHandler};
use super::result::{ResponseType, ToolResult};
use super::schema::{parameters_schema, parse_params};

pub const TOOL_NAME: &str = "image_generation";
const ENDPOINT: &str = "image-generation";

/// image_generation 参数
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ImageGenerationParams {
    /// 图片描述
    pub prompt: String,
    /// 如 "1024x1024"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

pub struct ImageGenerationTool {
    client: Arc<dyn GenerationClient>,
}

impl ImageGenerationTool {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::new(
            TOOL_NAME,
            "Generate an illustration from a text prompt. Args: {\"prompt\": \"description\", \"size\": \"1024x1024\" (optional)}",
            ResponseType::Image,
            self,
        )
        .with_trigger_phrases([
            "generate an image of",
            "create an image of",
            "draw a picture of",
            "generate an image",
            "create an image",
            "illustrate",
            "draw",
        ])
        .with_parameters(parameters_schema::<ImageGenerationParams>())
        .with_primary_param("prompt")
    }
}

#[async_trait]
impl ToolHandler for ImageGenerationTool {
    async fn call(&self, call: ToolCall) -> anyhow::Result<ToolResult> {
        let params: ImageGenerationParams = parse_params(TOOL_NAME, call.params)?;
        let body = serde_json::to_value(&params)?;

        call.progress.report("generating image", None);
        let resp = self
            .client
            .generate(ENDPOINT, &body, &call.signal)
            .await
            .map_err(ToolError::from)?;

        let url = resp
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::remote("INVALID_RESPONSE", "Image response has no url"))?;

        tracing::info!(url = %url, "image generated");
        Ok(ToolResult::image(url))
    }
}
