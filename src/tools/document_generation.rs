//! document_generation 工具：把写作内容导出为文档，返回下载 URL 与文件名

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::client::GenerationClient;
use crate::core::ToolError;

use super::registry::{ToolCall, ToolDefinition, ToolHandler};
use super::result::{ResponseType, ToolResult};
use super::schema::{parameters_schema, parse_params};

pub const TOOL_NAME: &str = "document_generation";
const ENDPOINT: &str = "document-generation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Docx,
    Pdf,
    Markdown,
}

impl DocumentFormat {
    fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Markdown => "md",
        }
    }
}

/// document_generation 参数
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DocumentGenerationParams {
    /// 文档正文或生成说明
    pub content: String,
    #[serde(default)]
    pub format: DocumentFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

pub struct DocumentGenerationTool {
    client: Arc<dyn GenerationClient>,
}

impl DocumentGenerationTool {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::new(
            TOOL_NAME,
            "Export writing as a downloadable document. Args: {\"content\": \"text\", \"format\": \"docx\" | \"pdf\" | \"markdown\", \"title\": \"optional\"}",
            ResponseType::File,
            self,
        )
        .with_trigger_phrases([
            "generate a document",
            "create a document",
            "export as pdf",
            "export as docx",
            "make a document",
            "export",
        ])
        .with_parameters(parameters_schema::<DocumentGenerationParams>())
        .with_primary_param("content")
    }
}

#[async_trait]
impl ToolHandler for DocumentGenerationTool {
    async fn call(&self, call: ToolCall) -> anyhow::Result<ToolResult> {
        let params: DocumentGenerationParams = parse_params(TOOL_NAME, call.params)?;
        let body = serde_json::to_value(&params)?;

        call.progress.report("generating document", None);
        let resp = self
            .client
            .generate(ENDPOINT, &body, &call.signal)
            .await
            .map_err(ToolError::from)?;

        let url = resp
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::remote("INVALID_RESPONSE", "Document response has no url"))?;
        // 服务端未给文件名时按标题 + 格式生成
        let filename = match resp.get("filename").and_then(|v| v.as_str()) {
            Some(name) => name.to_string(),
            None => default_filename(params.title.as_deref(), params.format),
        };

        tracing::info!(url = %url, filename = %filename, "document generated");
        Ok(ToolResult::file(url, filename))
    }
}

fn default_filename(title: Option<&str>, format: DocumentFormat) -> String {
    let stem: String = title
        .unwrap_or("document")
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let stem = if stem.is_empty() { "document".to_string() } else { stem };
    format!("{stem}.{}", format.extension())
}
