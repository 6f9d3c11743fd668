//! 工具返回值：text / image / file 三选一的标签联合

use serde::{Deserialize, Serialize};

/// 工具声明的响应类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Text,
    Image,
    File,
}

/// 归一化后的工具输出，序列化为 {"type": "text", "content": ...} 等
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    Text { content: String },
    Image { url: String },
    File { url: String, filename: String },
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        ToolResult::Text {
            content: content.into(),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ToolResult::Image { url: url.into() }
    }

    pub fn file(url: impl Into<String>, filename: impl Into<String>) -> Self {
        ToolResult::File {
            url: url.into(),
            filename: filename.into(),
        }
    }

    pub fn response_type(&self) -> ResponseType {
        match self {
            ToolResult::Text { .. } => ResponseType::Text,
            ToolResult::Image { .. } => ResponseType::Image,
            ToolResult::File { .. } => ResponseType::File,
        }
    }
}

pub fn is_text_response(result: &ToolResult) -> bool {
    matches!(result, ToolResult::Text { .. })
}

pub fn is_image_response(result: &ToolResult) -> bool {
    matches!(result, ToolResult::Image { .. })
}

pub fn is_file_response(result: &ToolResult) -> bool {
    matches!(result, ToolResult::File { .. })
}
