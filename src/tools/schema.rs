//! 工具参数 Schema 与调用前校验
//!
//! 参数结构体 derive JsonSchema，由 schemars 生成 JSON Schema 挂到 ToolDefinition 上；
//! 调用前按 schema 的 "required" 检查参数，缺失时返回 VALIDATION_ERROR，处理函数不会被调用。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::ToolError;

use super::registry::ToolDefinition;

/// 由参数类型生成 JSON Schema
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({ "type": "object", "properties": {}, "required": [] })
    })
}

/// 参数必须是对象，且 required 中的字段存在、非 null、非空字符串
pub fn validate_params(tool: &ToolDefinition, params: &Value) -> Result<(), ToolError> {
    let obj = params.as_object().ok_or_else(|| {
        ToolError::validation(format!(
            "Parameters for '{}' must be a JSON object",
            tool.name()
        ))
    })?;

    let missing: Vec<&str> = tool
        .required_params()
        .into_iter()
        .filter(|key| match obj.get(*key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolError::validation(format!(
            "Missing required parameter(s) for '{}': {}",
            tool.name(),
            missing.join(", ")
        )))
    }
}

/// 处理函数内把参数解析为具体类型；失败归为 VALIDATION_ERROR
pub fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params)
        .map_err(|e| ToolError::validation(format!("Invalid parameters for '{tool}': {e}")))
}
