//! 工具注册表
//!
//! 启动时用 ToolRegistryBuilder 逐个注册 ToolDefinition，build() 之后得到只读的 ToolRegistry：
//! 它没有任何修改接口，可放进 Arc 在各调用间无锁共享。重复名称在构建阶段直接报错，不会静默覆盖。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::context::ProgressReporter;
use super::result::{ResponseType, ToolResult};

/// 传给处理函数的一次调用
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub params: Value,
    pub progress: ProgressReporter,
    /// 调用被取消或超时后触发，处理函数可据此提前停止
    pub signal: CancellationToken,
}

/// 工具处理函数；返回 ToolError（经 anyhow 包装）时原样透传给调用方，其他错误归为 HANDLER_ERROR
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, call: ToolCall) -> anyhow::Result<ToolResult>;
}

/// 闭包形式的处理函数
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
{
    async fn call(&self, call: ToolCall) -> anyhow::Result<ToolResult> {
        (self.0)(call).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
{
    FnHandler(f)
}

/// 一个可调用能力的元数据与处理函数；构造后不可变
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    /// 触发短语，越具体（通常越长）越靠前
    trigger_phrases: Vec<String>,
    handler: Arc<dyn ToolHandler>,
    response_type: ResponseType,
    /// 参数 JSON Schema，"required" 数组用于调用前校验
    parameters: Value,
    /// 按意图路由时，用户原文填入的参数名
    primary_param: Option<String>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        response_type: ResponseType,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            trigger_phrases: Vec::new(),
            handler: Arc::new(handler),
            response_type,
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            primary_param: None,
        }
    }

    pub fn with_trigger_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trigger_phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }

    pub fn with_primary_param(mut self, name: impl Into<String>) -> Self {
        self.primary_param = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn trigger_phrases(&self) -> &[String] {
        &self.trigger_phrases
    }

    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn primary_param(&self) -> Option<&str> {
        self.primary_param.as_deref()
    }

    /// schema 中声明的必填参数
    pub fn required_params(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("response_type", &self.response_type)
            .field("trigger_phrases", &self.trigger_phrases)
            .finish_non_exhaustive()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),

    #[error("invalid tool name: {0:?} (expected lowercase letters, digits and '_')")]
    InvalidName(String),
}

/// 构建期使用的可变注册器
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<ToolDefinition>>,
    index: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: ToolDefinition) -> Result<Self, RegistryError> {
        let name = tool.name().to_string();
        if !is_valid_name(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::new(tool));
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        tracing::debug!(tools = self.tools.len(), "tool registry built");
        ToolRegistry {
            tools: self.tools,
            index: self.index,
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// 只读注册表：get / has / values，values 按注册顺序返回
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<Arc<ToolDefinition>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<ToolDefinition>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// 工具清单 JSON（name / description / responseType / triggerPhrases / parameters）
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "responseType": tool.response_type(),
                    "triggerPhrases": tool.trigger_phrases(),
                    "parameters": tool.parameters(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "Echo text",
            ResponseType::Text,
            handler_fn(|call: ToolCall| async move {
                let text = call.params["text"].as_str().unwrap_or("(empty)").to_string();
                Ok::<_, anyhow::Error>(ToolResult::text(text))
            }),
        )
        .with_trigger_phrases(["echo this", "echo"])
    }

    #[test]
    fn test_get_has_values() {
        let registry = ToolRegistry::builder()
            .register(echo("echo"))
            .unwrap()
            .register(echo("echo_two"))
            .unwrap()
            .build();

        assert!(registry.has("echo"));
        assert!(!registry.has("missing"));
        assert_eq!(registry.get("echo_two").unwrap().name(), "echo_two");
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.tool_names(), vec!["echo", "echo_two"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_fails_loudly() {
        let err = ToolRegistry::builder()
            .register(echo("echo"))
            .unwrap()
            .register(echo("echo"))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("echo".into()));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = ToolRegistry::builder().register(echo("Bad Name")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
        assert!(ToolRegistry::builder().register(echo("")).is_err());
    }

    #[test]
    fn test_required_params_from_schema() {
        let tool = echo("echo").with_parameters(serde_json::json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        }));
        assert_eq!(tool.required_params(), vec!["text"]);
        assert!(echo("plain").required_params().is_empty());
    }

    #[test]
    fn test_schema_json_lists_tools() {
        let registry = ToolRegistry::builder().register(echo("echo")).unwrap().build();
        let parsed: Value = serde_json::from_str(&registry.to_schema_json()).unwrap();
        assert_eq!(parsed[0]["name"], "echo");
        assert_eq!(parsed[0]["responseType"], "text");
        assert_eq!(parsed[0]["triggerPhrases"][0], "echo this");
    }

    #[tokio::test]
    async fn test_fn_handler_runs() {
        let tool = echo("echo");
        let out = tool
            .handler()
            .call(ToolCall {
                params: serde_json::json!({"text": "hi"}),
                progress: ProgressReporter::noop(),
                signal: CancellationToken::new(),
            })
            .await
            .unwrap();
        assert_eq!(out, ToolResult::text("hi"));
    }
}
