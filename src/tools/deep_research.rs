//! deep_research 工具：创建远端研究任务并轮询至完成，结果以 Markdown 文本返回
//!
//! 轮询进度经 ToolCall.progress 转发给调用方；调用取消 / 超时时 ToolCall.signal 触发，轮询随即停止。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::client::JobClient;
use crate::research::{execute_deep_research, DeepResearchOptions, PollOptions, ResearchDepth};

use super::registry::{ToolCall, ToolDefinition, ToolHandler};
use super::result::{ResponseType, ToolResult};
use super::schema::{parameters_schema, parse_params};

pub const TOOL_NAME: &str = "deep_research";

/// deep_research 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeepResearchParams {
    /// 研究问题
    pub query: String,
    /// quick（默认）或 thorough
    #[serde(default)]
    pub depth: Option<ResearchDepth>,
}

pub struct DeepResearchTool {
    client: Arc<dyn JobClient>,
    /// 轮询参数模板（间隔、预算）；signal 与 on_progress 每次调用时填入
    poll: PollOptions,
}

impl DeepResearchTool {
    pub fn new(client: Arc<dyn JobClient>, poll: PollOptions) -> Self {
        Self { client, poll }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::new(
            TOOL_NAME,
            "Run a multi-step deep research job on a topic and return a cited report. \
             Args: {\"query\": \"research question\", \"depth\": \"quick\" | \"thorough\" (optional)}",
            ResponseType::Text,
            self,
        )
        .with_trigger_phrases([
            "do a deep research on",
            "deep research",
            "research this topic",
            "find sources on",
            "look into",
            "investigate",
            "research",
        ])
        .with_parameters(parameters_schema::<DeepResearchParams>())
        .with_primary_param("query")
    }
}

#[async_trait]
impl ToolHandler for DeepResearchTool {
    async fn call(&self, call: ToolCall) -> anyhow::Result<ToolResult> {
        let params: DeepResearchParams = parse_params(TOOL_NAME, call.params)?;

        tracing::info!(query = %params.query, depth = ?params.depth, "deep_research started");

        let progress = call.progress.clone();
        let poll = self
            .poll
            .clone()
            .with_signal(call.signal.clone())
            .with_progress(move |p| {
                let message = match p.progress.as_ref().and_then(|j| j.step.as_deref()) {
                    Some(step) => format!("{} (poll {}): {}", p.status, p.poll_count, step),
                    None => format!("{} (poll {})", p.status, p.poll_count),
                };
                progress.report(message, p.progress.as_ref().and_then(|j| j.percentage));
            });

        let outcome = execute_deep_research(
            Arc::clone(&self.client),
            &params.query,
            DeepResearchOptions {
                depth: params.depth,
                tools: Vec::new(),
                poll,
            },
        )
        .await?;

        tracing::info!(
            poll_count = outcome.poll_count,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            citations = outcome.result.citations.len(),
            "deep_research finished"
        );

        Ok(ToolResult::text(outcome.result.to_markdown()))
    }
}
