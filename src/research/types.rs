//! Deep research 接口的请求 / 响应结构（JSON 字段为 camelCase）

use std::collections::HashMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// 远端任务状态；除 completed / failed 外的任何值都视为「仍在运行」
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// 未枚举的进行中状态，原样保留
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(JobStatus::from(s.as_str()))
    }
}

/// 研究深度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResearchDepth {
    #[default]
    Quick,
    Thorough,
}

/// 附加给研究任务的工具，如 {"type": "web_search_preview"}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
}

/// POST /api/tools/deep-research 请求体
#[derive(Debug, Clone, Serialize)]
pub struct CreateJobRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<ResearchDepth>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ResearchToolSpec>,
}

impl CreateJobRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: None,
            tools: Vec::new(),
        }
    }

    pub fn with_depth(mut self, depth: ResearchDepth) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_tool(mut self, kind: impl Into<String>) -> Self {
        self.tools.push(ResearchToolSpec { kind: kind.into() });
        self
    }
}

/// 引用来源；字段不固定，未知字段保存在 extra
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// 完成后的研究结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub reasoning_steps: Vec<Value>,
}

impl ResearchResult {
    /// 正文 + 编号引用列表
    pub fn to_markdown(&self) -> String {
        let mut out = self.text.clone();
        let sources: Vec<String> = self
            .citations
            .iter()
            .filter_map(|c| match (&c.title, &c.url) {
                (Some(t), Some(u)) => Some(format!("[{t}]({u})")),
                (None, Some(u)) => Some(u.clone()),
                (Some(t), None) => Some(t.clone()),
                (None, None) => None,
            })
            .collect();
        if !sources.is_empty() {
            out.push_str("\n\n## Sources\n");
            for (i, s) in sources.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, s));
            }
        }
        out
    }
}

/// 创建任务的响应：同步完成时直接是结果，否则为 {jobId, status}
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CreateJobResponse {
    Queued {
        #[serde(rename = "jobId")]
        job_id: String,
        #[serde(default)]
        status: Option<JobStatus>,
    },
    Completed(ResearchResult),
}

/// 远端上报的错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

/// 任务进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

/// GET /api/tools/deep-research/{jobId}/status 响应
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<ResearchResult>,
    #[serde(default)]
    pub error: Option<RemoteError>,
    #[serde(default)]
    pub progress: Option<JobProgress>,
}

impl JobStatusResponse {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            result: None,
            error: None,
            progress: None,
        }
    }
}

/// 非 2xx 响应体：{"error": "...", "code": "..."}
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
