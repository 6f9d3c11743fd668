//! 后端 HTTP 客户端
//!
//! JobClient / GenerationClient 两个 trait 是核心与外部服务的接缝；ApiClient 用 reqwest 实现它们。
//! 每个请求都与调用方的 CancellationToken 竞速，取消时在途请求随 future 一起被丢弃。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ApiSection;
use crate::core::{ErrorKind, ToolError};
use crate::research::types::{ApiErrorBody, CreateJobRequest, CreateJobResponse, JobStatusResponse};

/// 传输层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// 连接失败、读写中断、请求超时等，可重试
    #[error("Network error: {0}")]
    Network(String),

    /// 服务端返回非 2xx，code / message 取自响应体
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 请求无法构造（如 base_url 不合法），不可重试
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

impl From<ClientError> for ToolError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Network(msg) => ToolError::network(msg),
            ClientError::Api { code, message } => ToolError::remote(code, message),
            ClientError::Cancelled => {
                ToolError::new(ErrorKind::Cancelled, "Request was cancelled", false)
            }
            ClientError::InvalidResponse(msg) => ToolError::remote("INVALID_RESPONSE", msg),
            ClientError::InvalidRequest(msg) => ToolError::validation(msg),
        }
    }
}

/// 长任务接口：创建任务、查询状态
#[async_trait]
pub trait JobClient: Send + Sync {
    async fn create_job(
        &self,
        request: &CreateJobRequest,
        signal: &CancellationToken,
    ) -> Result<CreateJobResponse, ClientError>;

    async fn job_status(
        &self,
        job_id: &str,
        signal: &CancellationToken,
    ) -> Result<JobStatusResponse, ClientError>;
}

/// 同步生成类接口（图片、文档）：POST /api/tools/{endpoint}
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        endpoint: &str,
        body: &Value,
        signal: &CancellationToken,
    ) -> Result<Value, ClientError>;
}

/// 基于 reqwest 的后端客户端
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("silmari/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(api: &ApiSection) -> Self {
        Self::new(
            api.base_url.clone(),
            Duration::from_secs(api.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// /api/tools/deep-research/{jobId}/status；jobId 来自服务端，作为单个路径段编码
    fn job_status_url(&self, job_id: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.url("/api/tools/deep-research"))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidRequest("base url cannot carry a path".into()))?
            .push(job_id)
            .push("status");
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        signal: &CancellationToken,
    ) -> Result<T, ClientError> {
        let exchange = async {
            let resp = request
                .send()
                .await
                .map_err(|e| ClientError::Network(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(parse_api_error(status, &body));
            }
            resp.json::<T>().await.map_err(|e| {
                if e.is_decode() {
                    ClientError::InvalidResponse(e.to_string())
                } else {
                    ClientError::Network(e.to_string())
                }
            })
        };

        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(ClientError::Cancelled),
            result = exchange => result,
        }
    }
}

#[async_trait]
impl JobClient for ApiClient {
    async fn create_job(
        &self,
        request: &CreateJobRequest,
        signal: &CancellationToken,
    ) -> Result<CreateJobResponse, ClientError> {
        let req = self
            .http
            .post(self.url("/api/tools/deep-research"))
            .json(request);
        self.send_json(req, signal).await
    }

    async fn job_status(
        &self,
        job_id: &str,
        signal: &CancellationToken,
    ) -> Result<JobStatusResponse, ClientError> {
        let req = self.http.get(self.job_status_url(job_id)?);
        self.send_json(req, signal).await
    }
}

#[async_trait]
impl GenerationClient for ApiClient {
    async fn generate(
        &self,
        endpoint: &str,
        body: &Value,
        signal: &CancellationToken,
    ) -> Result<Value, ClientError> {
        let req = self
            .http
            .post(self.url(&format!("/api/tools/{endpoint}")))
            .json(body);
        self.send_json(req, signal).await
    }
}

/// 把非 2xx 响应体 {"error", "code"} 转为 ClientError::Api；缺字段时按状态码兜底
pub fn parse_api_error(status: StatusCode, body: &str) -> ClientError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let (error, code) = match parsed {
        Some(b) => (b.error, b.code),
        None => (None, None),
    };
    let code = code.unwrap_or_else(|| match status {
        StatusCode::TOO_MANY_REQUESTS => "RATE_LIMIT".to_string(),
        s => format!("HTTP_{}", s.as_u16()),
    });
    let message = error.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status.to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    });
    ClientError::Api { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_error_uses_body_fields() {
        let err = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Query is required", "code": "INVALID_REQUEST"}"#,
        );
        assert_eq!(
            err,
            ClientError::Api {
                code: "INVALID_REQUEST".into(),
                message: "Query is required".into()
            }
        );
    }

    #[test]
    fn test_parse_api_error_falls_back_to_status() {
        match parse_api_error(StatusCode::TOO_MANY_REQUESTS, "") {
            ClientError::Api { code, .. } => assert_eq!(code, "RATE_LIMIT"),
            other => panic!("unexpected {other:?}"),
        }
        match parse_api_error(StatusCode::BAD_GATEWAY, "upstream down") {
            ClientError::Api { code, message } => {
                assert_eq!(code, "HTTP_502");
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_client_error_into_tool_error() {
        let e: ToolError = ClientError::Network("reset".into()).into();
        assert_eq!(e.code(), "NETWORK");
        assert!(e.retryable);

        let e: ToolError = ClientError::Api {
            code: "RATE_LIMIT".into(),
            message: "slow".into(),
        }
        .into();
        assert_eq!(e.code(), "RATE_LIMIT");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(5));
        assert_eq!(
            client.url("/api/tools/deep-research"),
            "http://localhost:8000/api/tools/deep-research"
        );
    }

    #[test]
    fn test_job_id_is_encoded_as_one_segment() {
        let client = ApiClient::new("http://localhost:8000", Duration::from_secs(5));
        assert_eq!(
            client.job_status_url("job-1").unwrap().as_str(),
            "http://localhost:8000/api/tools/deep-research/job-1/status"
        );
        assert_eq!(
            client.job_status_url("a/b?c#d").unwrap().as_str(),
            "http://localhost:8000/api/tools/deep-research/a%2Fb%3Fc%23d/status"
        );
    }

    #[test]
    fn test_invalid_base_url_is_not_retryable() {
        let client = ApiClient::new("not a url", Duration::from_secs(5));
        let err = client.job_status_url("job-1").unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert!(!err.is_network());
        let tool_err: ToolError = err.into();
        assert_eq!(tool_err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_cancelled_signal_short_circuits() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(5));
        let token = CancellationToken::new();
        token.cancel();
        let err = client.job_status("job-1", &token).await.unwrap_err();
        assert_eq!(err, ClientError::Cancelled);
    }
}
