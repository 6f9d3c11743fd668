//! Deep research：创建远端长任务并轮询至终态
//!
//! - **backoff**: 轮询间隔退避策略
//! - **poller**: 轮询引擎（退避、网络重试、总时长预算、取消）
//! - **types**: 接口请求 / 响应结构

pub mod backoff;
pub mod poller;
pub mod types;

use std::sync::Arc;

use tokio::time::Instant;

use crate::client::{ClientError, JobClient};
use crate::core::ToolError;

pub use backoff::{next_interval, BackoffPolicy};
pub use poller::{
    PollOptions, PollOutcome, PollProgress, PollingEngine, MAX_NETWORK_RETRIES_PER_POLL,
};
pub use types::{
    Citation, CreateJobRequest, CreateJobResponse, JobProgress, JobStatus, JobStatusResponse,
    RemoteError, ResearchDepth, ResearchResult, ResearchToolSpec,
};

/// execute_deep_research 的参数：请求字段 + 轮询参数
#[derive(Debug, Clone, Default)]
pub struct DeepResearchOptions {
    pub depth: Option<ResearchDepth>,
    pub tools: Vec<ResearchToolSpec>,
    pub poll: PollOptions,
}

/// 创建研究任务；同步完成则直接返回结果，否则把 jobId 交给轮询引擎
///
/// 创建失败（非 2xx）时原样返回远端 error / code，不进入轮询。
pub async fn execute_deep_research(
    client: Arc<dyn JobClient>,
    query: &str,
    opts: DeepResearchOptions,
) -> Result<PollOutcome, ToolError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ToolError::validation("Query is required"));
    }

    let signal = opts.poll.signal.clone().unwrap_or_default();
    if signal.is_cancelled() {
        return Err(ToolError::polling_cancelled());
    }

    let request = CreateJobRequest {
        query: query.to_string(),
        depth: opts.depth,
        tools: opts.tools.clone(),
    };

    let started = Instant::now();
    let created = client
        .create_job(&request, &signal)
        .await
        .map_err(|e| match e {
            ClientError::Cancelled => ToolError::polling_cancelled(),
            other => {
                tracing::warn!(error = %other, "deep research job creation failed");
                ToolError::from(other)
            }
        })?;

    match created {
        CreateJobResponse::Completed(result) => {
            tracing::info!("deep research completed synchronously");
            Ok(PollOutcome {
                result,
                poll_count: 0,
                elapsed: started.elapsed(),
            })
        }
        CreateJobResponse::Queued { job_id, .. } => {
            tracing::info!(job_id = %job_id, depth = ?request.depth, "deep research job created");
            PollingEngine::new(client).poll(&job_id, opts.poll).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::poller::tests::{completed, ScriptedClient};

    fn opts() -> DeepResearchOptions {
        DeepResearchOptions {
            poll: PollOptions::default()
                .with_intervals(Duration::from_millis(1_000), Duration::from_millis(60_000)),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronous_result_skips_polling() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        *client.create_response.lock().unwrap() = Some(Ok(CreateJobResponse::Completed(
            ResearchResult {
                text: "instant".into(),
                citations: vec![],
                reasoning_steps: vec![],
            },
        )));

        let outcome = execute_deep_research(client.clone(), "what is rust", opts())
            .await
            .unwrap();
        assert_eq!(outcome.result.text, "instant");
        assert_eq!(outcome.poll_count, 0);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_job_is_polled() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(completed("polled"))]));
        let outcome = execute_deep_research(client.clone(), "what is rust", opts())
            .await
            .unwrap();
        assert_eq!(outcome.result.text, "polled");
        assert_eq!(outcome.poll_count, 1);
        assert_eq!(*client.creates.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_error_surfaces_remote_code() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        *client.create_response.lock().unwrap() = Some(Err(ClientError::Api {
            code: "RATE_LIMIT".into(),
            message: "Rate limit exceeded".into(),
        }));

        let err = execute_deep_research(client.clone(), "q", opts())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RATE_LIMIT");
        assert_eq!(err.message, "Rate limit exceeded");
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let err = execute_deep_research(client.clone(), "   ", opts())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(*client.creates.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_create() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let token = CancellationToken::new();
        token.cancel();
        let mut o = opts();
        o.poll = o.poll.with_signal(token);

        let err = execute_deep_research(client.clone(), "q", o).await.unwrap_err();
        assert_eq!(err.code(), "POLLING_CANCELLED");
        assert_eq!(*client.creates.lock().unwrap(), 0);
    }
}
