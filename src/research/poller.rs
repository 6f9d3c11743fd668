//! 长任务轮询引擎
//!
//! 状态机：Scheduled → Polling ⇄ Polling(backoff) → {Completed | Failed | TimedOut | Cancelled}。
//!
//! - 首次查询前先等待 initial_interval，之后每轮等待当前间隔再查询，间隔按 BackoffPolicy 翻倍封顶；
//! - 单次查询遇到网络错误时在同一轮内重试（固定间隔，不消耗退避进度），超过上限返回 NETWORK；
//! - 每次等待前检查总耗时，超出 max_duration 返回 POLLING_TIMEOUT；
//! - 取消信号与每一次等待、每一个在途请求竞速，命中后返回 POLLING_CANCELLED，不再发出任何请求。
//!
//! 同一任务任意时刻最多一个状态请求在途。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, JobClient};
use crate::core::{ErrorKind, ToolError};

use super::backoff::{BackoffPolicy, DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_DURATION, DEFAULT_MAX_INTERVAL};
use super::types::{JobProgress, JobStatus, JobStatusResponse, ResearchResult};

/// 单轮内容忍的连续网络失败次数（第 4 次失败即放弃）
pub const MAX_NETWORK_RETRIES_PER_POLL: u32 = 3;
/// 网络重试之间的固定间隔
pub const NETWORK_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// 每次收到状态响应后回调
pub type PollProgressCallback = Arc<dyn Fn(&PollProgress) + Send + Sync>;

/// 进度事件
#[derive(Debug, Clone, PartialEq)]
pub struct PollProgress {
    pub status: JobStatus,
    pub poll_count: u32,
    pub elapsed: Duration,
    pub progress: Option<JobProgress>,
}

/// 轮询成功的结果
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub result: ResearchResult,
    pub poll_count: u32,
    pub elapsed: Duration,
}

/// 单次 poll 调用的参数
#[derive(Clone)]
pub struct PollOptions {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_duration: Duration,
    pub network_retry_delay: Duration,
    pub max_network_retries: u32,
    pub on_progress: Option<PollProgressCallback>,
    pub signal: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_duration: DEFAULT_MAX_DURATION,
            network_retry_delay: NETWORK_RETRY_DELAY,
            max_network_retries: MAX_NETWORK_RETRIES_PER_POLL,
            on_progress: None,
            signal: None,
        }
    }
}

impl fmt::Debug for PollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollOptions")
            .field("initial_interval", &self.initial_interval)
            .field("max_interval", &self.max_interval)
            .field("max_duration", &self.max_duration)
            .field("network_retry_delay", &self.network_retry_delay)
            .field("max_network_retries", &self.max_network_retries)
            .field("on_progress", &self.on_progress.is_some())
            .field("signal", &self.signal.is_some())
            .finish()
    }
}

impl PollOptions {
    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_progress(mut self, f: impl Fn(&PollProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// 单个任务的本地轮询进度，只属于一次 poll 调用
struct PollState {
    backoff: BackoffPolicy,
    poll_count: u32,
    started_at: Instant,
    last_status: JobStatus,
}

impl PollState {
    fn new(opts: &PollOptions) -> Self {
        Self {
            backoff: BackoffPolicy::new(opts.initial_interval, opts.max_interval),
            poll_count: 0,
            started_at: Instant::now(),
            last_status: JobStatus::Pending,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// 轮询引擎：持有 JobClient，可被多个任务并发复用（每次 poll 的状态互不共享）
pub struct PollingEngine {
    client: Arc<dyn JobClient>,
}

impl PollingEngine {
    pub fn new(client: Arc<dyn JobClient>) -> Self {
        Self { client }
    }

    /// 轮询 job_id 直到终态
    pub async fn poll(&self, job_id: &str, opts: PollOptions) -> Result<PollOutcome, ToolError> {
        let signal = opts.signal.clone().unwrap_or_default();
        let mut state = PollState::new(&opts);

        tracing::info!(
            job_id = %job_id,
            initial_ms = opts.initial_interval.as_millis() as u64,
            max_interval_ms = opts.max_interval.as_millis() as u64,
            max_duration_ms = opts.max_duration.as_millis() as u64,
            "polling started"
        );

        loop {
            if signal.is_cancelled() {
                tracing::info!(job_id = %job_id, poll_count = state.poll_count, "polling cancelled");
                return Err(ToolError::polling_cancelled());
            }

            let elapsed = state.elapsed();
            if elapsed >= opts.max_duration {
                tracing::warn!(
                    job_id = %job_id,
                    poll_count = state.poll_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "polling timed out"
                );
                return Err(ToolError::polling_timeout(elapsed, state.poll_count));
            }

            if !sleep_or_cancel(state.backoff.current(), &signal).await {
                tracing::info!(job_id = %job_id, poll_count = state.poll_count, "polling cancelled");
                return Err(ToolError::polling_cancelled());
            }

            state.poll_count += 1;
            let response = match self.check_status(job_id, &opts, &signal).await {
                Ok(response) => response,
                Err(e) => {
                    if e.kind == ErrorKind::Network {
                        emit(&opts, &state, state.last_status.clone(), None);
                    }
                    return Err(e);
                }
            };

            state.last_status = response.status.clone();
            emit(&opts, &state, response.status.clone(), response.progress.clone());

            match response.status {
                JobStatus::Completed => {
                    let elapsed = state.elapsed();
                    let result = response.result.ok_or_else(|| {
                        ToolError::remote("INVALID_RESPONSE", "Job completed without a result")
                    })?;
                    tracing::info!(
                        job_id = %job_id,
                        poll_count = state.poll_count,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "polling completed"
                    );
                    return Ok(PollOutcome {
                        result,
                        poll_count: state.poll_count,
                        elapsed,
                    });
                }
                JobStatus::Failed => {
                    let (code, message) = match response.error {
                        Some(err) => (err.code, err.message),
                        None => ("RESEARCH_FAILED".to_string(), "Deep research job failed".to_string()),
                    };
                    tracing::warn!(job_id = %job_id, code = %code, "remote job failed");
                    return Err(ToolError::remote(code, message));
                }
                ref status => {
                    tracing::debug!(
                        job_id = %job_id,
                        status = %status,
                        poll_count = state.poll_count,
                        next_interval_ms = next_ms(&state),
                        "job still running"
                    );
                    state.backoff.advance();
                }
            }
        }
    }

    /// 单轮状态查询：网络错误在本轮内重试，其余错误直接返回
    async fn check_status(
        &self,
        job_id: &str,
        opts: &PollOptions,
        signal: &CancellationToken,
    ) -> Result<JobStatusResponse, ToolError> {
        let mut failures = 0u32;
        loop {
            let result = tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(ToolError::polling_cancelled()),
                r = self.client.job_status(job_id, signal) => r,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(ClientError::Cancelled) => return Err(ToolError::polling_cancelled()),
                Err(ClientError::Network(msg)) => {
                    failures += 1;
                    if failures > opts.max_network_retries {
                        tracing::warn!(job_id = %job_id, attempts = failures, error = %msg, "status check retries exhausted");
                        return Err(ToolError::network(format!(
                            "Status check for job {job_id} failed after {failures} attempts: {msg}"
                        )));
                    }
                    tracing::warn!(
                        job_id = %job_id,
                        attempt = failures,
                        max_retries = opts.max_network_retries,
                        error = %msg,
                        "status check failed, retrying"
                    );
                    if !sleep_or_cancel(opts.network_retry_delay, signal).await {
                        return Err(ToolError::polling_cancelled());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn next_ms(state: &PollState) -> u64 {
    let mut peek = state.backoff;
    peek.advance().as_millis() as u64
}

fn emit(opts: &PollOptions, state: &PollState, status: JobStatus, progress: Option<JobProgress>) {
    if let Some(cb) = &opts.on_progress {
        cb(&PollProgress {
            status,
            poll_count: state.poll_count,
            elapsed: state.elapsed(),
            progress,
        });
    }
}

/// 等待 d；被取消时立即返回 false（计时器随 select 分支一起释放）
pub(crate) async fn sleep_or_cancel(d: Duration, signal: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = signal.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}
