//! 单次工具调用的执行上下文
//!
//! 调用方提供取消信号、超时与生命周期回调；回调顺序固定为
//! on_start → 零或多次 on_progress → on_complete / on_error 二者之一（恰好一次）。

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::ToolError;

use super::result::ToolResult;

/// 处理函数上报的进度
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolProgress {
    pub message: String,
    pub percentage: Option<f64>,
}

type StartHook = Arc<dyn Fn() + Send + Sync>;
type ProgressHook = Arc<dyn Fn(&ToolProgress) + Send + Sync>;
type CompleteHook = Arc<dyn Fn(&ToolResult) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ToolError) + Send + Sync>;

/// 调用方每次调用传入；不归注册表所有，也不在调用之间共享
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub signal: Option<CancellationToken>,
    pub timeout: Option<Duration>,
    on_start: Option<StartHook>,
    on_progress: Option<ProgressHook>,
    on_complete: Option<CompleteHook>,
    on_error: Option<ErrorHook>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("signal", &self.signal.is_some())
            .field("timeout", &self.timeout)
            .field("on_start", &self.on_start.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&ToolProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&ToolResult) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ToolError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn fire_start(&self) {
        if let Some(f) = &self.on_start {
            f();
        }
    }

    pub(crate) fn fire_complete(&self, result: &ToolResult) {
        if let Some(f) = &self.on_complete {
            f(result);
        }
    }

    pub(crate) fn fire_error(&self, error: &ToolError) {
        if let Some(f) = &self.on_error {
            f(error);
        }
    }

    pub(crate) fn progress_reporter(&self) -> ProgressReporter {
        ProgressReporter {
            hook: self.on_progress.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// 交给处理函数的进度上报句柄；调用结束（close）后的上报被丢弃
#[derive(Clone)]
pub struct ProgressReporter {
    hook: Option<ProgressHook>,
    closed: Arc<AtomicBool>,
}

impl ProgressReporter {
    /// 不转发任何进度（用于直接调用处理函数的场景）
    pub fn noop() -> Self {
        Self {
            hook: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn report(&self, message: impl Into<String>, percentage: Option<f64>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(f) = &self.hook {
            f(&ToolProgress {
                message: message.into(),
                percentage,
            });
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
