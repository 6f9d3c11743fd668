//! 统一错误类型
//!
//! 轮询引擎与工具调度共用 ToolError：封闭的 ErrorKind 枚举 + 稳定的 code 字符串 + retryable 标记，
//! UI 层按 code / kind 分支，无需匹配错误消息文本。

use std::time::Duration;

use thiserror::Error;

/// 错误种类（封闭枚举；远端上报的错误码原样保存在 Remote 中）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// 网络层失败（连接、读写、超时），本层已做有限重试
    Network,
    /// 远端 API 明确返回的失败（如 RATE_LIMIT），code 原样透传
    Remote { code: String },
    /// 轮询超出总时长预算
    PollingTimeout,
    /// 轮询被调用方取消
    PollingCancelled,
    ToolNotFound,
    /// 参数校验失败（缺少必填字段等）
    Validation,
    /// 工具调用超出 ExecutionContext.timeout
    Timeout,
    /// 工具调用被调用方取消
    Cancelled,
    /// 工具处理函数自身出错（含 panic）
    HandlerError,
}

impl ErrorKind {
    /// 稳定的错误码字符串
    pub fn code(&self) -> &str {
        match self {
            ErrorKind::Network => "NETWORK",
            ErrorKind::Remote { code } => code,
            ErrorKind::PollingTimeout => "POLLING_TIMEOUT",
            ErrorKind::PollingCancelled => "POLLING_CANCELLED",
            ErrorKind::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::HandlerError => "HANDLER_ERROR",
        }
    }
}

/// 归一化后的失败结果：每次失败的调用 / 轮询恰好产生一个
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {}", .kind.code(), .message)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn code(&self) -> &str {
        self.kind.code()
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message, true)
    }

    /// 远端错误：RATE_LIMIT 标记为可重试（由上层决定何时重试），其余不可重试
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let retryable = code == "RATE_LIMIT";
        Self::new(ErrorKind::Remote { code }, message, retryable)
    }

    pub fn polling_timeout(elapsed: Duration, poll_count: u32) -> Self {
        Self::new(
            ErrorKind::PollingTimeout,
            format!(
                "Deep research polling timed out after {:.1}s ({} polls). \
                 Thorough research can take longer to finish; try a larger max duration or the quick depth.",
                elapsed.as_secs_f64(),
                poll_count
            ),
            false,
        )
    }

    pub fn polling_cancelled() -> Self {
        Self::new(
            ErrorKind::PollingCancelled,
            "Deep research polling was cancelled",
            false,
        )
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(ErrorKind::ToolNotFound, format!("Unknown tool: {name}"), false)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message, false)
    }

    pub fn timeout(tool: &str, after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Tool '{tool}' timed out after {}ms", after.as_millis()),
            true,
        )
    }

    pub fn cancelled(tool: &str) -> Self {
        Self::new(
            ErrorKind::Cancelled,
            format!("Tool '{tool}' was cancelled"),
            false,
        )
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HandlerError, message, false)
    }

    /// 是否为调用方发起的取消（轮询或工具调用）
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, ErrorKind::PollingCancelled | ErrorKind::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ToolError::network("x").code(), "NETWORK");
        assert_eq!(ToolError::polling_cancelled().code(), "POLLING_CANCELLED");
        assert_eq!(ToolError::tool_not_found("a").code(), "TOOL_NOT_FOUND");
        assert_eq!(ToolError::validation("a").code(), "VALIDATION_ERROR");
        assert_eq!(ToolError::handler("a").code(), "HANDLER_ERROR");
    }

    #[test]
    fn test_remote_code_passes_through() {
        let err = ToolError::remote("RATE_LIMIT", "slow down");
        assert_eq!(err.code(), "RATE_LIMIT");
        assert!(err.retryable);
        assert_eq!(err.to_string(), "RATE_LIMIT: slow down");

        let err = ToolError::remote("INVALID_QUERY", "bad");
        assert!(!err.retryable);
    }

    #[test]
    fn test_polling_timeout_message() {
        let err = ToolError::polling_timeout(Duration::from_millis(7_500), 3);
        assert_eq!(err.code(), "POLLING_TIMEOUT");
        assert!(err.message.contains("timed out"));
        assert!(err.message.contains("7.5s"));
        assert!(!err.retryable);
    }

    #[test]
    fn test_is_cancellation() {
        assert!(ToolError::polling_cancelled().is_cancellation());
        assert!(ToolError::cancelled("t").is_cancellation());
        assert!(!ToolError::network("n").is_cancellation());
    }
}
