//! 轮询退避策略：间隔翻倍，封顶于 max_interval（无抖动）

use std::time::Duration;

/// 首次轮询前的等待
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(5_000);
/// 间隔上限
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(60_000);
/// 总时长预算（30 分钟）
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(1_800_000);
pub const BACKOFF_MULTIPLIER: u32 = 2;

/// 计算下一次轮询间隔：previous * 2，再与 cap 取小
pub fn next_interval(previous: Duration, cap: Duration) -> Duration {
    previous.saturating_mul(BACKOFF_MULTIPLIER).min(cap)
}

/// 单个任务的退避状态：间隔单调不减，且永不超过 cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    current: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    /// initial 超过 cap 时按 cap 处理
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self {
            current: initial.min(cap),
            cap,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// 推进到下一个间隔并返回它
    pub fn advance(&mut self) -> Duration {
        self.current = next_interval(self.current, self.cap);
        self.current
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_INTERVAL)
    }
}
