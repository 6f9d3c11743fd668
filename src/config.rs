//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SILMARI__*` 覆盖（双下划线表示嵌套，如 `SILMARI__API__BASE_URL=http://localhost:8000`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::research::PollOptions;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub api: ApiSection,
    pub polling: PollingSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [api] 段：后端地址与单次请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// [polling] 段：deep research 轮询参数（毫秒）
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// 总时长预算，默认 30 分钟
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
    #[serde(default = "default_network_retry_delay_ms")]
    pub network_retry_delay_ms: u64,
    #[serde(default = "default_max_network_retries")]
    pub max_network_retries: u32,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_duration_ms: default_max_duration_ms(),
            network_retry_delay_ms: default_network_retry_delay_ms(),
            max_network_retries: default_max_network_retries(),
        }
    }
}

fn default_initial_interval_ms() -> u64 {
    5_000
}

fn default_max_interval_ms() -> u64 {
    60_000
}

fn default_max_duration_ms() -> u64 {
    1_800_000
}

fn default_network_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_network_retries() -> u32 {
    3
}

impl PollingSection {
    /// 转为轮询参数模板（不含 signal / on_progress）
    pub fn to_options(&self) -> PollOptions {
        PollOptions {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_duration: Duration::from_millis(self.max_duration_ms),
            network_retry_delay: Duration::from_millis(self.network_retry_delay_ms),
            max_network_retries: self.max_network_retries,
            on_progress: None,
            signal: None,
        }
    }
}

/// [tools] 段：工具调用超时与意图匹配阈值
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒），0 表示不限；deep_research 自身另有轮询预算
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_min_match_score")]
    pub min_match_score: f64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            min_match_score: default_min_match_score(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    0
}

fn default_min_match_score() -> f64 {
    crate::tools::router::DEFAULT_MIN_MATCH_SCORE
}

impl ToolsSection {
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }
}

/// 从 config 目录加载配置，环境变量 SILMARI__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SILMARI__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SILMARI")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
