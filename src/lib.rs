//! Silmari - 写作助手核心
//!
//! 模块划分：
//! - **client**: 后端 HTTP 客户端（JobClient / GenerationClient 接缝与 reqwest 实现）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 统一错误类型、关闭与取消信号
//! - **observability**: 日志初始化
//! - **research**: Deep research 长任务创建与轮询引擎
//! - **tools**: 工具注册表、触发短语匹配、意图路由与调用器

pub mod client;
pub mod config;
pub mod core;
pub mod observability;
pub mod research;
pub mod tools;

pub use crate::core::{ErrorKind, ToolError};
pub use research::{execute_deep_research, DeepResearchOptions, PollingEngine};
pub use tools::{ExecutionContext, ToolInvoker, ToolRegistry, ToolResult};
