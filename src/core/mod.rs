//! 核心层：统一错误类型、关闭与取消信号

pub mod error;
pub mod shutdown;

pub use error::{ErrorKind, ToolError};
pub use shutdown::{ShutdownManager, ShutdownReason};
