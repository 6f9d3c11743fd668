//! Silmari - 写作助手命令行
//!
//! 用法：`silmari "research the history of the printing press"`
//! 入口：初始化日志与配置，构建工具注册表，按触发短语路由输入并执行工具。

use std::sync::Arc;

use anyhow::Context;
use silmari::{
    client::ApiClient,
    config::load_config,
    core::ShutdownManager,
    observability,
    tools::{default_registry, ExecutionContext, ToolInvoker},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;

    let input = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if input.trim().is_empty() {
        anyhow::bail!("usage: silmari \"<request>\"");
    }

    let client = Arc::new(ApiClient::from_config(&cfg.api));
    let registry = default_registry(client.clone(), client, cfg.polling.to_options())
        .context("Failed to build tool registry")?;

    let mut invoker =
        ToolInvoker::new(Arc::new(registry)).with_min_match_score(cfg.tools.min_match_score);
    if let Some(timeout) = cfg.tools.tool_timeout() {
        invoker = invoker.with_default_timeout(timeout);
    }

    // Ctrl+C 取消当前工具调用
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let ctx = ExecutionContext::new()
        .with_signal(shutdown.token())
        .on_progress(|p| match p.percentage {
            Some(pct) => eprintln!("[{:>3.0}%] {}", pct, p.message),
            None => eprintln!("[ .. ] {}", p.message),
        });

    let (matched, result) = match invoker.dispatch_text(&input, &ctx).await {
        Ok(done) => done,
        Err(e) if e.is_cancellation() => match shutdown.reason() {
            Some(reason) => anyhow::bail!("Request cancelled: {reason}"),
            None => return Err(e.into()),
        },
        Err(e) => return Err(e.into()),
    };
    tracing::info!(tool = matched.tool.name(), score = matched.score, "Dispatched");

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to render result")?
    );
    Ok(())
}
