//! 工具调用器
//!
//! invoke(name, params, ctx)：查找 → 参数校验 → on_start → 处理函数与超时、取消信号竞速 → on_complete / on_error。
//! 所有结果归一为 ToolResult / ToolError；每次调用输出一条结构化审计日志（JSON），无论成功与否都记录耗时。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::{ErrorKind, ToolError};

use super::context::ExecutionContext;
use super::registry::{ToolCall, ToolRegistry};
use super::result::ToolResult;
use super::router::{IntentRouter, ToolMatch};
use super::schema::validate_params;

/// 工具调用器：持有只读注册表与意图路由
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    router: IntentRouter,
    /// ctx 未指定 timeout 时使用
    default_timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            router: IntentRouter::new(Arc::clone(&registry)),
            registry,
            default_timeout: None,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_min_match_score(mut self, min_score: f64) -> Self {
        self.router = IntentRouter::new(Arc::clone(&self.registry)).with_min_score(min_score);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    /// 调用指定工具
    pub async fn invoke(
        &self,
        name: &str,
        params: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        let invocation_id = Uuid::new_v4();
        let start = Instant::now();
        let args_preview = args_preview(&params);

        let outcome = self.run(name, params, ctx).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let (ok, code) = match &outcome {
            Ok(_) => (true, "OK".to_string()),
            Err(e) => (false, e.code().to_string()),
        };
        let audit = json!({
            "event": "tool_audit",
            "invocation_id": invocation_id.to_string(),
            "tool": name,
            "ok": ok,
            "outcome": code,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match &outcome {
            Ok(result) => ctx.fire_complete(result),
            Err(e) => ctx.fire_error(e),
        }
        outcome
    }

    /// 按意图路由自由文本并调用命中的工具；文本（去掉句首触发短语后）填入工具的 primary_param
    pub async fn dispatch_text(
        &self,
        input: &str,
        ctx: &ExecutionContext,
    ) -> Result<(ToolMatch, ToolResult), ToolError> {
        let Some(matched) = self.router.resolve(input) else {
            let err = ToolError::new(
                ErrorKind::ToolNotFound,
                "No tool matches the input",
                false,
            );
            ctx.fire_error(&err);
            return Err(err);
        };

        let text = matched.strip_trigger(input);
        let mut params = serde_json::Map::new();
        if let Some(key) = matched.tool.primary_param() {
            params.insert(key.to_string(), Value::String(text.to_string()));
        }
        let params = Value::Object(params);
        tracing::info!(tool = %matched.tool.name(), score = matched.score, "dispatching free text");

        let result = self.invoke(matched.tool.name(), params, ctx).await?;
        Ok((matched, result))
    }

    async fn run(
        &self,
        name: &str,
        params: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::tool_not_found(name))?;
        validate_params(&tool, &params)?;

        let parent = ctx.signal.clone().unwrap_or_default();
        if parent.is_cancelled() {
            return Err(ToolError::cancelled(name));
        }
        let handler_signal = parent.child_token();
        let progress = ctx.progress_reporter();
        let timeout = ctx.timeout.or(self.default_timeout);

        ctx.fire_start();

        let handler = Arc::clone(tool.handler());
        let call = ToolCall {
            params,
            progress: progress.clone(),
            signal: handler_signal.clone(),
        };
        let handler_fut = AssertUnwindSafe(async move { handler.call(call).await }).catch_unwind();
        let deadline = async {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = parent.cancelled() => Err(ToolError::cancelled(name)),
            _ = deadline => Err(ToolError::timeout(name, timeout.unwrap_or_default())),
            settled = handler_fut => match settled {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(normalize_handler_error(e)),
                Err(panic) => Err(ToolError::handler(format!(
                    "Tool '{name}' panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            },
        };

        // 落败的处理函数已随 select 被丢弃；通知其派生任务停止，并关闭进度通道
        handler_signal.cancel();
        progress.close();

        let result = result?;
        if result.response_type() != tool.response_type() {
            return Err(ToolError::handler(format!(
                "Tool '{name}' returned a {:?} response but declares {:?}",
                result.response_type(),
                tool.response_type()
            )));
        }
        Ok(result)
    }
}

/// 处理函数抛出的 ToolError 原样透传，其余包装为 HANDLER_ERROR
fn normalize_handler_error(e: anyhow::Error) -> ToolError {
    match e.downcast::<ToolError>() {
        Ok(tool_error) => tool_error,
        Err(other) => ToolError::handler(format!("{other:#}")),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tokio_util::sync::CancellationToken;

    use crate::tools::registry::{handler_fn, ToolDefinition};
    use crate::tools::result::ResponseType;
    use crate::tools::schema::parameters_schema;

    #[allow(dead_code)]
    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct TextParams {
        text: String,
    }

    fn registry_with(tool: ToolDefinition) -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::builder().register(tool).unwrap().build())
    }

    fn counting_echo(calls: Arc<AtomicUsize>) -> ToolDefinition {
        ToolDefinition::new(
            "echo",
            "Echo",
            ResponseType::Text,
            handler_fn(move |call: ToolCall| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    call.progress.report("echoing", Some(50.0));
                    Ok::<_, anyhow::Error>(ToolResult::text(
                        call.params["text"].as_str().unwrap_or_default(),
                    ))
                }
            }),
        )
        .with_parameters(parameters_schema::<TextParams>())
        .with_trigger_phrases(["echo"])
        .with_primary_param("text")
    }

    fn never_settles() -> ToolDefinition {
        ToolDefinition::new(
            "stuck",
            "Never settles",
            ResponseType::Text,
            handler_fn(|_call: ToolCall| async {
                std::future::pending::<()>().await;
                Ok::<_, anyhow::Error>(ToolResult::text("unreachable"))
            }),
        )
    }

    /// 记录回调顺序
    fn recording_ctx(log: Arc<Mutex<Vec<String>>>) -> ExecutionContext {
        let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log);
        ExecutionContext::new()
            .on_start(move || a.lock().unwrap().push("start".into()))
            .on_progress(move |p| b.lock().unwrap().push(format!("progress:{}", p.message)))
            .on_complete(move |_| c.lock().unwrap().push("complete".into()))
            .on_error(move |e| d.lock().unwrap().push(format!("error:{}", e.code())))
    }

    #[tokio::test]
    async fn test_unknown_tool_never_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = ToolInvoker::new(registry_with(counting_echo(calls.clone())));

        let err = invoker
            .invoke("unknown_tool", json!({}), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert!(err.code().contains("NOT_FOUND"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_happens_before_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = ToolInvoker::new(registry_with(counting_echo(calls.clone())));
        let log = Arc::new(Mutex::new(Vec::new()));

        let err = invoker
            .invoke("echo", json!({}), &recording_ctx(log.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*log.lock().unwrap(), vec!["error:VALIDATION_ERROR"]);
    }

    #[tokio::test]
    async fn test_success_lifecycle_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = ToolInvoker::new(registry_with(counting_echo(calls.clone())));
        let log = Arc::new(Mutex::new(Vec::new()));

        let result = invoker
            .invoke("echo", json!({"text": "hello"}), &recording_ctx(log.clone()))
            .await
            .unwrap();
        assert_eq!(result, ToolResult::text("hello"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start", "progress:echoing", "complete"]
        );
    }

    #[tokio::test]
    async fn test_never_settling_handler_times_out_quickly() {
        let invoker = ToolInvoker::new(registry_with(never_settles()));
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = recording_ctx(log.clone()).with_timeout(Duration::from_millis(1));

        let started = Instant::now();
        let err = invoker.invoke("stuck", json!({}), &ctx).await.unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(*log.lock().unwrap(), vec!["start", "error:TIMEOUT"]);
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let invoker = ToolInvoker::new(registry_with(never_settles()))
            .with_default_timeout(Duration::from_millis(5));
        let err = invoker
            .invoke("stuck", json!({}), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert!(err.retryable);
    }

    #[tokio::test]
    async fn test_abort_signal_cancels() {
        let invoker = ToolInvoker::new(registry_with(never_settles()));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = invoker
            .invoke("stuck", json!({}), &ExecutionContext::new().with_signal(token))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = ToolInvoker::new(registry_with(counting_echo(calls.clone())));
        let token = CancellationToken::new();
        token.cancel();

        let err = invoker
            .invoke("echo", json!({"text": "x"}), &ExecutionContext::new().with_signal(token))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_wrapped() {
        let tool = ToolDefinition::new(
            "broken",
            "Broken",
            ResponseType::Text,
            handler_fn(|_c: ToolCall| async {
                Err::<ToolResult, _>(anyhow::anyhow!("disk on fire"))
            }),
        );
        let invoker = ToolInvoker::new(registry_with(tool));
        let err = invoker
            .invoke("broken", json!({}), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "HANDLER_ERROR");
        assert!(err.message.contains("disk on fire"));
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_tool_error_passes_through() {
        let tool = ToolDefinition::new(
            "limited",
            "Limited",
            ResponseType::Text,
            handler_fn(|_c: ToolCall| async {
                Err::<ToolResult, _>(anyhow::Error::new(ToolError::remote(
                    "RATE_LIMIT",
                    "quota exhausted",
                )))
            }),
        );
        let invoker = ToolInvoker::new(registry_with(tool));
        let err = invoker
            .invoke("limited", json!({}), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::remote("RATE_LIMIT", "quota exhausted"));
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_handler_error() {
        let tool = ToolDefinition::new(
            "panics",
            "Panics",
            ResponseType::Text,
            handler_fn(|_c: ToolCall| async {
                if true {
                    panic!("kaboom");
                }
                Ok::<_, anyhow::Error>(ToolResult::text(""))
            }),
        );
        let invoker = ToolInvoker::new(registry_with(tool));
        let err = invoker
            .invoke("panics", json!({}), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "HANDLER_ERROR");
        assert!(err.message.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_wrong_response_type_rejected() {
        let tool = ToolDefinition::new(
            "liar",
            "Declares image, returns text",
            ResponseType::Image,
            handler_fn(|_c: ToolCall| async { Ok::<_, anyhow::Error>(ToolResult::text("nope")) }),
        );
        let invoker = ToolInvoker::new(registry_with(tool));
        let err = invoker
            .invoke("liar", json!({}), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "HANDLER_ERROR");
    }

    #[tokio::test]
    async fn test_dispatch_text_routes_and_fills_primary_param() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = ToolInvoker::new(registry_with(counting_echo(calls.clone())));

        let (matched, result) = invoker
            .dispatch_text("echo: good morning", &ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(matched.tool.name(), "echo");
        assert_eq!(result, ToolResult::text("good morning"));

        let err = invoker
            .dispatch_text("what's the weather", &ExecutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TOOL_NOT_FOUND");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_text_strips_inflected_trigger() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = ToolInvoker::new(registry_with(counting_echo(calls.clone())));

        let (matched, result) = invoker
            .dispatch_text("echoes the history of ink", &ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(matched.phrase, "echo");
        assert_eq!(result, ToolResult::text("the history of ink"));
    }
}
