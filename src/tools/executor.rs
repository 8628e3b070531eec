//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，按批次依次执行 manifest 中的工具调用；
//! 未知工具、参数错误、工具失败与超时都转成单条 ToolResult（ok=false），不会中断回合。
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::manifest::ToolCall;
use crate::tools::{ToolError, ToolRegistry};

pub const ERR_UNKNOWN_TOOL: &str = "unknown_tool";
pub const ERR_INVALID_ARGS: &str = "invalid_args";
pub const ERR_TIMEOUT: &str = "timeout";

/// 单次工具调用的结果；序列化为 {name, ok, output} 或 {name, ok, error}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: Value) -> Self {
        Self {
            name: name.into(),
            ok: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// EXECUTE 阶段调用的批量工具处理器：每个调用一条结果，顺序与输入一致
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult>;
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 ToolResult
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行单个工具调用；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: &Map<String, Value>) -> ToolResult {
        let start = Instant::now();
        let Some(tool) = self.registry.get(tool_name) else {
            audit(tool_name, false, ERR_UNKNOWN_TOOL, start, args);
            tracing::warn!(tool = %tool_name, "unknown tool requested");
            return ToolResult::failure(tool_name, ERR_UNKNOWN_TOOL);
        };

        let result = timeout(self.timeout, tool.execute(args)).await;
        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(ToolError::InvalidArgs(_))) => (false, ERR_INVALID_ARGS),
            Ok(Err(ToolError::Failed(_))) => (false, "error"),
            Err(_) => (false, ERR_TIMEOUT),
        };
        audit(tool_name, ok, outcome, start, args);

        match result {
            Ok(Ok(output)) => ToolResult::success(tool_name, output),
            Ok(Err(e)) => {
                tracing::warn!(tool = %tool_name, error = ?e, "tool failed");
                ToolResult::failure(tool_name, e.to_string())
            }
            Err(_) => {
                tracing::warn!(tool = %tool_name, timeout_secs = self.timeout.as_secs_f64(), "tool timed out");
                ToolResult::failure(tool_name, ERR_TIMEOUT)
            }
        }
    }
}

#[async_trait]
impl ToolHandler for ToolExecutor {
    async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(&call.name, &call.args).await);
        }
        results
    }
}

fn audit(tool_name: &str, ok: bool, outcome: &str, start: Instant, args: &Map<String, Value>) {
    let duration_ms = start.elapsed().as_millis() as u64;
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": tool_name,
        "ok": ok,
        "outcome": outcome,
        "duration_ms": duration_ms,
        "args_preview": args_preview(args),
    });
    tracing::info!(audit = %audit.to_string(), "tool");
}

fn args_preview(args: &Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
