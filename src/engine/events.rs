//! 回合过程事件：供前端展示 THINK 重试、manifest 摘要、检索命中、工具结果与持久化

use serde::Serialize;

use crate::tools::ToolResult;

/// 单个过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// 第 attempt 次 THINK 请求
    ThinkAttempt { attempt: usize, max_attempts: usize },
    /// 本次 THINK 输出无法使用
    ThinkRejected { attempt: usize, reason: String },
    /// 重试耗尽，使用兜底 manifest
    ThinkFallback { attempts: usize },
    /// 已校验的 manifest 摘要
    Manifest {
        intent: String,
        narrative: String,
        rag_queries: usize,
        tool_calls: usize,
        state_deltas: usize,
    },
    /// 单条检索查询的命中（已过距离阈值）
    Retrieval { query: String, hits: usize },
    /// 工具批次结果
    ToolResults { results: Vec<ToolResult> },
    /// 本回合写入完成
    Persisted { turn: u64, deltas: usize, fact: bool },
}
