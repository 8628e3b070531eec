//! 引擎错误类型
//!
//! 只有检索 / 嵌入 / 持久化等后端故障会冒泡给调用方；模型输出格式错误、字段非法、
//! 工具失败都在引擎内部消化（重试、清洗、逐条失败结果）。

use thiserror::Error;

/// 一轮对话中可能中止该轮的错误
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}
