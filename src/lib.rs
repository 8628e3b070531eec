//! Narratoria - 三阶段叙事智能体引擎（THINK → EXECUTE → NARRATE）
//!
//! 不保存原始对话；每轮上下文由最近 N 条状态变化与向量检索结果重建。
//!
//! 模块划分：
//! - **agent**: 按配置装配 LLM、嵌入、存储、工具与引擎
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与回合计数
//! - **engine**: 三阶段回合（THINK 重试与兜底、EXECUTE 检索 / 工具 / 持久化、NARRATE 受约束叙述）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）与嵌入提供方
//! - **manifest**: Cognitive Manifest 结构、JSON 提取与校验
//! - **memory**: StateDelta / EmbeddedFact 存储（SQLite / 进程内）
//! - **repl**: 行式终端前端
//! - **tools**: 工具目录、注册表、执行器与主题工具

pub mod agent;
pub mod config;
pub mod core;
pub mod engine;
pub mod llm;
pub mod manifest;
pub mod memory;
pub mod observability;
pub mod repl;
pub mod tools;

pub use crate::engine::{AgenticEngine, EngineConfig, ExecutionContext, ThinkOutcome, TurnNarration};
pub use crate::manifest::CognitiveManifest;
