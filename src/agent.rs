//! 运行时装配
//!
//! 由 AppConfig 构建引擎的全部协作者：LLM 后端、嵌入提供方、存储、工具执行器与主题句柄。
//! 未配置 API Key 时退回 MockLlmClient，保证离线也能跑通完整回合。

use std::sync::{Arc, RwLock};

use crate::config::{AppConfig, StoreSection};
use crate::core::EngineError;
use crate::engine::{AgenticEngine, EngineConfig};
use crate::llm::{create_embedder_from_config, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{InMemoryStore, MemoryStore, SqliteStore};
use crate::tools::{ApplyBespokeThemeTool, Theme, ThemeHandle, ToolCatalog, ToolExecutor, ToolRegistry};

const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// 实际选用的补全后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    DeepSeek,
    Mock,
}

/// 根据配置的 provider 与可用的 Key 决定后端（纯函数）
pub fn resolve_backend(provider: &str, has_openai_key: bool, has_deepseek_key: bool) -> LlmBackend {
    match provider.to_lowercase().as_str() {
        "mock" => LlmBackend::Mock,
        "deepseek" if has_deepseek_key => LlmBackend::DeepSeek,
        "openai" if has_openai_key => LlmBackend::OpenAi,
        other => {
            tracing::warn!(provider = %other, "no usable API key for LLM provider, using mock client");
            LlmBackend::Mock
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.is_empty())
}

pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let openai_key = env_key("OPENAI_API_KEY");
    let deepseek_key = env_key("DEEPSEEK_API_KEY");
    match resolve_backend(&cfg.llm.provider, openai_key.is_some(), deepseek_key.is_some()) {
        LlmBackend::OpenAi => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                openai_key.as_deref(),
            ))
        }
        LlmBackend::DeepSeek => {
            let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
            tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(Some(base), &cfg.llm.model, deepseek_key.as_deref()))
        }
        LlmBackend::Mock => {
            tracing::info!("Using mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}

/// 打开存储：sqlite 落盘（自动建目录），memory 为进程内
pub fn open_store(cfg: &StoreSection) -> Result<Arc<dyn MemoryStore>, EngineError> {
    match cfg.backend.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => {
            tracing::info!(path = %cfg.path.display(), "opening sqlite store");
            Ok(Arc::new(SqliteStore::open(&cfg.path)?))
        }
        other => Err(EngineError::Config(format!("unknown store backend: {other}"))),
    }
}

/// 装配好的运行时组件
pub struct AgentComponents {
    pub engine: AgenticEngine,
    pub tools: ToolExecutor,
    pub theme: ThemeHandle,
}

/// 按配置创建引擎与工具；工具目录由实际注册的工具生成
pub fn create_agent_components(cfg: &AppConfig) -> Result<AgentComponents, EngineError> {
    let llm = create_llm_from_config(cfg);
    let embedder = create_embedder_from_config(
        &cfg.embedding.provider,
        cfg.llm.base_url.as_deref(),
        &cfg.embedding.model,
        cfg.embedding.dimensions,
    );
    let store = open_store(&cfg.store)?;

    let theme: ThemeHandle = Arc::new(RwLock::new(Theme::default()));
    let mut registry = ToolRegistry::new();
    registry.register(ApplyBespokeThemeTool::new(theme.clone()));
    let catalog = ToolCatalog::from_registry(&registry);
    let tools = ToolExecutor::new(registry, cfg.tools.tool_timeout_secs);

    let engine = AgenticEngine::new(llm, embedder, store, EngineConfig::from_app(cfg), catalog)?;
    Ok(AgentComponents { engine, tools, theme })
}
