//! 三阶段回合引擎：THINK → EXECUTE → NARRATE
//!
//! 引擎持有回合计数器；execute 需要 &mut self，同一时刻只会有一个回合在写入。
//! 可选 event_tx：向前端推送 TurnEvent。

pub mod events;
pub mod execute;
pub mod narrate;
pub mod think;

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::core::{EngineError, TurnCounter};
use crate::llm::{EmbeddingProvider, LlmClient};
use crate::manifest::ManifestLimits;
use crate::memory::{recent_deltas, MemoryStore, StateDelta};
use crate::tools::ToolCatalog;

pub use events::TurnEvent;
pub use execute::{ExecutionContext, TURN_SUMMARY_SOURCE};
pub use narrate::{build_narration_prompt, pov_instruction, NarrationStream, TurnNarration};
pub use think::{build_think_prompt, ThinkOutcome};

/// 单种调用模式的采样参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 引擎内部使用的配置视图
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub history_window: usize,
    pub rag_query_limit: usize,
    pub rag_results_per_query: usize,
    pub semantic_max_distance: f32,
    pub max_think_retries: usize,
    pub max_directive_sentences: u32,
    pub max_tool_result_chars: usize,
    pub think: Sampling,
    pub narrate: Sampling,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

impl EngineConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        let e = &cfg.engine;
        Self {
            history_window: e.history_window,
            rag_query_limit: e.rag_query_limit,
            rag_results_per_query: e.rag_results_per_query,
            semantic_max_distance: e.semantic_max_distance,
            max_think_retries: e.max_think_retries,
            max_directive_sentences: e.max_directive_sentences,
            max_tool_result_chars: e.max_tool_result_chars,
            think: Sampling {
                max_tokens: cfg.llm.think.max_tokens,
                temperature: cfg.llm.think.temperature,
            },
            narrate: Sampling {
                max_tokens: cfg.llm.narrate.max_tokens,
                temperature: cfg.llm.narrate.temperature,
            },
        }
    }
}

pub struct AgenticEngine {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn MemoryStore>,
    config: EngineConfig,
    catalog: ToolCatalog,
    turn: TurnCounter,
    event_tx: Option<UnboundedSender<TurnEvent>>,
}

impl AgenticEngine {
    /// 创建引擎，并从已持久化的 delta 恢复回合计数
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn MemoryStore>,
        config: EngineConfig,
        catalog: ToolCatalog,
    ) -> Result<Self, EngineError> {
        let turn = TurnCounter::recover(&store.all_deltas()?);
        tracing::info!(turn = turn.current(), tools = catalog.entries().len(), "engine ready");
        Ok(Self {
            llm,
            embedder,
            store,
            config,
            catalog,
            turn,
            event_tx: None,
        })
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<TurnEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 最近一次已执行的回合号（尚未执行任何回合时为 0）
    pub fn turn(&self) -> u64 {
        self.turn.current()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn limits(&self) -> ManifestLimits {
        ManifestLimits {
            rag_query_limit: self.config.rag_query_limit,
            max_sentences: self.config.max_directive_sentences,
        }
    }

    /// 最近 history_window 条 delta（旧 → 新）
    pub fn recent_deltas(&self) -> Result<Vec<StateDelta>, EngineError> {
        recent_deltas(self.store.as_ref(), self.config.history_window)
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{HashEmbedder, MockLlmClient};
    use crate::memory::{InMemoryStore, NewEmbeddedFact};
    use chrono::Utc;

    fn engine(llm: MockLlmClient, store: Arc<InMemoryStore>) -> AgenticEngine {
        AgenticEngine::new(
            Arc::new(llm),
            Arc::new(HashEmbedder::default()),
            store,
            EngineConfig::default(),
            ToolCatalog::builtin(),
        )
        .unwrap()
    }

    #[test]
    fn test_config_view_follows_app_config() {
        let mut app = AppConfig::default();
        app.engine.max_think_retries = 7;
        app.llm.narrate.temperature = 0.1;
        let cfg = EngineConfig::from_app(&app);
        assert_eq!(cfg.max_think_retries, 7);
        assert_eq!(cfg.think.max_tokens, 256);
        assert!((cfg.narrate.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_events_cover_a_fallback_turn() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let llm = MockLlmClient::new().with_replies(["nope", "nope", "nope"]);
        let engine = engine(llm, Arc::new(InMemoryStore::new())).with_event_tx(tx);
        let outcome = engine.think("hello").await.unwrap();
        assert!(outcome.fell_back);

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        let attempts = events
            .iter()
            .filter(|e| matches!(e, TurnEvent::ThinkAttempt { .. }))
            .count();
        assert_eq!(attempts, 3);
        assert!(events.contains(&TurnEvent::ThinkFallback { attempts: 3 }));
        assert!(matches!(events.last(), Some(TurnEvent::Manifest { intent, .. }) if intent == "smalltalk"));
    }

    #[tokio::test]
    async fn test_semantic_search_empty_query_and_threshold() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = HashEmbedder::default();
        store
            .put_fact(NewEmbeddedFact {
                turn_number: 1,
                timestamp: Utc::now(),
                content: "the old lighthouse keeper".into(),
                source: TURN_SUMMARY_SOURCE.into(),
                embedding: embedder.embed_sync("the old lighthouse keeper").unwrap(),
            })
            .unwrap();
        let engine = engine(MockLlmClient::new(), store);
        assert!(engine.semantic_search("").unwrap().is_empty());
        assert_eq!(
            engine.semantic_search("the old lighthouse keeper").unwrap(),
            vec!["the old lighthouse keeper"]
        );
        assert!(engine.semantic_search("quantum banana spreadsheet").unwrap().is_empty());
    }

    /// 声明 8 维，实际只给 4 维
    struct ShortEmbedder;

    impl EmbeddingProvider for ShortEmbedder {
        fn embed_sync(&self, _text: &str) -> Result<Vec<f32>, String> {
            Ok(vec![0.5; 4])
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    #[tokio::test]
    async fn test_embedding_dimension_mismatch_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let mut engine = AgenticEngine::new(
            Arc::new(MockLlmClient::new()),
            Arc::new(ShortEmbedder),
            store.clone(),
            EngineConfig::default(),
            ToolCatalog::builtin(),
        )
        .unwrap();

        let err = engine.semantic_search("tavern").unwrap_err();
        assert!(matches!(err, EngineError::Embedding(ref m) if m.contains("provider declares 8")));

        let manifest = crate::manifest::CognitiveManifest::fallback("hello");
        let err = engine.execute(&manifest, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Embedding(_)));
        assert!(store.facts().is_empty());
    }
}
