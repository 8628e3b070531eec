//! EXECUTE：检索 → 工具批次 → 写入 delta → 写入回合摘要事实
//!
//! 检索与工具在持久化之前完成；嵌入、检索或写入失败会中止本回合。

use chrono::Utc;

use crate::core::EngineError;
use crate::engine::{AgenticEngine, TurnEvent};
use crate::manifest::CognitiveManifest;
use crate::memory::{NewEmbeddedFact, NewStateDelta};
use crate::tools::{ToolHandler, ToolResult};

pub const TURN_SUMMARY_SOURCE: &str = "turn_summary";

/// 本回合的执行结果，供 NARRATE 使用
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    pub turn: u64,
    /// 去重后的检索事实（首次出现顺序）
    pub rag_results: Vec<String>,
    /// 工具处理器原样返回的结果
    pub tool_results: Vec<ToolResult>,
}

impl AgenticEngine {
    /// 嵌入文本，并校验向量维度与嵌入提供方声明的一致
    fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let vector = self.embedder.embed_sync(text).map_err(EngineError::Embedding)?;
        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(EngineError::Embedding(format!(
                "embedding has {} dimensions, provider declares {}",
                vector.len(),
                expected
            )));
        }
        Ok(vector)
    }

    /// 单条查询的语义检索：空查询返回空；超过距离阈值的结果被丢弃
    pub fn semantic_search(&self, query: &str) -> Result<Vec<String>, EngineError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embed(query)?;
        let hits = self
            .store
            .nearest_facts(&vector, self.config.rag_results_per_query)?;
        Ok(hits
            .into_iter()
            .filter(|(_, distance)| *distance <= self.config.semantic_max_distance)
            .map(|(fact, _)| fact.content)
            .collect())
    }

    pub async fn execute(
        &mut self,
        manifest: &CognitiveManifest,
        tool_handler: Option<&dyn ToolHandler>,
    ) -> Result<ExecutionContext, EngineError> {
        let turn = self.turn.advance();
        tracing::info!(turn, intent = %manifest.intent, "execute started");

        let mut rag_results: Vec<String> = Vec::new();
        for query in &manifest.rag_queries {
            let hits = self.semantic_search(query)?;
            tracing::debug!(query = %query, hits = hits.len(), "retrieval");
            self.emit(TurnEvent::Retrieval {
                query: query.clone(),
                hits: hits.len(),
            });
            for hit in hits {
                if !rag_results.contains(&hit) {
                    rag_results.push(hit);
                }
            }
        }

        let tool_results = match tool_handler {
            Some(handler) if !manifest.tool_calls.is_empty() => {
                let results = handler.execute_batch(&manifest.tool_calls).await;
                self.emit(TurnEvent::ToolResults {
                    results: results.clone(),
                });
                results
            }
            _ => Vec::new(),
        };

        let now = Utc::now();
        if !manifest.state_deltas.is_empty() {
            let rows: Vec<NewStateDelta> = manifest
                .state_deltas
                .iter()
                .map(|d| NewStateDelta {
                    turn_number: turn,
                    timestamp: now,
                    entity_type: d.entity_type.clone(),
                    entity_id: d.entity_id.clone(),
                    action: d.action.as_str().to_string(),
                    value: d.value.clone(),
                })
                .collect();
            self.store.put_deltas(&rows)?;
        }

        let fact_written = if manifest.narrative.is_empty() {
            false
        } else {
            let embedding = self.embed(&manifest.narrative)?;
            self.store.put_fact(NewEmbeddedFact {
                turn_number: turn,
                timestamp: now,
                content: manifest.narrative.clone(),
                source: TURN_SUMMARY_SOURCE.to_string(),
                embedding,
            })?;
            true
        };

        tracing::info!(
            turn,
            rag_results = rag_results.len(),
            tool_results = tool_results.len(),
            deltas = manifest.state_deltas.len(),
            "execute finished"
        );
        self.emit(TurnEvent::Persisted {
            turn,
            deltas: manifest.state_deltas.len(),
            fact: fact_written,
        });

        Ok(ExecutionContext {
            turn,
            rag_results,
            tool_results,
        })
    }
}
