//! THINK：构造 prompt，最多 K 次请求模型产出 manifest，失败则给出兜底 manifest

use crate::core::EngineError;
use crate::engine::{AgenticEngine, TurnEvent};
use crate::llm::CompletionRequest;
use crate::manifest::{extract_json, sanitize_manifest, CognitiveManifest, Intent, ManifestRejection};
use crate::memory::{recent_deltas, DeltaSnapshot, StateDelta};
use crate::tools::ToolCatalog;

/// THINK 结果；manifest 恒为已校验或兜底的计划
#[derive(Debug, Clone)]
pub struct ThinkOutcome {
    pub manifest: CognitiveManifest,
    /// 构造 prompt 时使用的最近 delta（旧 → 新）
    pub recent_deltas: Vec<StateDelta>,
    pub attempts: usize,
    pub fell_back: bool,
}

/// THINK prompt（纯函数）
pub fn build_think_prompt(
    user_input: &str,
    catalog: &ToolCatalog,
    recent: &[StateDelta],
    rag_query_limit: usize,
) -> String {
    let mut intents: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
    intents.sort_unstable();
    let intents = intents.join(", ");

    let snapshots: Vec<DeltaSnapshot> = recent.iter().map(DeltaSnapshot::from).collect();
    let deltas_json = serde_json::to_string(&snapshots).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are the Thinking Layer for a narrative RPG engine.\n\
         Return ONLY a single JSON object. No markdown, no explanation.\n\n\
         JSON schema:\n\
         {{\n  \"intent\": \"<one of: {intents}>\",\n  \
         \"narrative\": \"<1-sentence summary of what happens this turn>\",\n  \
         \"rag_queries\": [\"<search query>\", ...],  // max {rag_query_limit}, or empty\n  \
         \"tool_calls\": [{{\"name\": \"<tool>\", \"args\": {{...}}}}, ...],  // or empty\n  \
         \"state_deltas\": [{{\"entity_type\": \"...\", \"entity_id\": \"...\", \"action\": \"add|remove|update\", \"value\": \"...\"}}, ...],\n  \
         \"narration_directive\": {{\"tone\": \"...\", \"style\": \"second_person\", \"sentences\": 3, \"must_reference\": [], \"must_avoid\": []}}\n\
         }}\n\n\
         Rules:\n\
         - intent MUST be one of: {intents}\n\
         - tool_calls MUST only use tools from the catalog below\n\
         - state_deltas predict what changes this turn; engine validates\n\
         - narration_directive tells the narrator how to write the response\n\
         - If nothing changes, use empty arrays and intent=smalltalk\n\n\
         Available tools:\n{tools}\n\n\
         Recent state deltas:\n{deltas_json}\n\n\
         Player says: {user_input}",
        tools = catalog.render_prompt_block(),
    )
}

impl AgenticEngine {
    /// THINK：模型输出不可用不会报错（重试后兜底）；只有读取最近 delta 失败才返回 Err
    pub async fn think(&self, user_input: &str) -> Result<ThinkOutcome, EngineError> {
        let recent = recent_deltas(self.store.as_ref(), self.config.history_window)?;
        let prompt = build_think_prompt(user_input, &self.catalog, &recent, self.config.rag_query_limit);
        tracing::debug!(prompt_chars = prompt.len(), "think prompt built");
        let request = CompletionRequest::prompt(
            prompt,
            self.config.think.max_tokens,
            self.config.think.temperature,
        );

        let max_attempts = self.config.max_think_retries;
        for attempt in 1..=max_attempts {
            self.emit(TurnEvent::ThinkAttempt {
                attempt,
                max_attempts,
            });
            let reason = match self.llm.complete(&request).await {
                Ok(raw) => {
                    let value = extract_json(&raw);
                    match sanitize_manifest(value.as_ref(), &self.limits(), &self.catalog) {
                        Ok(manifest) => {
                            tracing::info!(attempt, intent = %manifest.intent, "think succeeded");
                            self.emit_manifest(&manifest);
                            return Ok(ThinkOutcome {
                                manifest,
                                recent_deltas: recent,
                                attempts: attempt,
                                fell_back: false,
                            });
                        }
                        Err(rejection) => {
                            tracing::debug!(raw = %raw, "rejected think output");
                            rejection_reason(&rejection)
                        }
                    }
                }
                Err(e) => format!("llm error: {e}"),
            };
            tracing::warn!(attempt, max_attempts, reason = %reason, "think attempt failed");
            self.emit(TurnEvent::ThinkRejected { attempt, reason });
        }

        tracing::warn!(attempts = max_attempts, "think retries exhausted, using fallback manifest");
        self.emit(TurnEvent::ThinkFallback {
            attempts: max_attempts,
        });
        let manifest = CognitiveManifest::fallback(user_input);
        self.emit_manifest(&manifest);
        Ok(ThinkOutcome {
            manifest,
            recent_deltas: recent,
            attempts: max_attempts,
            fell_back: true,
        })
    }

    fn emit_manifest(&self, manifest: &CognitiveManifest) {
        self.emit(TurnEvent::Manifest {
            intent: manifest.intent.to_string(),
            narrative: manifest.narrative.clone(),
            rag_queries: manifest.rag_queries.len(),
            tool_calls: manifest.tool_calls.len(),
            state_deltas: manifest.state_deltas.len(),
        });
    }
}

fn rejection_reason(rejection: &ManifestRejection) -> String {
    format!("invalid manifest: {rejection}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_prompt_lists_sorted_intents_tools_and_deltas() {
        let delta = StateDelta {
            id: 1,
            turn_number: 4,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            entity_type: "inventory".into(),
            entity_id: "sword".into(),
            action: "add".into(),
            value: "drawn".into(),
        };
        let prompt = build_think_prompt("I open the door", &ToolCatalog::builtin(), &[delta], 3);
        assert!(prompt.starts_with("You are the Thinking Layer for a narrative RPG engine.\n"));
        assert!(prompt.contains(
            "- intent MUST be one of: combat, dialogue, exploration, inventory, memory_recall, smalltalk, theme_change\n"
        ));
        assert!(prompt.contains("  - apply_bespoke_theme: Apply a runtime UI theme"));
        assert!(prompt.contains(
            r#"[{"turn":4,"entity_type":"inventory","entity_id":"sword","action":"add","value":"drawn"}]"#
        ));
        assert!(prompt.ends_with("Player says: I open the door"));
    }

    #[test]
    fn test_prompt_without_history_or_tools() {
        let prompt = build_think_prompt("hi", &ToolCatalog::new(), &[], 2);
        assert!(prompt.contains("Available tools:\n  (none)\n\nRecent state deltas:\n[]\n\n"));
        assert!(prompt.contains("// max 2, or empty"));
    }
}
