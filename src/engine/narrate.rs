//! NARRATE：由已校验的 manifest 与执行结果构造受约束的叙述 prompt，并以流的形式返回正文

use futures_util::{future, StreamExt};

use crate::core::EngineError;
use crate::engine::{AgenticEngine, ExecutionContext};
use crate::llm::{CompletionRequest, TokenStream};
use crate::manifest::{CognitiveManifest, NarrationStyle};

/// 非空正文片段流，只能向前消费一次；丢弃即取消
pub type NarrationStream = TokenStream;

const NONE: &str = "(none)";

/// 人称 → 明确的 POV 指令
pub fn pov_instruction(style: NarrationStyle) -> &'static str {
    match style {
        NarrationStyle::SecondPerson => {
            "Write in second person: use \"you\" and \"your\" exclusively. \
             NEVER use first person (\"I\", \"my\", \"me\") or third person (\"he\", \"she\", \"they\")."
        }
        NarrationStyle::FirstPerson => {
            "Write in first person: use \"I\" and \"my\". NEVER use second person (\"you\", \"your\")."
        }
        NarrationStyle::ThirdPerson => {
            "Write in third person: use the character's name or \"they\". \
             NEVER use first person (\"I\") or second person (\"you\")."
        }
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items.join(", ")
    }
}

/// 按字符截断，超出部分以 "...(truncated)" 标记
fn truncate_chars(s: String, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s;
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...(truncated)");
    out
}

/// 叙述 prompt（纯函数）
pub fn build_narration_prompt(
    user_input: &str,
    manifest: &CognitiveManifest,
    ctx: &ExecutionContext,
    max_tool_result_chars: usize,
) -> String {
    let directive = &manifest.narration_directive;

    let facts_block = if ctx.rag_results.is_empty() {
        NONE.to_string()
    } else {
        ctx.rag_results
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let deltas_block = if manifest.state_deltas.is_empty() {
        NONE.to_string()
    } else {
        serde_json::to_string(&manifest.state_deltas).unwrap_or_else(|_| NONE.to_string())
    };
    let tools_block = if ctx.tool_results.is_empty() {
        NONE.to_string()
    } else {
        let json = serde_json::to_string(&ctx.tool_results).unwrap_or_else(|_| NONE.to_string());
        truncate_chars(json, max_tool_result_chars)
    };

    format!(
        "You are a narrator for a narrative RPG.\n\
         Tone: {tone}.\n\
         {pov}\n\
         Write exactly {sentences} sentence(s).\n\
         You MUST reference: {refs}\n\
         You MUST NOT mention: {avoid}\n\n\
         Relevant facts:\n{facts_block}\n\n\
         State changes this turn:\n{deltas_block}\n\n\
         Tool results:\n{tools_block}\n\n\
         Turn summary: {summary}\n\n\
         Player said: {user_input}\n\n\
         Narrate:",
        tone = directive.tone,
        pov = pov_instruction(directive.pov()),
        sentences = directive.sentences,
        refs = join_or_none(&directive.must_reference),
        avoid = join_or_none(&directive.must_avoid),
        summary = manifest.narrative,
    )
}

impl AgenticEngine {
    /// 发起流式叙述；正文不做事后校验
    pub async fn narrate(
        &self,
        user_input: &str,
        manifest: &CognitiveManifest,
        ctx: &ExecutionContext,
    ) -> Result<NarrationStream, EngineError> {
        let prompt = build_narration_prompt(user_input, manifest, ctx, self.config.max_tool_result_chars);
        tracing::debug!(turn = ctx.turn, prompt_chars = prompt.len(), "narrate prompt built");
        let request = CompletionRequest::prompt(
            prompt,
            self.config.narrate.max_tokens,
            self.config.narrate.temperature,
        );
        let stream = self.llm.complete_stream(&request).await.map_err(EngineError::Llm)?;
        let non_empty = stream.filter(|item| future::ready(!matches!(item, Ok(s) if s.is_empty())));
        Ok(Box::pin(non_empty))
    }
}

/// 一轮叙述的累积结果；流中断时已收到的部分仍然有效
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnNarration {
    pub text: String,
    /// 流以错误结束时的错误文本
    pub error: Option<String>,
}

impl TurnNarration {
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// 消费整条流
    pub async fn collect(mut stream: NarrationStream) -> Self {
        let mut narration = Self::default();
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => narration.push(&fragment),
                Err(e) => {
                    tracing::warn!(error = %e, "narration stream ended with error");
                    narration.error = Some(e);
                    break;
                }
            }
        }
        narration
    }

    /// 叙述为空时显示 manifest 的 narrative
    pub fn or_summary<'a>(&'a self, manifest: &'a CognitiveManifest) -> &'a str {
        if self.text.trim().is_empty() {
            &manifest.narrative
        } else {
            &self.text
        }
    }
}
