//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 可预置脚本化回复（complete 与 complete_stream 各一个队列），并记录收到的全部请求；
//! 队列为空时：complete 回显一份 smalltalk manifest，complete_stream 按词切分回显本轮摘要。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{CompletionRequest, LlmClient, TokenStream};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    stream_replies: Mutex<VecDeque<Vec<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次作为 complete 的回复
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.replies).extend(replies.into_iter().map(|r| Ok(r.into())));
        self
    }

    /// 追加一次 complete 失败（模拟后端错误）
    pub fn with_error(self, err: impl Into<String>) -> Self {
        lock(&self.replies).push_back(Err(err.into()));
        self
    }

    /// 追加一次 complete_stream 的分段回复
    pub fn with_stream_reply<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.stream_replies).push_back(fragments.into_iter().map(Into::into).collect());
        self
    }

    /// 已收到的请求（按时间顺序）
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    fn record(&self, request: &CompletionRequest) {
        lock(&self.requests).push(request.clone());
    }
}

fn line_after<'a>(prompt: &'a str, marker: &str) -> Option<&'a str> {
    prompt
        .rsplit_once(marker)
        .map(|(_, rest)| rest.lines().next().unwrap_or("").trim())
}

fn default_manifest(prompt: &str) -> String {
    let input = line_after(prompt, "Player says:").unwrap_or("(no input)");
    serde_json::json!({
        "intent": "smalltalk",
        "narrative": format!("You say: {}", input),
        "narration_directive": {"tone": "neutral", "style": "second_person", "sentences": 1}
    })
    .to_string()
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, String> {
        self.record(request);
        let scripted = lock(&self.replies).pop_front();
        match scripted {
            Some(reply) => reply,
            None => Ok(default_manifest(request.last_user_content())),
        }
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, String> {
        self.record(request);
        let fragments = match lock(&self.stream_replies).pop_front() {
            Some(f) => f,
            None => {
                let summary = line_after(request.last_user_content(), "Turn summary:")
                    .unwrap_or("Nothing happens.");
                summary.split_inclusive(' ').map(String::from).collect()
            }
        };
        Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_scripted_replies_then_default_manifest() {
        let llm = MockLlmClient::new().with_replies(["first"]).with_error("boom");
        let req = CompletionRequest::prompt("Player says: hello there", 16, 0.0);

        assert_eq!(llm.complete(&req).await.unwrap(), "first");
        assert_eq!(llm.complete(&req).await.unwrap_err(), "boom");
        let fallback = llm.complete(&req).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&fallback).unwrap();
        assert_eq!(v["intent"], "smalltalk");
        assert_eq!(v["narrative"], "You say: hello there");
        assert_eq!(llm.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_default_stream_echoes_turn_summary() {
        let llm = MockLlmClient::new();
        let req = CompletionRequest::prompt("Turn summary: The door creaks.\n\nNarrate:", 16, 0.7);
        let parts: Vec<String> = llm
            .complete_stream(&req)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts.concat(), "The door creaks.");
        assert!(parts.len() > 1);
    }
}
