//! 嵌入：供 EmbeddedFact 写入与最近邻检索使用
//!
//! - OpenAiEmbedder：调用 OpenAI 兼容的 /embeddings 端点
//! - HashEmbedder：本地确定性特征哈希（离线运行与测试），同一文本恒得同一向量

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;

/// 可从 sync 上下文调用的嵌入提供方（远端实现内部用 block_in_place 执行 async 调用）
pub trait EmbeddingProvider: Send + Sync {
    /// 将文本编码为定长向量；失败时返回错误字符串
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, String>;

    /// 向量维度（与存储中的 embedding 列一致）
    fn dimensions(&self) -> usize;
}

/// 使用 async-openai 调用 OpenAI 兼容的 embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, dimensions: usize, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            dimensions,
        }
    }

    pub async fn embed_async(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.trim();
        if text.is_empty() {
            // 端点拒绝空输入；零向量与任何事实的距离都是 1.0
            return Ok(vec![0.0; self.dimensions]);
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;
        response
            .data
            .first()
            .map(|e| e.embedding.clone())
            .ok_or_else(|| "embedding response had no data".to_string())
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.to_string();
        let this = self.clone();
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(this.embed_async(&text))
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// 本地特征哈希嵌入：小写词 -> FNV-1a 桶 -> L2 归一化
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in word.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

impl EmbeddingProvider for HashEmbedder {
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, String> {
        let mut vec = vec![0.0f32; self.dimensions];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase());
        for word in words {
            let h = fnv1a(&word);
            let idx = (h % self.dimensions as u64) as usize;
            // 高位决定符号，减少桶冲突带来的偏置
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }
        // 无词文本得到零向量
        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vec.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vec)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// 从应用配置创建嵌入提供方：provider = "openai" 且有 OPENAI_API_KEY 时走远端，否则用 HashEmbedder
pub fn create_embedder_from_config(
    provider: &str,
    base_url: Option<&str>,
    model: &str,
    dimensions: usize,
) -> Arc<dyn EmbeddingProvider> {
    let key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
    match (provider.to_lowercase().as_str(), key) {
        ("openai", Some(key)) => {
            tracing::info!("Using OpenAI embeddings ({}, dim={})", model, dimensions);
            Arc::new(OpenAiEmbedder::new(base_url, model, dimensions, Some(&key)))
        }
        ("openai", None) => {
            tracing::warn!("embedding provider is openai but OPENAI_API_KEY is unset, using hash embedder");
            Arc::new(HashEmbedder::new(dimensions))
        }
        _ => {
            tracing::debug!("Using hash embedder (dim={})", dimensions);
            Arc::new(HashEmbedder::new(dimensions))
        }
    }
}
