//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）以及嵌入提供方

pub mod embedding;
pub mod mock;
pub mod openai;
pub mod traits;

pub use embedding::{create_embedder_from_config, EmbeddingProvider, HashEmbedder, OpenAiEmbedder};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{CompletionRequest, LlmClient, Message, Role, TokenStream};
